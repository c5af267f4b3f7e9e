pub mod discord;
pub mod email;
pub mod wikipedia;
pub mod yahoo;

pub use discord::DiscordDistributor;
pub use email::EmailDistributor;
pub use wikipedia::WikipediaConstituents;
pub use yahoo::YahooChartClient;
