pub mod charts;
pub mod etl;
pub mod indicators;
pub mod movers;
pub mod pipeline;
pub mod report;
pub mod screener;

pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
