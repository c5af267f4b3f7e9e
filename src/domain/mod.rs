// Domain layer: market data models and the ports the adapters implement.

pub mod model;
pub mod ports;
