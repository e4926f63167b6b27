pub mod metrics;
pub mod money;
pub mod ports;
pub mod signature;
pub mod transaction;
