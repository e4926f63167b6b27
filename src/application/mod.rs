pub mod dispatcher;
pub mod engine;
pub mod metrics;
