pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use application::engine::{
    EngineEvent, EngineHandle, EngineStats, PerformanceReport, SubmitRequest, TransferEngine,
};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
