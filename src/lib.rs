pub mod analytics;
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod recommend;
pub mod search;
pub mod server;

pub use engine::Engine;
pub use error::{EngineError, EngineResult};
