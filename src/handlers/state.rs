//! Application state

use crate::config::Config;
use crate::engine::Engine;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<Engine>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            config: Arc::new(engine.config().clone()),
            engine,
        }
    }
}
