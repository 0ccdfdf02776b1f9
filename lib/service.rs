use std::sync::Arc;

use crate::config::{Config, ConfigLoader};
use crate::shutdown::Shutdown;

#[derive(Clone)]
pub struct ServiceContext {
    name: String,
    config_loader: Arc<ConfigLoader>,
    shutdown: Shutdown,
}

impl ServiceContext {
    pub fn new(
        name: String,
        config_loader: Arc<ConfigLoader>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            name,
            config_loader,
            shutdown,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.name
    }

    pub fn config_loader(&self) -> Arc<ConfigLoader> {
        self.config_loader.clone()
    }

    pub fn load_config(&self) -> Config {
        self.config_loader
            .load()
            .expect("configuration is invalid")
    }

    /// Awaits the shutdown signal.
    pub async fn recv_shutdown_signal(&mut self) {
        self.shutdown.recv().await
    }

    /// Causes all listeners to start the shutdown sequence.
    pub fn broadcast_shutdown(&mut self) {
        self.shutdown.broadcast_shutdown()
    }
}
