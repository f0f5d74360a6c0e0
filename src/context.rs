use crate::auth::Directory;
use crate::config::types::AppConfig;
use crate::control::commands::{CommandRegistry, Dispatcher};
use std::sync::Arc;

/// Shared, read-only state handed to every session.
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub directory: Arc<Directory>,
    pub dispatcher: Dispatcher,
}

impl AppContext {
    /// Build the directory and the command registry from `config`.
    pub fn new(config: AppConfig) -> Self {
        let config = Arc::new(config);
        let directory = Arc::new(Directory::new(&config));
        let registry = Arc::new(CommandRegistry::new());
        Self {
            dispatcher: Dispatcher::new(registry, directory.clone()),
            config,
            directory,
        }
    }
}
