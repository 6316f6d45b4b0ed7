use crate::config::Config;
use crate::mailer::Mailer;
use crate::store::{MemoryTaskStore, MemoryUserStore, TaskStore, UserStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub tasks: Arc<dyn TaskStore>,
    pub users: Arc<dyn UserStore>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Config,
}

impl AppState {
    pub fn in_memory(config: Config, mailer: Arc<dyn Mailer>) -> Self {
        AppState {
            tasks: Arc::new(MemoryTaskStore::new()),
            users: Arc::new(MemoryUserStore::new()),
            mailer,
            config,
        }
    }
}
