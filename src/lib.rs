pub mod ai;
pub mod board;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod realtime;
pub mod storage;
pub mod util;

use crate::ai::Assistant;
use crate::config::Config;
use crate::db::{AppState, create_pool, init_db};
use crate::realtime::EventBus;
use crate::storage::Storage;

/// Open the database, create the schema, and assemble shared state from config.
pub fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let db = create_pool(&config.database_path)?;
    {
        let conn = db.get()?;
        init_db(&conn)?;
    }

    let assistant = Assistant::from_config(config)?;
    if assistant.is_none() {
        tracing::info!("AI_API_KEY not set, assistant disabled");
    }

    Ok(AppState {
        db,
        events: EventBus::default(),
        storage: Storage::new(&config.storage_path, &config.base_url, config.max_upload_bytes),
        assistant,
    })
}
