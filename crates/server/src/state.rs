use std::path::Path;
use std::sync::Arc;

use db::{DebateSessionRepository, UtteranceRepository};
use events::EventBus;
use orchestrator::{
    InMemoryTranscriptStore, InterventionHandler, SessionRegistry, SessionServices,
    TranscriptStore,
};

use crate::config::StudioConfig;
use crate::error::InitError;

#[derive(Clone)]
pub struct AppState {
    pub registry: SessionRegistry,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(registry: SessionRegistry) -> Self {
        let event_bus = registry.event_bus().cloned().unwrap_or_default();
        Self {
            registry,
            event_bus,
        }
    }

    /// Wire up agents, storage and the event bus from configuration.
    pub async fn from_config(config: &StudioConfig, root: &Path) -> Result<Self, InitError> {
        let event_bus = EventBus::new();
        let roster = config.agents.roster();

        let services = match config.database_url(root) {
            Some(database_url) => {
                if let Some(parent) = Path::new(database_url.trim_start_matches("sqlite:")).parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                let pool = db::create_pool(&database_url).await?;
                db::run_migrations(&pool).await?;
                tracing::info!(database = %database_url, "Transcripts persisted to SQLite");

                let store: Arc<dyn TranscriptStore> = Arc::new(UtteranceRepository::new(pool.clone()));
                SessionServices::new(roster, store)
                    .with_repository(DebateSessionRepository::new(pool))
            }
            None => {
                tracing::info!("Transcripts kept in memory");
                SessionServices::new(roster, Arc::new(InMemoryTranscriptStore::new()))
            }
        };

        let services = services
            .with_event_bus(event_bus.clone())
            .with_hub_config(config.hub)
            .with_retry(config.retry);

        tracing::info!(agents = %config.agents.label(), "Session services ready");
        Ok(Self {
            registry: SessionRegistry::new(services),
            event_bus,
        })
    }

    pub fn interventions(&self) -> InterventionHandler {
        self.registry.interventions()
    }
}
