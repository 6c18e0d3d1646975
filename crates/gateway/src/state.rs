//! Shared application state, handed to every axum handler behind one
//! `Arc`-backed `Clone`.

use std::sync::Arc;

use dr_domain::config::Config;
use dr_eventstore::EventStore;
use dr_moderation::{KeywordModerationEngine, ModerationPort};
use dr_store::Store;

use crate::services::turn_processor::TurnProcessorHandle;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    // Core persistence and messaging.
    pub store: Arc<Store>,
    pub events: Arc<EventStore>,
    pub moderation: Arc<dyn ModerationPort>,

    // Background worker lifecycle; `None` until `serve` starts it.
    pub turn_processor: Arc<parking_lot::Mutex<Option<TurnProcessorHandle>>>,

    /// Serializes a store commit together with the event-store append
    /// it causes, so topic-event receipt order always matches commit
    /// order even though the store and the event store are
    /// independently locked (see the concurrency model's note on
    /// holding one lock around `(store-commit, timeline-append)`).
    pub commit_lock: Arc<tokio::sync::Mutex<()>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let store = match &config.store.snapshot_path {
            Some(path) => Arc::new(
                Store::with_snapshot(path.clone(), config.store.snapshot_on_commit)
                    .expect("store snapshot path must be loadable"),
            ),
            None => Arc::new(Store::new()),
        };
        let moderation: Arc<dyn ModerationPort> = Arc::new(KeywordModerationEngine::new(
            config.moderation.banned_keywords.clone(),
        ));
        Self {
            config: Arc::new(config),
            store,
            events: Arc::new(EventStore::new()),
            moderation,
            turn_processor: Arc::new(parking_lot::Mutex::new(None)),
            commit_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}
