use crate::error::{ErrorKind, Result};
use crate::notify::{self, MediaServer};
use mvault_config::Config;
use mvault_state::StateStore;

/// The reconciliation engine for one configured media vault.
///
/// Owns the validated configuration, the state store and the media server
/// notifier. Passes must not overlap: the engine does not serialize
/// [`sync`](Engine::sync) calls itself, only access to the state document.
pub struct Engine {
    pub(crate) config: Config,
    pub(crate) store: StateStore,
    pub(crate) server: Box<dyn MediaServer>,
}

impl Engine {
    pub fn new(config: Config, store: StateStore) -> Result<Self> {
        let server = notify::from_config(config.media_server.as_ref())?;
        Ok(Self { config, store, server })
    }

    /// Opens the state store in the configured state directory.
    pub fn from_config(config: Config) -> Result<Self> {
        let store = StateStore::open(&config.tiers.state).map_err(ErrorKind::state)?;
        tracing::debug!(state = %store.path().display(), "Opened state store");
        Self::new(config, store)
    }

    /// Replaces the media server notifier.
    pub fn with_media_server(mut self, server: impl MediaServer + 'static) -> Self {
        self.server = Box::new(server);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }
}
