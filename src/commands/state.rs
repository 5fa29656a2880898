//! State command: inspects or clears the notified-offer record.

use crate::config::Config;
use crate::format::Formatter;
use crate::state::StateStore;
use anyhow::Result;
use tracing::info;

pub struct StateCommand {
    config: Config,
}

impl StateCommand {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Shows the `limit` most recent entries, optionally clearing the store first.
    pub fn execute(&self, limit: usize, clear: bool) -> Result<String> {
        let mut store = StateStore::load(&self.config.state_file, self.config.state_cap);

        if clear {
            store.clear();
            store.persist()?;
            info!("State cleared: {}", store.path().display());
        }

        let formatter = Formatter::new(self.config.format);
        Ok(formatter.format_state(&store, limit))
    }
}
