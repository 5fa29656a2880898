//! Persisted record of offers that were already notified.
//!
//! The store is loaded once per scan, mutated in memory and written back at
//! the end. A missing or unreadable file is never fatal: the scan starts from
//! an empty state instead, at the cost of possibly re-notifying old offers.

use crate::shop::Offer;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Metadata kept for a notified offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentRecord {
    pub timestamp: DateTime<Utc>,
    pub discount_pct: u8,
    pub title: String,
    #[serde(default)]
    pub url: String,
    /// Insertion order; oldest entries are evicted first.
    #[serde(default)]
    seq: u64,
}

impl SentRecord {
    /// Builds a record for an offer notified now.
    pub fn for_offer(offer: &Offer) -> Self {
        Self {
            timestamp: Utc::now(),
            discount_pct: offer.discount_pct().unwrap_or(0),
            title: offer.title.clone(),
            url: offer.url.clone(),
            seq: 0,
        }
    }
}

/// On-disk layout of the state file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub sent: HashMap<String, SentRecord>,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
}

/// Bounded, file-backed set of notified offer identities.
pub struct StateStore {
    path: PathBuf,
    cap: usize,
    state: State,
    next_seq: u64,
}

impl StateStore {
    /// Loads the state file, falling back to an empty state.
    pub fn load(path: impl Into<PathBuf>, cap: usize) -> Self {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<State>(&content) {
                Ok(state) => {
                    debug!("Loaded {} state entries from {}", state.sent.len(), path.display());
                    state
                }
                Err(e) => {
                    warn!("State file {} is corrupt ({}); starting fresh", path.display(), e);
                    State::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}; starting fresh", path.display());
                State::default()
            }
            Err(e) => {
                warn!("Could not read state file {} ({}); starting fresh", path.display(), e);
                State::default()
            }
        };

        let next_seq = state.sent.values().map(|r| r.seq + 1).max().unwrap_or(0);
        Self { path, cap, state, next_seq }
    }

    /// Returns true if the identity was already notified.
    pub fn contains(&self, identity: &str) -> bool {
        self.state.sent.contains_key(identity)
    }

    /// Inserts or overwrites a record. Nothing is written until [`persist`](Self::persist).
    pub fn record(&mut self, identity: impl Into<String>, mut record: SentRecord) {
        record.seq = self.next_seq;
        self.next_seq += 1;
        self.state.sent.insert(identity.into(), record);
    }

    /// Forgets every notified offer.
    pub fn clear(&mut self) {
        info!("Clearing {} state entries", self.state.sent.len());
        self.state.sent.clear();
    }

    pub fn len(&self) -> usize {
        self.state.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.sent.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.state.last_run
    }

    /// Returns records newest first.
    pub fn entries(&self) -> Vec<(&str, &SentRecord)> {
        let mut entries: Vec<_> = self.state.sent.iter().map(|(k, v)| (k.as_str(), v)).collect();
        entries.sort_by(|a, b| (b.1.seq, b.1.timestamp).cmp(&(a.1.seq, a.1.timestamp)));
        entries
    }

    /// Trims to the cap, stamps `last_run` and writes the file atomically.
    pub fn persist(&mut self) -> Result<()> {
        self.evict();
        self.state.last_run = Some(Utc::now());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create state directory: {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(&self.state).context("Failed to serialize state")?;

        // Write beside the target, then rename over it
        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        std::fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write state file: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace state file: {}", self.path.display()))?;

        debug!("Persisted {} state entries to {}", self.state.sent.len(), self.path.display());
        Ok(())
    }

    /// Drops the oldest-inserted entries beyond the cap.
    fn evict(&mut self) {
        let excess = self.state.sent.len().saturating_sub(self.cap);
        if excess == 0 {
            return;
        }

        let mut by_age: Vec<(u64, DateTime<Utc>, String)> = self
            .state
            .sent
            .iter()
            .map(|(id, r)| (r.seq, r.timestamp, id.clone()))
            .collect();
        by_age.sort();

        for (_, _, id) in by_age.into_iter().take(excess) {
            self.state.sent.remove(&id);
        }

        debug!("Evicted {} state entries (cap {})", excess, self.cap);
    }
}
