//! The properties store: cross-session memory of what a host has told us
//! before, so a new session to the same host can immediately apply
//! previously-learned SETTINGS rather than starting from protocol
//! defaults (§4.6 "Initial settings").

use std::collections::HashMap;
use std::sync::Mutex;

use crate::frame::{Setting, SettingId};

/// Implemented by whatever persists per-host settings across sessions
/// (typically an in-memory cache keyed by origin, occasionally backed by
/// disk). A session calls `settings_for_host` once at startup and
/// `remember_settings` whenever it receives a SETTINGS frame worth
/// persisting (`persist_value`/`persisted` flagged entries).
pub trait PropertiesStore: Send + Sync {
    fn settings_for_host(&self, host: &str) -> Vec<Setting>;
    fn remember_settings(&self, host: &str, settings: &[Setting]);
}

/// An in-process, in-memory properties store, suitable as the default for
/// a process that only ever opens sessions to a handful of hosts and
/// doesn't need the memory to survive a restart.
#[derive(Default)]
pub struct InMemoryPropertiesStore {
    by_host: Mutex<HashMap<String, Vec<Setting>>>,
}

impl InMemoryPropertiesStore {
    pub fn new() -> InMemoryPropertiesStore {
        InMemoryPropertiesStore::default()
    }
}

impl PropertiesStore for InMemoryPropertiesStore {
    fn settings_for_host(&self, host: &str) -> Vec<Setting> {
        self.by_host.lock().unwrap().get(host).cloned().unwrap_or_default()
    }

    fn remember_settings(&self, host: &str, settings: &[Setting]) {
        let persistable: Vec<Setting> = settings
            .iter()
            .copied()
            .filter(|s| s.persist_value && !matches!(s.id, SettingId::Unknown(_)))
            .collect();
        if persistable.is_empty() {
            return;
        }
        self.by_host.lock().unwrap().insert(host.to_string(), persistable);
    }
}

/// Remembers nothing; every session starts from protocol defaults.
#[derive(Debug, Default)]
pub struct NoProperties;

impl PropertiesStore for NoProperties {
    fn settings_for_host(&self, _host: &str) -> Vec<Setting> {
        Vec::new()
    }

    fn remember_settings(&self, _host: &str, _settings: &[Setting]) {}
}
