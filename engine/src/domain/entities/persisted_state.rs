//! PersistedDaemonState entity
//! The whole content of the state file

use super::service_runtime_state::lenient_option;
use super::ServiceRuntimeState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedDaemonState {
    /// Services paused because of memory pressure (as opposed to by an operator)
    #[serde(default)]
    pub paused_by_resource: BTreeSet<String>,

    #[serde(default)]
    pub services: BTreeMap<String, ServiceRuntimeState>,

    #[serde(default, deserialize_with = "lenient_option")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PersistedDaemonState {
    /// Current record for `name`, or a fresh Stopped record
    pub fn service(&self, name: &str) -> ServiceRuntimeState {
        self.services.get(name).cloned().unwrap_or_default()
    }

    /// Mutable record for `name`, created on first reference
    pub fn service_mut(&mut self, name: &str) -> &mut ServiceRuntimeState {
        self.services.entry(name.to_string()).or_default()
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}
