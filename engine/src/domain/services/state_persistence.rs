//! State Persistence
//! Owns the working copy of the daemon state and its durable replica.
//! Every mutation goes through `modify`, which writes the whole state back.
//! Loading reconciles recorded pids against the live process table, so a dead
//! record never blocks a later start.

use crate::domain::entities::{PersistedDaemonState, ServiceRuntimeState};
use crate::domain::ports::{ProcessControl, StateStore};
use crate::domain::services::ServiceRegistry;
use crate::domain::value_objects::ServiceStatus;
use crate::domain::DomainError;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

/// One correction made while reconciling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Recorded with a process that no longer exists
    MarkedStopped {
        service: String,
        was: ServiceStatus,
        pid: Option<u32>,
    },
    /// Live process found through the service's pid file
    Adopted { service: String, pid: u32 },
    /// Dropped from the resource-paused set
    Unpaused { service: String },
}

pub struct StatePersistence {
    store: Arc<dyn StateStore>,
    state: PersistedDaemonState,
}

impl StatePersistence {
    /// Empty working copy; call `load` before use
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            state: PersistedDaemonState::default(),
        }
    }

    /// Load the state file, reconcile it and write the reconciled state back
    pub async fn load(
        &mut self,
        registry: &ServiceRegistry,
        processes: &dyn ProcessControl,
    ) -> Result<Vec<Reconciliation>, DomainError> {
        let mut state = Self::read(self.store.as_ref()).await?;
        let changes = reconcile(&mut state, registry, processes).await;
        for change in &changes {
            info!(change = ?change, "Reconciled persisted state");
        }
        self.state = state;
        self.persist().await?;
        Ok(changes)
    }

    /// Reconciled view of the state file without writing it back
    pub async fn inspect(
        store: &dyn StateStore,
        registry: &ServiceRegistry,
        processes: &dyn ProcessControl,
    ) -> Result<PersistedDaemonState, DomainError> {
        let mut state = Self::read(store).await?;
        reconcile(&mut state, registry, processes).await;
        Ok(state)
    }

    async fn read(store: &dyn StateStore) -> Result<PersistedDaemonState, DomainError> {
        match store.load().await {
            Ok(Some(state)) => Ok(state),
            Ok(None) => Ok(PersistedDaemonState::default()),
            Err(DomainError::StateCorrupted(reason)) => {
                warn!(reason = %reason, "State file unreadable, assuming all services stopped");
                Ok(PersistedDaemonState::default())
            }
            Err(e) => Err(e),
        }
    }

    pub fn state(&self) -> &PersistedDaemonState {
        &self.state
    }

    pub fn service(&self, name: &str) -> ServiceRuntimeState {
        self.state.service(name)
    }

    pub fn status(&self, name: &str) -> ServiceStatus {
        self.state.service(name).status()
    }

    pub fn paused_by_resource(&self) -> &BTreeSet<String> {
        &self.state.paused_by_resource
    }

    pub fn is_resource_paused(&self, name: &str) -> bool {
        self.state.paused_by_resource.contains(name)
    }

    /// Apply a mutation to the working copy and write it through.
    /// The working copy keeps the mutation even when the write fails, since it
    /// mirrors signals already delivered.
    pub async fn modify<F>(&mut self, f: F) -> Result<(), DomainError>
    where
        F: FnOnce(&mut PersistedDaemonState) -> Result<(), DomainError>,
    {
        let mut next = self.state.clone();
        f(&mut next)?;
        self.state = next;
        self.persist().await
    }

    /// Replace the working copy wholesale and write it through
    pub async fn save(&mut self, state: PersistedDaemonState) -> Result<(), DomainError> {
        self.state = state;
        self.persist().await
    }

    /// Mutate one service record
    pub async fn update<F>(&mut self, name: &str, f: F) -> Result<(), DomainError>
    where
        F: FnOnce(&mut ServiceRuntimeState) -> Result<(), DomainError>,
    {
        self.modify(|state| f(state.service_mut(name))).await
    }

    async fn persist(&mut self) -> Result<(), DomainError> {
        self.state.touch();
        self.store.save(&self.state).await.map_err(|e| match e {
            DomainError::Persistence(_) => e,
            other => DomainError::Persistence(other.to_string()),
        })
    }
}

async fn reconcile(
    state: &mut PersistedDaemonState,
    registry: &ServiceRegistry,
    processes: &dyn ProcessControl,
) -> Vec<Reconciliation> {
    let mut changes = Vec::new();

    for (name, record) in state.services.iter_mut() {
        let status = record.status();
        if !status.has_process() {
            continue;
        }
        let alive = match record.pid() {
            Some(pid) => processes.is_alive(pid).await,
            None => false,
        };
        if !alive {
            changes.push(Reconciliation::MarkedStopped {
                service: name.clone(),
                was: status,
                pid: record.pid(),
            });
            record.mark_stopped();
        }
    }

    for service in registry.managed() {
        let Some(path) = service.pid_file() else {
            continue;
        };
        if state.service(service.name()).status() != ServiceStatus::Stopped {
            continue;
        }
        let Some(pid) = processes.read_pid_file(path).await else {
            continue;
        };
        if processes.is_alive(pid).await
            && state.service_mut(service.name()).adopt(service.name(), pid).is_ok()
        {
            changes.push(Reconciliation::Adopted {
                service: service.name().to_string(),
                pid,
            });
        }
    }

    let services = &state.services;
    let mut dropped = Vec::new();
    state.paused_by_resource.retain(|name| {
        let keep = registry.get(name).is_ok_and(|s| !s.is_external() && !s.is_top_tier())
            && services
                .get(name)
                .is_some_and(|r| r.status() == ServiceStatus::Paused);
        if !keep {
            dropped.push(name.clone());
        }
        keep
    });
    changes.extend(
        dropped
            .into_iter()
            .map(|service| Reconciliation::Unpaused { service }),
    );

    changes
}
