//! In-memory fakes of every port, for unit tests
//! Behave like a tiny simulated host: a process table, scripted RAM readings,
//! scripted probe outcomes and a state file held in memory

use super::{
    HostSampler, LaunchSpec, MemoryReading, Notifier, ProbeRunner, ProcessControl, ProcessEntry,
    ProcessSignal, StateStore,
};
use crate::constants::memory::gb_to_bytes;
use crate::domain::entities::PersistedDaemonState;
use crate::domain::value_objects::{HealthProbe, ProbeOutcome};
use crate::domain::DomainError;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

// ===== ProcessControl =====

#[derive(Default)]
struct ProcessTable {
    next_pid: u32,
    entries: BTreeMap<u32, ProcessEntry>,
    suspended: BTreeSet<u32>,
    ignores_term: BTreeSet<u32>,
    signals: Vec<(u32, ProcessSignal)>,
    group_signals: Vec<(u32, ProcessSignal)>,
    spawned: Vec<LaunchSpec>,
    spawn_failures: BTreeMap<String, String>,
    exits_on_spawn: BTreeSet<String>,
    worker_children: BTreeMap<String, String>,
    stubborn: BTreeSet<String>,
    pid_files: BTreeMap<PathBuf, u32>,
}

impl ProcessTable {
    fn alloc_pid(&mut self) -> u32 {
        self.next_pid += 1;
        1000 + self.next_pid
    }

    fn apply(&mut self, pid: u32, signal: ProcessSignal) {
        match signal {
            ProcessSignal::Terminate => {
                if !self.ignores_term.contains(&pid) {
                    self.entries.remove(&pid);
                    self.suspended.remove(&pid);
                }
            }
            ProcessSignal::Kill => {
                self.entries.remove(&pid);
                self.suspended.remove(&pid);
            }
            ProcessSignal::Stop => {
                self.suspended.insert(pid);
            }
            ProcessSignal::Continue => {
                self.suspended.remove(&pid);
            }
        }
    }

    /// Topmost live ancestor; stands in for the process group leader
    fn group_leader(&self, pid: u32) -> u32 {
        let mut current = pid;
        while let Some(parent) = self.entries.get(&current).and_then(|e| e.parent) {
            if !self.entries.contains_key(&parent) {
                break;
            }
            current = parent;
        }
        current
    }

    fn descendants(&self, pid: u32) -> Vec<ProcessEntry> {
        let mut out = Vec::new();
        let mut frontier = VecDeque::from([pid]);
        while let Some(parent) = frontier.pop_front() {
            for entry in self.entries.values() {
                if entry.parent == Some(parent) {
                    frontier.push_back(entry.pid);
                    out.push(entry.clone());
                }
            }
        }
        out
    }
}

/// Simulated process table
#[derive(Default)]
pub struct FakeProcessControl {
    table: Mutex<ProcessTable>,
}

impl FakeProcessControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every spawn of `service` fail
    pub fn fail_spawn(&self, service: &str, reason: &str) {
        let mut t = self.table.lock().unwrap();
        t.spawn_failures
            .insert(service.to_string(), reason.to_string());
    }

    /// Spawns of `service` succeed but the process is gone immediately
    pub fn exit_immediately(&self, service: &str) {
        let mut t = self.table.lock().unwrap();
        t.exits_on_spawn.insert(service.to_string());
    }

    /// Spawns of `service` create a launcher with a worker child named `name`
    pub fn spawn_worker_child(&self, service: &str, name: &str) {
        let mut t = self.table.lock().unwrap();
        t.worker_children
            .insert(service.to_string(), name.to_string());
    }

    /// Processes of `service` ignore SIGTERM
    pub fn ignore_terminate(&self, service: &str) {
        let mut t = self.table.lock().unwrap();
        t.stubborn.insert(service.to_string());
    }

    /// Add an arbitrary live process
    pub fn insert_process(&self, parent: Option<u32>, name: &str, cmdline: &str) -> u32 {
        let mut t = self.table.lock().unwrap();
        let pid = t.alloc_pid();
        t.entries.insert(
            pid,
            ProcessEntry {
                pid,
                parent,
                name: name.to_string(),
                cmdline: cmdline.to_string(),
            },
        );
        pid
    }

    /// The process dies outside of the supervisor's control
    pub fn crash(&self, pid: u32) {
        let mut t = self.table.lock().unwrap();
        t.entries.remove(&pid);
        t.suspended.remove(&pid);
    }

    pub fn alive(&self, pid: u32) -> bool {
        self.table.lock().unwrap().entries.contains_key(&pid)
    }

    pub fn is_suspended(&self, pid: u32) -> bool {
        self.table.lock().unwrap().suspended.contains(&pid)
    }

    pub fn signals(&self) -> Vec<(u32, ProcessSignal)> {
        self.table.lock().unwrap().signals.clone()
    }

    pub fn group_signals(&self) -> Vec<(u32, ProcessSignal)> {
        self.table.lock().unwrap().group_signals.clone()
    }

    pub fn spawn_count(&self, service: &str) -> usize {
        let t = self.table.lock().unwrap();
        t.spawned.iter().filter(|s| s.service == service).count()
    }

    pub fn spawned(&self) -> Vec<LaunchSpec> {
        self.table.lock().unwrap().spawned.clone()
    }

    pub fn pid_file(&self, path: &Path) -> Option<u32> {
        self.table.lock().unwrap().pid_files.get(path).copied()
    }

    pub fn set_pid_file(&self, path: &Path, pid: u32) {
        let mut t = self.table.lock().unwrap();
        t.pid_files.insert(path.to_path_buf(), pid);
    }
}

#[async_trait]
impl ProcessControl for FakeProcessControl {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<u32, DomainError> {
        let mut t = self.table.lock().unwrap();
        t.spawned.push(spec.clone());

        if let Some(reason) = t.spawn_failures.get(&spec.service) {
            return Err(DomainError::SpawnFailed {
                service: spec.service.clone(),
                reason: reason.clone(),
            });
        }

        let pid = t.alloc_pid();
        if t.exits_on_spawn.contains(&spec.service) {
            return Ok(pid);
        }

        t.entries.insert(
            pid,
            ProcessEntry {
                pid,
                parent: None,
                name: spec.argv.first().cloned().unwrap_or_default(),
                cmdline: spec.argv.join(" "),
            },
        );
        let stubborn = t.stubborn.contains(&spec.service);
        if stubborn {
            t.ignores_term.insert(pid);
        }

        if let Some(child_name) = t.worker_children.get(&spec.service).cloned() {
            let child = t.alloc_pid();
            t.entries.insert(
                child,
                ProcessEntry {
                    pid: child,
                    parent: Some(pid),
                    name: child_name.clone(),
                    cmdline: format!("{} --serve", child_name),
                },
            );
            if stubborn {
                t.ignores_term.insert(child);
            }
        }

        Ok(pid)
    }

    async fn signal(&self, pid: u32, signal: ProcessSignal) -> Result<bool, DomainError> {
        let mut t = self.table.lock().unwrap();
        t.signals.push((pid, signal));
        if !t.entries.contains_key(&pid) {
            return Ok(false);
        }
        t.apply(pid, signal);
        Ok(true)
    }

    async fn signal_group(&self, pid: u32, signal: ProcessSignal) -> Result<bool, DomainError> {
        let mut t = self.table.lock().unwrap();
        t.group_signals.push((pid, signal));
        let leader = t.group_leader(pid);
        let mut members: Vec<u32> = t.descendants(leader).iter().map(|e| e.pid).collect();
        if t.entries.contains_key(&leader) {
            members.push(leader);
        }
        if members.is_empty() {
            return Ok(false);
        }
        for pid in members {
            t.apply(pid, signal);
        }
        Ok(true)
    }

    async fn is_alive(&self, pid: u32) -> bool {
        self.alive(pid)
    }

    async fn descendants(&self, pid: u32) -> Vec<ProcessEntry> {
        self.table.lock().unwrap().descendants(pid)
    }

    async fn find_by_signature(&self, pattern: &str) -> Vec<ProcessEntry> {
        let t = self.table.lock().unwrap();
        t.entries
            .values()
            .filter(|e| e.cmdline.contains(pattern))
            .cloned()
            .collect()
    }

    async fn write_pid_file(&self, path: &Path, pid: u32) -> Result<(), DomainError> {
        self.set_pid_file(path, pid);
        Ok(())
    }

    async fn read_pid_file(&self, path: &Path) -> Option<u32> {
        self.pid_file(path)
    }

    async fn remove_pid_file(&self, path: &Path) {
        self.table.lock().unwrap().pid_files.remove(path);
    }
}

// ===== ProbeRunner =====

/// Probes pass unless an outcome was scripted for their target
#[derive(Default)]
pub struct FakeProbeRunner {
    outcomes: Mutex<BTreeMap<String, ProbeOutcome>>,
    calls: Mutex<Vec<(String, Duration)>>,
}

impl FakeProbeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_outcome(&self, probe: &HealthProbe, outcome: ProbeOutcome) {
        self.outcomes.lock().unwrap().insert(probe.target(), outcome);
    }

    pub fn calls(&self) -> Vec<(String, Duration)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProbeRunner for FakeProbeRunner {
    async fn run(&self, probe: &HealthProbe, timeout: Duration) -> ProbeOutcome {
        let target = probe.target();
        self.calls.lock().unwrap().push((target.clone(), timeout));
        self.outcomes
            .lock()
            .unwrap()
            .get(&target)
            .cloned()
            .unwrap_or(ProbeOutcome::Passed)
    }
}

// ===== HostSampler =====

struct SamplerState {
    total_bytes: u64,
    available_bytes: u64,
    queued: VecDeque<u64>,
    failures: u32,
    reads: usize,
}

/// Scripted RAM readings; the last reading repeats once the script runs out
pub struct FakeHostSampler {
    state: Mutex<SamplerState>,
}

impl FakeHostSampler {
    pub fn with_available_gb(gb: f64) -> Self {
        Self {
            state: Mutex::new(SamplerState {
                total_bytes: gb_to_bytes(16.0),
                available_bytes: gb_to_bytes(gb),
                queued: VecDeque::new(),
                failures: 0,
                reads: 0,
            }),
        }
    }

    pub fn set_available_gb(&self, gb: f64) {
        let mut s = self.state.lock().unwrap();
        s.queued.clear();
        s.available_bytes = gb_to_bytes(gb);
    }

    /// Readings returned by the next calls, in order
    pub fn queue_available_gb(&self, readings: &[f64]) {
        let mut s = self.state.lock().unwrap();
        s.queued.extend(readings.iter().map(|gb| gb_to_bytes(*gb)));
    }

    pub fn fail_next(&self, count: u32) {
        self.state.lock().unwrap().failures = count;
    }

    pub fn reads(&self) -> usize {
        self.state.lock().unwrap().reads
    }
}

#[async_trait]
impl HostSampler for FakeHostSampler {
    async fn memory(&self) -> Result<MemoryReading, DomainError> {
        let mut s = self.state.lock().unwrap();
        s.reads += 1;
        if s.failures > 0 {
            s.failures -= 1;
            return Err(DomainError::Sampling("scripted failure".to_string()));
        }
        if let Some(next) = s.queued.pop_front() {
            s.available_bytes = next;
        }
        Ok(MemoryReading {
            total_bytes: s.total_bytes,
            available_bytes: s.available_bytes,
        })
    }

    async fn cpu_percent(&self) -> f32 {
        12.5
    }
}

// ===== StateStore =====

#[derive(Default)]
pub struct InMemoryStateStore {
    stored: Mutex<Option<PersistedDaemonState>>,
    saves: Mutex<usize>,
    fail_saves: Mutex<bool>,
    corrupted: Mutex<bool>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PersistedDaemonState) -> Self {
        let store = Self::default();
        *store.stored.lock().unwrap() = Some(state);
        store
    }

    pub fn snapshot(&self) -> Option<PersistedDaemonState> {
        self.stored.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap()
    }

    pub fn fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap() = fail;
    }

    pub fn corrupt(&self) {
        *self.corrupted.lock().unwrap() = true;
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self) -> Result<Option<PersistedDaemonState>, DomainError> {
        if *self.corrupted.lock().unwrap() {
            return Err(DomainError::StateCorrupted("scripted corruption".to_string()));
        }
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn save(&self, state: &PersistedDaemonState) -> Result<(), DomainError> {
        if *self.fail_saves.lock().unwrap() {
            return Err(DomainError::Persistence("disk full".to_string()));
        }
        *self.stored.lock().unwrap() = Some(state.clone());
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }
}

// ===== Notifier =====

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, title: &str, message: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }
}
