//! Closed set of supervisor commands

use std::fmt;

/// A command addressed to one service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceAction {
    Start(String),
    Stop(String),
    Pause(String),
    Resume(String),
    HealthCheck(String),
}

impl ServiceAction {
    /// Target service name
    pub fn name(&self) -> &str {
        match self {
            ServiceAction::Start(n)
            | ServiceAction::Stop(n)
            | ServiceAction::Pause(n)
            | ServiceAction::Resume(n)
            | ServiceAction::HealthCheck(n) => n,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            ServiceAction::Start(_) => "start",
            ServiceAction::Stop(_) => "stop",
            ServiceAction::Pause(_) => "pause",
            ServiceAction::Resume(_) => "resume",
            ServiceAction::HealthCheck(_) => "health-check",
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb(), self.name())
    }
}
