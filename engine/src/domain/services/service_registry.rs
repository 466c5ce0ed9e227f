//! Service Registry
//! Static, ordered description of every manageable or observable service

use crate::domain::entities::ServiceDescriptor;
use crate::domain::DomainError;
use std::collections::HashSet;

/// Registry order is declaration order; it is never mutated after load
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: Vec<ServiceDescriptor>,
}

impl ServiceRegistry {
    pub fn new(services: Vec<ServiceDescriptor>) -> Result<Self, DomainError> {
        let mut seen = HashSet::new();
        for service in &services {
            if !seen.insert(service.name().to_string()) {
                return Err(DomainError::DuplicateService(service.name().to_string()));
            }
        }
        Ok(Self { services })
    }

    pub fn get(&self, name: &str) -> Result<&ServiceDescriptor, DomainError> {
        self.services
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| DomainError::ServiceNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.iter().any(|s| s.name() == name)
    }

    pub fn all(&self) -> &[ServiceDescriptor] {
        &self.services
    }

    pub fn filter<P>(&self, predicate: P) -> Vec<&ServiceDescriptor>
    where
        P: Fn(&ServiceDescriptor) -> bool,
    {
        self.services.iter().filter(|s| predicate(s)).collect()
    }

    /// Services this daemon controls
    pub fn managed(&self) -> Vec<&ServiceDescriptor> {
        self.filter(|s| !s.is_external())
    }

    /// Services only observed
    pub fn external(&self) -> Vec<&ServiceDescriptor> {
        self.filter(|s| s.is_external())
    }

    pub fn names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
