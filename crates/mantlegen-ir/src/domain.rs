//! Clock domains.
//!
//! A clock domain is an identity object shared by signals and ports to assert
//! that they are synchronous. Connecting nodes from different domains is a
//! warning, not an error; no crossing logic is inserted automatically.

use serde::{Deserialize, Serialize};

use crate::world::{DomainId, World};

/// A named clock domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockDomainData {
    /// Domain name.
    pub name: String,
}

impl World {
    /// Create a new clock domain.
    pub fn clock_domain(&mut self, name: &str) -> DomainId {
        let id = DomainId(self.domains.len() as u32);
        self.domains.push(ClockDomainData {
            name: name.to_string(),
        });
        id
    }

    /// Find a clock domain by name, creating it if absent.
    pub fn domain_named(&mut self, name: &str) -> DomainId {
        for (i, d) in self.domains.iter().enumerate() {
            if d.name == name {
                return DomainId(i as u32);
            }
        }
        self.clock_domain(name)
    }
}
