//! Source-address authentication against the closed roster.

use std::net::IpAddr;

use thiserror::Error;

use crate::config::RosterConfig;
use crate::model::{Identity, Secret};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("address {0} is not registered")]
    Unregistered(IpAddr),
}

/// Fixed address -> identity mapping built at startup.
#[derive(Debug, Clone)]
pub struct Roster {
    config: RosterConfig,
    identities: Vec<Identity>,
}

impl Roster {
    pub fn new(config: RosterConfig) -> Self {
        let identities = (config.first_suffix..=config.last_suffix)
            .enumerate()
            .map(|(position, suffix)| {
                Identity::new(
                    format!("{}{suffix}", config.id_prefix),
                    Secret::from(suffix),
                    position,
                )
            })
            .collect();
        Self { config, identities }
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    /// Map a peer address to its identity. IPv4-mapped IPv6 peers are
    /// treated as their IPv4 form.
    pub fn authenticate(&self, addr: IpAddr) -> Result<&Identity, AuthError> {
        let canonical = addr.to_canonical();

        if self.config.dev_address == Some(canonical) {
            return self.identities.first().ok_or(AuthError::Unregistered(addr));
        }

        let IpAddr::V4(v4) = canonical else {
            return Err(AuthError::Unregistered(addr));
        };
        let [a, b, c, suffix] = v4.octets();
        if [a, b, c] != self.config.subnet
            || !(self.config.first_suffix..=self.config.last_suffix).contains(&suffix)
        {
            return Err(AuthError::Unregistered(addr));
        }

        let position = usize::from(suffix - self.config.first_suffix);
        self.identities
            .get(position)
            .ok_or(AuthError::Unregistered(addr))
    }
}
