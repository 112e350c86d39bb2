//! Address bans.
//!
//! Global bans are checked before a server's local bans, and the first match wins.

use crate::config::BanRule;
use crate::error::{AdminError, Result};
use std::net::{IpAddr, Ipv4Addr};
use tracing::warn;

/// What a ban matches against a player's address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressPattern {
    /// One address
    Exact(IpAddr),
    /// IPv4 block, `a.b.c.d/n`
    Cidr { network: u32, prefix: u8 },
    /// Textual prefix, written `10.0.*`; stored without the `*`
    Wildcard(String),
}

impl AddressPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let pattern = pattern.trim();
        let invalid = || AdminError::Config(format!("invalid ban pattern '{pattern}'"));

        if let Some(prefix) = pattern.strip_suffix('*') {
            if prefix.is_empty() || !prefix.ends_with('.') {
                return Err(invalid());
            }
            return Ok(AddressPattern::Wildcard(prefix.to_string()));
        }

        if let Some((addr, bits)) = pattern.split_once('/') {
            let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
            let prefix: u8 = bits.parse().map_err(|_| invalid())?;
            if prefix > 32 {
                return Err(invalid());
            }
            return Ok(AddressPattern::Cidr {
                network: u32::from(addr) & mask(prefix),
                prefix,
            });
        }

        pattern
            .parse::<IpAddr>()
            .map(AddressPattern::Exact)
            .map_err(|_| invalid())
    }

    pub fn matches(&self, address: &str) -> bool {
        match self {
            AddressPattern::Exact(ip) => address.parse::<IpAddr>().is_ok_and(|a| a == *ip),
            AddressPattern::Cidr { network, prefix } => address
                .parse::<Ipv4Addr>()
                .is_ok_and(|a| u32::from(a) & mask(*prefix) == *network),
            AddressPattern::Wildcard(prefix) => address.starts_with(prefix.as_str()),
        }
    }
}

fn mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanEntry {
    pub pattern: AddressPattern,
    /// As written by the operator
    pub source: String,
    pub reason: String,
}

/// An ordered list of bans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BanList {
    entries: Vec<BanEntry>,
}

impl BanList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configuration. Rules with invalid patterns are skipped with a warning.
    pub fn from_rules(rules: &[BanRule]) -> Self {
        let mut list = Self::new();
        for rule in rules {
            if let Err(e) = list.add(&rule.pattern, &rule.reason) {
                warn!(pattern = %rule.pattern, error = %e, "skipping ban");
            }
        }
        list
    }

    pub fn add(&mut self, pattern: &str, reason: &str) -> Result<()> {
        let parsed = AddressPattern::parse(pattern)?;
        self.entries.push(BanEntry {
            pattern: parsed,
            source: pattern.trim().to_string(),
            reason: reason.to_string(),
        });
        Ok(())
    }

    /// Remove every ban written as `pattern`. Returns whether anything was removed.
    pub fn remove(&mut self, pattern: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.source != pattern.trim());
        self.entries.len() != before
    }

    /// `(pattern, reason)` pairs in check order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|e| (e.source.as_str(), e.reason.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First ban matching `address`.
    pub fn find_match(&self, address: &str) -> Option<&BanEntry> {
        self.entries.iter().find(|e| e.pattern.matches(address))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanScope {
    Global,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanMatch {
    pub scope: BanScope,
    pub reason: String,
}

impl BanMatch {
    /// Notice shown to the banned player.
    pub fn notice(&self) -> String {
        let scope = match self.scope {
            BanScope::Global => "global",
            BanScope::Local => "local",
        };
        format!("Your IP/Userinfo matches a {scope} ban: {}\n", self.reason)
    }
}

/// Check `address` against global bans, then local ones. A global match short-circuits.
pub fn check_bans(global: &BanList, local: &BanList, address: &str) -> Option<BanMatch> {
    if let Some(entry) = global.find_match(address) {
        return Some(BanMatch {
            scope: BanScope::Global,
            reason: entry.reason.clone(),
        });
    }
    local.find_match(address).map(|entry| BanMatch {
        scope: BanScope::Local,
        reason: entry.reason.clone(),
    })
}
