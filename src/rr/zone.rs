use std::fmt;

use hickory_proto::ProtoError;

use crate::error::Rfc2136Error;

use super::{Name, parse_fqdn};

/// An administrative boundary, identified by its apex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Zone {
    apex: Name,
}

impl Zone {
    pub fn new(apex: Name) -> Self {
        Zone {
            apex: apex.to_lowercase(),
        }
    }

    /// The root zone, which owns every name.
    pub fn root() -> Self {
        Zone { apex: Name::root() }
    }

    pub fn apex(&self) -> &Name {
        &self.apex
    }

    pub fn is_root(&self) -> bool {
        self.apex.is_root()
    }

    /// Whether `name` is the apex or lies below it. Case-insensitive.
    pub fn contains(&self, name: &Name) -> bool {
        self.apex.zone_of(&name.to_lowercase())
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.apex)
    }
}

impl std::str::FromStr for Zone {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fqdn(s).map(Zone::new)
    }
}

/// The zones a provider is responsible for.
///
/// Kept in ascending apex order, which is also the order updates are sent in.
/// An empty configuration means the root zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zones {
    zones: Vec<Zone>,
}

impl Zones {
    pub fn new(zones: impl IntoIterator<Item = Zone>) -> Self {
        let mut zones: Vec<Zone> = zones.into_iter().collect();
        zones.sort();
        zones.dedup();
        if zones.is_empty() {
            zones.push(Zone::root());
        }
        Zones { zones }
    }

    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self, Rfc2136Error> {
        names
            .iter()
            .map(|name| {
                name.as_ref().parse::<Zone>().map_err(|error| {
                    Rfc2136Error::InvalidConfiguration(format!(
                        "zone {:?}: {error}",
                        name.as_ref()
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Zones::new)
    }

    /// Finds the zone owning `name`: the configured zone with the longest
    /// apex that `name` equals or lies under.
    pub fn resolve(&self, name: &Name) -> Result<&Zone, Rfc2136Error> {
        self.zones
            .iter()
            .filter(|zone| zone.contains(name))
            .max_by_key(|zone| zone.apex.num_labels())
            .ok_or_else(|| Rfc2136Error::NotOwned { name: name.clone() })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

impl Default for Zones {
    fn default() -> Self {
        Zones::new([])
    }
}
