//! The record model exchanged with the reconciliation loop.

use std::collections::BTreeMap;
use std::fmt;
use std::iter::Peekable;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::Bytes;

use hickory_proto::rr::rdata::{A, AAAA, CNAME, MX, NS, PTR, SRV, TXT};
use hickory_proto::rr::{RData, Record, RecordType};

use crate::error::Rfc2136Error;

use super::{Name, TimeToLive, parse_fqdn};

/// Record types this provider reads and writes. Anything else found in a
/// zone transfer is ignored.
pub const MANAGED_TYPES: &[RecordType] = &[
    RecordType::A,
    RecordType::AAAA,
    RecordType::CNAME,
    RecordType::TXT,
    RecordType::NS,
    RecordType::PTR,
    RecordType::MX,
    RecordType::SRV,
];

/// Whether records of this type are managed by the provider.
pub fn is_managed(record_type: RecordType) -> bool {
    MANAGED_TYPES.contains(&record_type)
}

/// A named RRset: every target shares the name, type and TTL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub dns_name: String,
    pub record_type: RecordType,
    pub targets: Vec<String>,
    pub record_ttl: Option<TimeToLive>,
    pub labels: BTreeMap<String, String>,
    pub provider_specific: BTreeMap<String, String>,
}

impl Endpoint {
    pub fn new<T>(dns_name: impl Into<String>, record_type: RecordType, targets: T) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Endpoint {
            dns_name: dns_name.into(),
            record_type,
            targets: targets.into_iter().map(Into::into).collect(),
            record_ttl: None,
            labels: BTreeMap::new(),
            provider_specific: BTreeMap::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: impl Into<TimeToLive>) -> Self {
        self.record_ttl = Some(ttl.into());
        self
    }

    /// The fully qualified owner name.
    pub fn name(&self) -> Result<Name, Rfc2136Error> {
        parse_fqdn(&self.dns_name).map_err(|source| Rfc2136Error::InvalidName {
            name: self.dns_name.clone(),
            source,
        })
    }

    /// Whether both endpoints address the same RRset.
    pub fn same_rrset(&self, other: &Endpoint) -> bool {
        self.record_type == other.record_type
            && self
                .dns_name
                .trim_end_matches('.')
                .eq_ignore_ascii_case(other.dns_name.trim_end_matches('.'))
    }

    /// One wire record per target, all at `ttl`.
    pub fn to_records(&self, name: &Name, ttl: TimeToLive) -> Result<Vec<Record>, Rfc2136Error> {
        self.targets
            .iter()
            .map(|target| {
                let rdata = target_to_rdata(self.record_type, target).ok_or_else(|| {
                    Rfc2136Error::InvalidTarget {
                        name: name.clone(),
                        record_type: self.record_type,
                        target: target.clone(),
                    }
                })?;
                Ok(Record::from_rdata(name.clone(), ttl.as_secs(), rdata))
            })
            .collect()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.dns_name)?;
        if let Some(ttl) = self.record_ttl {
            write!(f, "{ttl} ")?;
        }
        write!(f, "IN {} [{}]", self.record_type, self.targets.join(";"))
    }
}

/// The changes the reconciliation loop wants published.
///
/// `update_old[i]` and `update_new[i]` describe the same RRset: the former
/// exactly as it is currently served, the latter as it should be.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub create: Vec<Endpoint>,
    pub delete: Vec<Endpoint>,
    pub update_old: Vec<Endpoint>,
    pub update_new: Vec<Endpoint>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.delete.is_empty()
            && self.update_old.is_empty()
            && self.update_new.is_empty()
    }

    /// Checks that updates come in matching old/new pairs.
    pub fn validate(&self) -> Result<(), Rfc2136Error> {
        if self.update_old.len() != self.update_new.len() {
            return Err(Rfc2136Error::UnpairedUpdate {
                index: self.update_old.len().min(self.update_new.len()),
                old: format!("{} records", self.update_old.len()),
                new: format!("{} records", self.update_new.len()),
            });
        }

        for (index, (old, new)) in self.update_old.iter().zip(&self.update_new).enumerate() {
            if !old.same_rrset(new) {
                return Err(Rfc2136Error::UnpairedUpdate {
                    index,
                    old: format!("{} {}", old.dns_name, old.record_type),
                    new: format!("{} {}", new.dns_name, new.record_type),
                });
            }
        }
        Ok(())
    }

    /// Everything to remove: previous versions of updated RRsets, then deletions.
    pub fn deletions(&self) -> impl Iterator<Item = &Endpoint> {
        self.update_old.iter().chain(self.delete.iter())
    }

    /// Everything to add: new versions of updated RRsets, then creations.
    pub fn insertions(&self) -> impl Iterator<Item = &Endpoint> {
        self.update_new.iter().chain(self.create.iter())
    }
}

/// Encodes a target string as record data of the given type.
pub fn target_to_rdata(record_type: RecordType, target: &str) -> Option<RData> {
    let rdata = match record_type {
        RecordType::A => RData::A(A::from(target.parse::<Ipv4Addr>().ok()?)),
        RecordType::AAAA => RData::AAAA(AAAA::from(target.parse::<Ipv6Addr>().ok()?)),
        RecordType::CNAME => RData::CNAME(CNAME(parse_fqdn(target).ok()?)),
        RecordType::NS => RData::NS(NS(parse_fqdn(target).ok()?)),
        RecordType::PTR => RData::PTR(PTR(parse_fqdn(target).ok()?)),
        RecordType::TXT => {
            let strings = parse_txt(target)?;
            RData::TXT(TXT::from_bytes(strings.iter().map(Vec::as_slice).collect()))
        }
        RecordType::MX => {
            let (preference, exchange) = target.split_once(char::is_whitespace)?;
            RData::MX(MX::new(
                preference.parse().ok()?,
                parse_fqdn(exchange.trim()).ok()?,
            ))
        }
        RecordType::SRV => {
            let mut fields = target.split_whitespace();
            let priority = fields.next()?.parse().ok()?;
            let weight = fields.next()?.parse().ok()?;
            let port = fields.next()?.parse().ok()?;
            let host = parse_fqdn(fields.next()?).ok()?;
            if fields.next().is_some() {
                return None;
            }
            RData::SRV(SRV::new(priority, weight, port, host))
        }
        _ => return None,
    };
    Some(rdata)
}

/// Renders record data in the target form used by [`Endpoint`].
pub fn rdata_to_target(rdata: &RData) -> Option<String> {
    let target = match rdata {
        RData::A(a) => a.0.to_string(),
        RData::AAAA(aaaa) => aaaa.0.to_string(),
        RData::CNAME(cname) => name_to_target(&cname.0),
        RData::NS(ns) => name_to_target(&ns.0),
        RData::PTR(ptr) => name_to_target(&ptr.0),
        RData::TXT(txt) => render_txt(txt.txt_data()),
        RData::MX(mx) => format!("{} {}", mx.preference(), name_to_target(mx.exchange())),
        RData::SRV(srv) => format!(
            "{} {} {} {}",
            srv.priority(),
            srv.weight(),
            srv.port(),
            name_to_target(srv.target())
        ),
        _ => return None,
    };
    Some(target)
}

/// Splits TXT data in zone file form into character-strings.
///
/// Strings are separated by whitespace unless quoted. `\X` and `\DDD`
/// escapes are honoured. A string longer than 255 octets is split.
fn parse_txt(target: &str) -> Option<Vec<Vec<u8>>> {
    let mut strings = Vec::new();
    let mut bytes = target.bytes().peekable();
    loop {
        while bytes.next_if(u8::is_ascii_whitespace).is_some() {}
        let quoted = match bytes.peek().copied() {
            None => break,
            Some(b'"') => bytes.next().is_some(),
            Some(_) => false,
        };

        let mut current = Vec::new();
        let mut closed = !quoted;
        while let Some(byte) = bytes.next() {
            match byte {
                b'"' if quoted => {
                    closed = true;
                    break;
                }
                b'\\' => current.push(unescape(&mut bytes)?),
                byte if !quoted && byte.is_ascii_whitespace() => break,
                byte => current.push(byte),
            }
        }
        if !closed {
            return None;
        }

        if current.is_empty() {
            strings.push(current);
        } else {
            strings.extend(current.chunks(255).map(<[u8]>::to_vec));
        }
    }

    if strings.is_empty() {
        strings.push(Vec::new());
    }
    Some(strings)
}

/// Reads the escape following a backslash.
fn unescape(bytes: &mut Peekable<Bytes<'_>>) -> Option<u8> {
    let first = bytes.next()?;
    if !first.is_ascii_digit() {
        return Some(first);
    }

    let mut value = u32::from(first - b'0');
    for _ in 0..2 {
        let digit = bytes.next().filter(u8::is_ascii_digit)?;
        value = value * 10 + u32::from(digit - b'0');
    }
    u8::try_from(value).ok()
}

/// Quotes each character-string, escaping what zone files cannot carry bare.
fn render_txt(strings: &[Box<[u8]>]) -> String {
    let mut rendered = String::new();
    for (index, data) in strings.iter().enumerate() {
        if index > 0 {
            rendered.push(' ');
        }
        rendered.push('"');
        for &byte in data.iter() {
            match byte {
                b'"' | b'\\' => {
                    rendered.push('\\');
                    rendered.push(char::from(byte));
                }
                0x20..=0x7e => rendered.push(char::from(byte)),
                _ => rendered.push_str(&format!("\\{byte:03}")),
            }
        }
        rendered.push('"');
    }
    rendered
}

/// Endpoint names carry no trailing dot.
pub fn name_to_target(name: &Name) -> String {
    name.to_ascii().trim_end_matches('.').to_string()
}
