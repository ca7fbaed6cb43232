//! Record, zone and TTL definitions

mod endpoint;
mod ttl;
mod zone;

pub use self::endpoint::{
    ChangeSet, Endpoint, MANAGED_TYPES, is_managed, name_to_target, rdata_to_target,
    target_to_rdata,
};
pub use self::ttl::TimeToLive;
pub use self::zone::{Zone, Zones};

/// DNS Name with case preserved.
pub use hickory_proto::rr::Name;

/// Parses a possibly relative name as fully qualified.
///
/// `""` and `"."` both name the root.
pub fn parse_fqdn(name: &str) -> Result<Name, hickory_proto::ProtoError> {
    let name = name.trim().trim_end_matches('.');
    if name.is_empty() {
        return Ok(Name::root());
    }
    Name::from_utf8(format!("{name}."))
}
