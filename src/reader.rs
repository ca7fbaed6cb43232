//! Folds transferred resource records back into endpoints.

use std::collections::HashMap;

use hickory_proto::rr::{Record, RecordType};
use tracing::trace;

use crate::rr::{Endpoint, TimeToLive, is_managed, name_to_target, rdata_to_target};

/// Groups records by name and type, one endpoint per RRset.
///
/// Targets keep transfer order and are not deduplicated. The TTL comes from
/// the first record of each RRset. Unmanaged types are skipped.
pub fn aggregate<'r>(records: impl IntoIterator<Item = &'r Record>) -> Vec<Endpoint> {
    let mut endpoints: Vec<Endpoint> = Vec::new();
    let mut index: HashMap<(String, RecordType), usize> = HashMap::new();

    for record in records {
        let record_type = record.record_type();
        if !is_managed(record_type) {
            trace!(name = %record.name(), %record_type, "skipping unmanaged record");
            continue;
        }
        let Some(target) = rdata_to_target(record.data()) else {
            trace!(name = %record.name(), %record_type, "skipping record without data");
            continue;
        };

        let dns_name = name_to_target(record.name());
        let key = (dns_name.to_ascii_lowercase(), record_type);
        match index.get(&key) {
            Some(&position) => endpoints[position].targets.push(target),
            None => {
                index.insert(key, endpoints.len());
                endpoints.push(
                    Endpoint::new(dns_name, record_type, [target])
                        .with_ttl(TimeToLive::from_secs(record.ttl())),
                );
            }
        }
    }

    endpoints
}

#[cfg(test)]
mod tests {
    use hickory_proto::rr::RData;
    use hickory_proto::rr::rdata::{A, SOA, TXT};

    use super::*;
    use crate::rr::parse_fqdn;

    fn record(name: &str, ttl: u32, rdata: RData) -> Record {
        Record::from_rdata(parse_fqdn(name).unwrap(), ttl, rdata)
    }

    #[test]
    fn merges_rrsets() {
        let records = [
            record("foo.com", 3600, RData::A(A::new(1, 1, 1, 1))),
            record("foo.com", 3600, RData::A(A::new(2, 2, 2, 2))),
        ];
        let endpoints = aggregate(&records);
        assert_eq!(endpoints.len(), 1);

        let endpoint = &endpoints[0];
        assert_eq!(endpoint.dns_name, "foo.com");
        assert_eq!(endpoint.record_type, RecordType::A);
        assert_eq!(endpoint.targets, ["1.1.1.1", "2.2.2.2"]);
        assert_eq!(endpoint.record_ttl, Some(TimeToLive::from_secs(3600)));
        assert!(endpoint.labels.is_empty());
        assert!(endpoint.provider_specific.is_empty());
    }

    #[test]
    fn first_ttl_wins() {
        let records = [
            record("foo.com", 60, RData::TXT(TXT::new(vec!["a".into()]))),
            record("FOO.com", 120, RData::TXT(TXT::new(vec!["b".into()]))),
        ];
        let endpoints = aggregate(&records);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].record_ttl, Some(TimeToLive::from_secs(60)));
        assert_eq!(endpoints[0].targets, ["\"a\"", "\"b\""]);
    }

    #[test]
    fn skips_unmanaged() {
        let soa = SOA::new(
            parse_fqdn("ns.foo.com").unwrap(),
            parse_fqdn("admin.foo.com").unwrap(),
            1,
            60,
            60,
            60,
            60,
        );
        let records = [
            record("foo.com", 3600, RData::SOA(soa)),
            record("www.foo.com", 300, RData::A(A::new(10, 0, 0, 1))),
        ];
        let endpoints = aggregate(&records);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].dns_name, "www.foo.com");
    }

    #[test]
    fn keeps_duplicates_and_types_apart() {
        let records = [
            record("foo.com", 300, RData::A(A::new(1, 1, 1, 1))),
            record("foo.com", 300, RData::TXT(TXT::new(vec!["x".into()]))),
            record("foo.com", 300, RData::A(A::new(1, 1, 1, 1))),
        ];
        let endpoints = aggregate(&records);
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].targets, ["1.1.1.1", "1.1.1.1"]);
    }
}
