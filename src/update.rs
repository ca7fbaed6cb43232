//! Zone-scoped update transactions and the messages that carry them.

use chrono::Utc;
use hickory_proto::op::{Message, MessageType, OpCode, Query, UpdateMessage};
use hickory_proto::rr::{DNSClass, Record, RecordType};
use tracing::trace;

use crate::error::Rfc2136Error;
use crate::rr::Zone;
use crate::tsig::Signer;

/// One entry of a transaction's update section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change<'t> {
    /// Remove exactly this record from its RRset (class NONE).
    Deletion(&'t Record),
    /// Add this record to its RRset (class IN).
    Insertion(&'t Record),
}

impl<'t> Change<'t> {
    pub fn record(&self) -> &'t Record {
        match self {
            Change::Deletion(record) | Change::Insertion(record) => record,
        }
    }

    pub fn is_deletion(&self) -> bool {
        matches!(self, Change::Deletion(_))
    }
}

/// The deletions and insertions sent to one zone in a single UPDATE message.
///
/// [RFC 2136](https://tools.ietf.org/html/rfc2136), DNS Update, April 1997
///
/// ```text
///   CLASS    TYPE     RDATA    Meaning
///   ---------------------------------------------------------
///   NONE     rrset    rr       Delete an RR from an RRset
///   zone     rrset    rr       Add to an RRset
/// ```
///
/// Deletions keep the TTL they were queued with. RFC 2136 section 2.5.4
/// specifies TTL 0 for class NONE records and strict servers answer
/// FORMERR otherwise; queue deletions with [`TimeToLive::ZERO`] for those.
///
/// [`TimeToLive::ZERO`]: crate::rr::TimeToLive::ZERO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    zone: Zone,
    deletions: Vec<Record>,
    insertions: Vec<Record>,
}

impl Transaction {
    pub fn new(zone: Zone) -> Self {
        Transaction {
            zone,
            deletions: Vec::new(),
            insertions: Vec::new(),
        }
    }

    /// Queues removal of `record`. Name, type, TTL and data are kept as given;
    /// see the type docs for servers that require a zero TTL.
    pub fn delete(&mut self, mut record: Record) -> &mut Self {
        record.set_dns_class(DNSClass::NONE);
        self.deletions.push(record);
        self
    }

    pub fn insert(&mut self, mut record: Record) -> &mut Self {
        record.set_dns_class(DNSClass::IN);
        self.insertions.push(record);
        self
    }

    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    pub fn deletions(&self) -> &[Record] {
        &self.deletions
    }

    pub fn insertions(&self) -> &[Record] {
        &self.insertions
    }

    /// Update section entries, deletions first.
    pub fn changes(&self) -> impl Iterator<Item = Change<'_>> {
        self.deletions
            .iter()
            .map(Change::Deletion)
            .chain(self.insertions.iter().map(Change::Insertion))
    }

    pub fn len(&self) -> usize {
        self.deletions.len() + self.insertions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty() && self.insertions.is_empty()
    }

    /// Every record must lie inside the transaction's zone.
    pub fn validate(&self) -> Result<(), Rfc2136Error> {
        match self
            .changes()
            .map(|change| change.record())
            .find(|record| !self.zone.contains(record.name()))
        {
            Some(record) => Err(Rfc2136Error::ZoneMismatch {
                zone: self.zone.apex().clone(),
                name: record.name().clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Builds wire messages for transactions and zone transfers, signing them
/// when a key is configured.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    signer: Option<Signer>,
    sign_transfers: bool,
}

impl MessageBuilder {
    pub fn new(signer: Option<Signer>, sign_transfers: bool) -> Self {
        MessageBuilder {
            signer,
            sign_transfers,
        }
    }

    pub fn is_signing(&self) -> bool {
        self.signer.is_some()
    }

    /// Builds the UPDATE message for `transaction`.
    ///
    /// The zone section names the transaction's zone, the prerequisite
    /// section stays empty and the update section holds deletions followed
    /// by insertions.
    pub fn update(&self, transaction: &Transaction) -> Result<Message, Rfc2136Error> {
        transaction.validate()?;

        let mut message = Message::new();
        message
            .set_id(rand::random())
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Update)
            .set_recursion_desired(false);

        let mut zone = Query::new();
        zone.set_name(transaction.zone().apex().clone())
            .set_query_class(DNSClass::IN)
            .set_query_type(RecordType::SOA);
        message.add_zone(zone);

        for change in transaction.changes() {
            message.add_update(change.record().clone());
        }

        trace!(
            dns.id = message.id(),
            dns.zone = %transaction.zone(),
            deletions = transaction.deletions().len(),
            insertions = transaction.insertions().len(),
            "built update message"
        );

        if let Some(signer) = &self.signer {
            sign(&mut message, signer)?;
        }
        Ok(message)
    }

    /// Builds the AXFR query for `zone`.
    pub fn transfer(&self, zone: &Zone) -> Result<Message, Rfc2136Error> {
        let mut message = Message::new();
        message
            .set_id(rand::random())
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(false);

        let mut query = Query::new();
        query
            .set_name(zone.apex().clone())
            .set_query_class(DNSClass::IN)
            .set_query_type(RecordType::AXFR);
        message.add_query(query);

        match &self.signer {
            Some(signer) if self.sign_transfers => sign(&mut message, signer)?,
            _ => {}
        }
        Ok(message)
    }
}

fn sign(message: &mut Message, signer: &Signer) -> Result<(), Rfc2136Error> {
    let now = Utc::now().timestamp().try_into().map_err(|_| {
        Rfc2136Error::AuthConfiguration("system clock is outside the signable range".into())
    })?;
    message
        .finalize(signer.tsigner(), now)
        .map_err(|error| Rfc2136Error::AuthConfiguration(format!("signing failed: {error}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use hickory_proto::rr::RData;
    use hickory_proto::rr::rdata::A;

    use super::*;
    use crate::rr::parse_fqdn;
    use crate::tsig::TsigConfig;

    fn a(name: &str, ttl: u32, ip: [u8; 4]) -> Record {
        Record::from_rdata(
            parse_fqdn(name).unwrap(),
            ttl,
            RData::A(A::new(ip[0], ip[1], ip[2], ip[3])),
        )
    }

    fn zone(apex: &str) -> Zone {
        apex.parse().unwrap()
    }

    #[test]
    fn deletions_precede_insertions() {
        let mut txn = Transaction::new(zone("foo.com"));
        txn.insert(a("v1.foo.com", 400, [1, 2, 3, 5]));
        txn.delete(a("v1.foo.com", 400, [1, 2, 3, 4]));

        let message = MessageBuilder::default().update(&txn).unwrap();
        assert_eq!(message.op_code(), OpCode::Update);

        let zones = message.zones();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].query_type(), RecordType::SOA);
        assert_eq!(zones[0].name(), &parse_fqdn("foo.com").unwrap());

        assert!(message.prerequisites().is_empty());
        let updates = message.updates();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].dns_class(), DNSClass::NONE);
        assert_eq!(updates[0].ttl(), 400);
        assert_eq!(updates[0].data(), &RData::A(A::new(1, 2, 3, 4)));
        assert_eq!(updates[1].dns_class(), DNSClass::IN);
        assert_eq!(updates[1].data(), &RData::A(A::new(1, 2, 3, 5)));
    }

    #[test]
    fn deletion_ttl_is_not_rewritten() {
        let mut txn = Transaction::new(zone("foo.com"));
        txn.delete(a("v1.foo.com", 0, [1, 2, 3, 4]))
            .delete(a("v2.foo.com", 60, [1, 2, 3, 4]));

        let message = MessageBuilder::default().update(&txn).unwrap();
        let ttls: Vec<u32> = message.updates().iter().map(|r| r.ttl()).collect();
        assert_eq!(ttls, [0, 60]);
        assert!(message.updates().iter().all(|r| r.dns_class() == DNSClass::NONE));
    }

    #[test]
    fn out_of_zone_record_is_rejected() {
        let mut txn = Transaction::new(zone("foo.com"));
        txn.insert(a("v1.foo.com", 300, [1, 2, 3, 4]));
        txn.insert(a("v1.bar.com", 300, [1, 2, 3, 4]));

        assert!(matches!(
            MessageBuilder::default().update(&txn),
            Err(Rfc2136Error::ZoneMismatch { .. })
        ));

        let mut root = Transaction::new(Zone::root());
        root.insert(a("v1.bar.com", 300, [1, 2, 3, 4]));
        assert!(root.validate().is_ok());
    }

    #[test]
    fn changes_are_tagged() {
        let mut txn = Transaction::new(zone("foo.com"));
        txn.insert(a("b.foo.com", 300, [1, 1, 1, 1]));
        txn.delete(a("a.foo.com", 300, [2, 2, 2, 2]));
        let tags: Vec<bool> = txn.changes().map(|c| c.is_deletion()).collect();
        assert_eq!(tags, [true, false]);
        assert_eq!(txn.len(), 2);
    }

    #[test]
    fn signed_update_carries_tsig() {
        let signer = TsigConfig::new("update-key", "c2VjcmV0LWtleS1tYXRlcmlhbCE=", "hmac-sha256")
            .signer()
            .unwrap();
        let builder = MessageBuilder::new(Some(signer), false);

        let mut txn = Transaction::new(zone("foo.com"));
        txn.insert(a("v1.foo.com", 300, [1, 2, 3, 4]));
        let message = builder.update(&txn).unwrap();
        assert!(message.signature().iter().any(|r| r.record_type() == RecordType::TSIG));

        let transfer = builder.transfer(&zone("foo.com")).unwrap();
        assert!(transfer.signature().is_empty());
    }

    #[test]
    fn transfer_query() {
        let message = MessageBuilder::default().transfer(&zone("foo.com")).unwrap();
        assert_eq!(message.queries().len(), 1);
        assert_eq!(message.queries()[0].query_type(), RecordType::AXFR);
        assert_eq!(message.op_code(), OpCode::Query);
    }
}
