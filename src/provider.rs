//! The two operations the reconciliation loop drives: reading every managed
//! record, and publishing a change set as RFC 2136 updates.

use std::collections::BTreeMap;

use futures::future::join_all;
use hickory_proto::rr::{Name, Record};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::batch;
use crate::client::{DnsTransport, TransferRequest, Transport, UpdateRequest};
use crate::config::ProviderConfig;
use crate::error::{Rfc2136Error, TransportError};
use crate::reader;
use crate::rr::{ChangeSet, Endpoint, TimeToLive, Zone, Zones};
use crate::update::{MessageBuilder, Transaction};

/// Endpoints assigned to one zone, split by direction.
#[derive(Debug, Default)]
struct ZoneChanges<'c> {
    deletions: Vec<(Name, &'c Endpoint)>,
    insertions: Vec<(Name, &'c Endpoint)>,
}

/// The outcome of reading every zone.
///
/// Zones that transferred contribute their endpoints; zones that failed
/// contribute nothing and are listed in `failed`, in zone order. The caller
/// decides whether a partial read may drive reconciliation.
#[derive(Debug, Default)]
pub struct Records {
    pub endpoints: Vec<Endpoint>,
    pub failed: Vec<(Name, Rfc2136Error)>,
}

impl Records {
    /// True when every zone was read.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// The error of the first failing zone.
    pub fn first_error(&self) -> Option<&Rfc2136Error> {
        self.failed.first().map(|(_, error)| error)
    }

    /// The endpoints, or the first zone error if any zone failed.
    pub fn into_result(self) -> Result<Vec<Endpoint>, Rfc2136Error> {
        match self.failed.into_iter().next() {
            Some((_, error)) => Err(error),
            None => Ok(self.endpoints),
        }
    }
}

/// Publishes and reads records on an RFC 2136 capable name server.
#[derive(Debug)]
pub struct Provider<T = DnsTransport> {
    config: ProviderConfig,
    zones: Zones,
    builder: MessageBuilder,
    transport: T,
}

impl Provider<DnsTransport> {
    /// Creates a provider talking to the server named in `config`.
    pub fn new(config: ProviderConfig) -> Result<Self, Rfc2136Error> {
        let transport = DnsTransport::new(config.transport());
        Self::with_transport(config, transport)
    }
}

impl<T> Provider<T>
where
    T: Transport,
{
    /// Creates a provider delivering requests through `transport`.
    ///
    /// The configuration is checked up front: batch size, zone names and,
    /// when signing is enabled, the TSIG key.
    pub fn with_transport(config: ProviderConfig, transport: T) -> Result<Self, Rfc2136Error> {
        if config.batch_size == 0 {
            return Err(Rfc2136Error::InvalidConfiguration(
                "batch size must be at least 1".into(),
            ));
        }

        let zones = Zones::parse(&config.zones)?;
        let signer = match &config.tsig {
            Some(tsig) if config.is_signed() => Some(tsig.signer()?),
            _ => None,
        };
        let builder = MessageBuilder::new(signer, config.tsig_axfr);

        debug!(
            zones = zones.len(),
            signed = builder.is_signing(),
            batch_size = config.batch_size,
            "provider configured"
        );

        Ok(Provider {
            config,
            zones,
            builder,
            transport,
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn zones(&self) -> &Zones {
        &self.zones
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Reads every managed record in every zone.
    ///
    /// Zones are transferred concurrently. A zone whose transfer fails
    /// reports no records and its error is kept in [`Records::failed`];
    /// the other zones are still reported.
    #[instrument(skip_all, fields(zones = self.zones.len()))]
    pub async fn records(&self, cancel: &CancellationToken) -> Records {
        let mut records = Records::default();
        if !self.config.axfr {
            debug!("zone transfers disabled, reporting no records");
            return records;
        }

        let transfers = self
            .zones
            .iter()
            .map(|zone| async move { (zone, self.transfer(zone, cancel).await) });
        for (zone, result) in join_all(transfers).await {
            match result {
                Ok(zone_records) => records.endpoints.extend(reader::aggregate(&zone_records)),
                Err(error) => {
                    warn!(dns.zone = %zone, %error, "failed to read zone");
                    records.failed.push((zone.apex().clone(), error));
                }
            }
        }

        debug!(
            endpoints = records.endpoints.len(),
            failed = records.failed.len(),
            "read records"
        );
        records
    }

    /// Publishes `changes`.
    ///
    /// Nothing is sent unless every endpoint passing the domain filter
    /// belongs to a configured zone. Transactions are then sent one at a
    /// time in the order returned by [`Provider::plan`]; the first failure
    /// stops the remaining sends. Transactions already sent stay applied.
    #[instrument(
        skip_all,
        fields(
            create = changes.create.len(),
            delete = changes.delete.len(),
            update = changes.update_new.len(),
        )
    )]
    pub async fn apply_changes(
        &self,
        cancel: &CancellationToken,
        changes: &ChangeSet,
    ) -> Result<(), Rfc2136Error> {
        let transactions = self.plan(changes)?;
        if transactions.is_empty() {
            debug!("no changes to apply");
            return Ok(());
        }

        let total = transactions.len();
        for (index, transaction) in transactions.into_iter().enumerate() {
            let message = self.builder.update(&transaction)?;

            if self.config.dry_run {
                info!(
                    dns.zone = %transaction.zone(),
                    dns.id = message.id(),
                    "dry run, not sending update:\n{message}"
                );
                continue;
            }

            trace!(index, total, records = transaction.len(), "sending transaction");
            self.send(UpdateRequest::new(transaction, message), cancel)
                .await?;
        }

        debug!(transactions = total, "changes applied");
        Ok(())
    }

    /// Turns `changes` into the transactions that publish them, in send order.
    ///
    /// Endpoints outside the domain filter are dropped. The rest are grouped
    /// by owning zone, zones in ascending order. Within a zone, deletions
    /// (`update_old` then `delete`) and insertions (`update_new` then
    /// `create`) are chunked separately and transaction `i` carries
    /// deletion chunk `i` followed by insertion chunk `i`.
    pub fn plan(&self, changes: &ChangeSet) -> Result<Vec<Transaction>, Rfc2136Error> {
        changes.validate()?;

        let mut by_zone: BTreeMap<&Zone, ZoneChanges<'_>> = BTreeMap::new();
        for endpoint in changes.deletions() {
            if let Some((zone, name)) = self.assign(endpoint)? {
                by_zone
                    .entry(zone)
                    .or_default()
                    .deletions
                    .push((name, endpoint));
            }
        }
        for endpoint in changes.insertions() {
            if let Some((zone, name)) = self.assign(endpoint)? {
                by_zone
                    .entry(zone)
                    .or_default()
                    .insertions
                    .push((name, endpoint));
            }
        }

        let mut transactions = Vec::new();
        for (zone, changes) in by_zone {
            let deletions = batch::chunk(&changes.deletions, self.config.batch_size)?;
            let insertions = batch::chunk(&changes.insertions, self.config.batch_size)?;

            for index in 0..deletions.len().max(insertions.len()) {
                let mut transaction = Transaction::new(zone.clone());
                for (name, endpoint) in deletions.get(index).copied().unwrap_or_default() {
                    let ttl = endpoint.record_ttl.unwrap_or(TimeToLive::ZERO);
                    for record in endpoint.to_records(name, ttl)? {
                        transaction.delete(record);
                    }
                }
                for (name, endpoint) in insertions.get(index).copied().unwrap_or_default() {
                    let ttl = TimeToLive::effective(endpoint.record_ttl, self.config.min_ttl);
                    for record in endpoint.to_records(name, ttl)? {
                        transaction.insert(record);
                    }
                }

                if !transaction.is_empty() {
                    transactions.push(transaction);
                }
            }
        }

        trace!(transactions = transactions.len(), "planned changes");
        Ok(transactions)
    }

    /// The zone owning `endpoint`, or `None` when the domain filter excludes it.
    fn assign(&self, endpoint: &Endpoint) -> Result<Option<(&Zone, Name)>, Rfc2136Error> {
        if !self.config.domain_filter.matches(&endpoint.dns_name) {
            debug!(name = %endpoint.dns_name, "skipping endpoint outside the domain filter");
            return Ok(None);
        }
        let name = endpoint.name()?;
        let zone = self.zones.resolve(&name)?;
        Ok(Some((zone, name)))
    }

    async fn send(
        &self,
        request: UpdateRequest,
        cancel: &CancellationToken,
    ) -> Result<(), Rfc2136Error> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled.into()),
            result = self.transport.send(request) => result,
        }
    }

    async fn transfer(
        &self,
        zone: &Zone,
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>, Rfc2136Error> {
        let request = TransferRequest::new(zone.clone(), self.builder.transfer(zone)?);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled.into()),
            result = self.transport.transfer(request) => result,
        }
    }
}
