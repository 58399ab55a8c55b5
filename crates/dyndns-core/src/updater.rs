//! Reconcile the managed A record with a reported address.
//!
//! One update = list the zone, compare, and (only when the address differs)
//! commit a single change-set that deletes the old set and adds the new one.
//! The whole sequence runs under [`retry_transient`], so a retried attempt
//! re-reads the zone and never writes twice.

use crate::{
    cfg::Config,
    error::UpdateError,
    retry::{RetryPolicy, retry_transient},
    validate,
};
use dyndns_provider::{ChangeSet, ProviderError, RecordSet, RecordType, ZoneClient};
use std::{net::Ipv4Addr, sync::Arc};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Record already pointed at the address; nothing written.
    Unchanged,
    Created,
    Replaced { previous: String },
}

pub struct DnsUpdater {
    config: Arc<Config>,
    client: Arc<dyn ZoneClient>,
    policy: RetryPolicy,
}

impl DnsUpdater {
    pub fn new(config: Arc<Config>, client: Arc<dyn ZoneClient>) -> Self {
        let policy = RetryPolicy::from_config(&config);
        Self {
            config,
            client,
            policy,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Startup check: the configured zone must exist.
    pub async fn ensure_zone(&self) -> Result<(), UpdateError> {
        let exists = retry_transient(&self.policy, "zone_exists", || self.client.zone_exists()).await?;
        if exists {
            info!("{} zone `{}` found", self.client.name(), self.client.zone());
            Ok(())
        } else {
            Err(UpdateError::ZoneMissing(self.config.zone.clone()))
        }
    }

    pub fn validate_hostname(&self, hostname: &str) -> bool {
        validate::validate_hostname(hostname, &self.config.hostname)
    }

    /// Callers must have authorized the hostname already.
    pub async fn update_record(&self, ip: Ipv4Addr) -> Result<UpdateOutcome, UpdateError> {
        let name = self.config.record_name();
        let ip = ip.to_string();
        retry_transient(&self.policy, "update_record", || self.reconcile(&name, &ip)).await
    }

    async fn reconcile(&self, name: &str, ip: &str) -> Result<UpdateOutcome, ProviderError> {
        let existing = self
            .client
            .list_record_sets()
            .await?
            .into_iter()
            .find(|rr| rr.matches(name, RecordType::A));

        if let Some(old) = &existing
            && old.first_data() == Some(ip)
        {
            info!(hostname = name, ip, "record already up to date, skipping");
            return Ok(UpdateOutcome::Unchanged);
        }

        let new = RecordSet::new(name, RecordType::A, self.config.ttl, vec![ip.to_owned()]);
        let mut changes = ChangeSet::new();
        let outcome = match existing {
            Some(old) => {
                let previous = old.first_data().unwrap_or_default().to_owned();
                info!(hostname = name, from = %previous, to = ip, "replacing record");
                changes = changes.delete(old);
                UpdateOutcome::Replaced { previous }
            }
            None => {
                info!(hostname = name, ip, "creating record");
                UpdateOutcome::Created
            }
        };

        self.client.apply_changes(&changes.add(new)).await?;
        Ok(outcome)
    }
}
