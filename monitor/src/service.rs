//! Entry points used by the reporting and admin surfaces

use crate::aggregator::{aggregate, AggregatedRecord};
use crate::auth::Authorizer;
use crate::registry::{Registry, RegistryError};
use crate::scheduler::ProbeScheduler;
use log::warn;
use shared::{Endpoint, StatusResult};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("{caller} may not remove {host}:{port}")]
    Forbidden {
        caller: String,
        host: String,
        port: u16,
    },
}

/// Registry, scheduler and authorizer wired together
pub struct Monitor {
    registry: Arc<Registry>,
    scheduler: ProbeScheduler,
    authorizer: Box<dyn Authorizer>,
}

impl Monitor {
    pub fn new(
        registry: Arc<Registry>,
        scheduler: ProbeScheduler,
        authorizer: Box<dyn Authorizer>,
    ) -> Self {
        Self {
            registry,
            scheduler,
            authorizer,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Runs one probe cycle over the current registry snapshot.
    pub async fn status(&self) -> Vec<AggregatedRecord> {
        let snapshot = self.registry.list().await;
        let results = self.scheduler.run(&snapshot).await;
        aggregate(&snapshot, results)
    }

    /// Probes an address that need not be registered.
    pub async fn probe_one(&self, host: &str, port: u16) -> StatusResult {
        self.scheduler.probe().query(host, port).await
    }

    pub async fn add(
        &self,
        host: &str,
        port: u16,
        added_by: &str,
    ) -> Result<Endpoint, MonitorError> {
        Ok(self.registry.add(host, port, added_by).await?)
    }

    pub async fn list(&self) -> Vec<Endpoint> {
        self.registry.list().await
    }

    /// Removes an endpoint if the authorizer lets `caller` do so.
    pub async fn remove(
        &self,
        caller: &str,
        host: &str,
        port: u16,
    ) -> Result<Endpoint, MonitorError> {
        let authorizer = &self.authorizer;
        let result = self
            .registry
            .remove_if(host, port, |endpoint| authorizer.can_remove(caller, endpoint))
            .await;

        match result {
            Ok(endpoint) => Ok(endpoint),
            Err(RegistryError::Refused { host, port }) => {
                warn!("Refused removal of {}:{} by {}", host, port, caller);
                Err(MonitorError::Forbidden {
                    caller: caller.to_string(),
                    host,
                    port,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}
