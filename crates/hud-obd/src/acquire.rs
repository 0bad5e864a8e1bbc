//! Per-cycle telemetry acquisition
//!
//! One query per polled catalog entry, all issued concurrently against the
//! shared connection. The connection serializes them on the wire; a
//! failing query only nulls its own field.

use std::sync::Arc;

use futures::future::join_all;
use hud_core::{Normalizer, ParameterCatalog, ParameterDescriptor, RawQueryResult, TelemetrySnapshot};
use tracing::{debug, warn};

use crate::connection::AdapterConnection;

/// Queries the adapter and builds snapshots
#[derive(Debug, Clone)]
pub struct TelemetryAcquirer {
    catalog: Arc<ParameterCatalog>,
    normalizer: Normalizer,
}

impl TelemetryAcquirer {
    pub fn new(catalog: Arc<ParameterCatalog>) -> Self {
        let normalizer = Normalizer::new(catalog.clone());
        Self {
            catalog,
            normalizer,
        }
    }

    pub fn catalog(&self) -> &ParameterCatalog {
        &self.catalog
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Query every polled entry and wait for all of them
    ///
    /// Results come back in catalog order, one per polled entry.
    pub async fn acquire(&self, connection: &AdapterConnection) -> Vec<RawQueryResult> {
        let queries = self
            .catalog
            .polled()
            .map(|descriptor| query_descriptor(connection, descriptor));
        join_all(queries).await
    }

    /// One full cycle: fan-out, normalize, then the conditional trouble-code
    /// query
    ///
    /// A normalization failure yields an `OBD_QUERY_ERROR` snapshot.
    pub async fn snapshot(&self, connection: &AdapterConnection) -> TelemetrySnapshot {
        let results = self.acquire(connection).await;
        let failed = results.iter().filter(|r| r.failed).count();
        debug!(queried = results.len(), failed, "Acquisition cycle complete");

        let mut snapshot = match self.normalizer.normalize(&results) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Failed to normalize telemetry");
                return self.normalizer.query_error(&e);
            }
        };

        if snapshot.trouble_codes_due() {
            if let Some(descriptor) = self.catalog.trouble_codes() {
                debug!(dtc_count = snapshot.dtc_count, "MIL on, querying trouble codes");
                let result = query_descriptor(connection, descriptor).await;
                self.normalizer.apply_trouble_codes(&mut snapshot, &result);
            }
        }

        snapshot
    }
}

async fn query_descriptor(
    connection: &AdapterConnection,
    descriptor: &ParameterDescriptor,
) -> RawQueryResult {
    let Some(command) = descriptor.command else {
        return RawQueryResult::failed(descriptor.output_key);
    };

    match connection.query(command).await {
        Ok(response) => {
            debug!(command, value = %response.value, "Query complete");
            RawQueryResult::ok(descriptor.output_key, response.value, response.unit)
        }
        Err(e) => {
            debug!(command, error = %e, "Query failed");
            RawQueryResult::failed(descriptor.output_key)
        }
    }
}
