//! Out-of-band repair of the index set against the primary keyspace.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::{KvBackend, KvMessageStore};
use crate::error::StoreError;
use crate::models::{MESSAGES_SET, MESSAGE_KEY_PREFIX};

/// Counts from one [`KvMessageStore::reconcile`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub scanned_index_entries: u64,
    /// Index members whose record no longer existed.
    pub removed_index_entries: u64,
    pub scanned_records: u64,
    /// Records that were missing from the index.
    pub reindexed_records: u64,
}

impl<B: KvBackend> KvMessageStore<B> {
    /// Makes the index set match the `message:*` keyspace.
    ///
    /// First drops index members without a record, then adds every record key
    /// to the index. The second pass runs last, so a record inserted while the
    /// first pass was running ends up indexed either way. A key the second pass
    /// adds is re-read afterwards and withdrawn again if a concurrent delete
    /// removed its record in between.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, batch_size: u64) -> Result<ReconcileReport, StoreError> {
        let batch_size = batch_size.max(1);
        let backend = self.backend();
        let mut report = ReconcileReport::default();

        let mut cursor = 0;
        loop {
            let (members, next) = self
                .call(
                    "reconcile",
                    backend.set_scan(MESSAGES_SET, cursor, "*", batch_size),
                )
                .await?
                .map_err(|e| StoreError::backend("reconcile", MESSAGES_SET, e))?;
            report.scanned_index_entries += members.len() as u64;

            if !members.is_empty() {
                let values = self
                    .call("reconcile", backend.multi_get(&members))
                    .await?
                    .map_err(|e| StoreError::backend("reconcile", MESSAGES_SET, e))?;

                for (member, value) in members.iter().zip(values) {
                    if value.is_some() {
                        continue;
                    }
                    let removed = self
                        .call("reconcile", backend.set_remove(MESSAGES_SET, member))
                        .await?
                        .map_err(|e| StoreError::backend("reconcile", member, e))?;
                    if removed {
                        warn!(key = %member, "Removed dangling index entry");
                        report.removed_index_entries += 1;
                    }
                }
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        let pattern = format!("{}*", MESSAGE_KEY_PREFIX);
        let mut cursor = 0;
        loop {
            let (keys, next) = self
                .call("reconcile", backend.scan_keys(cursor, &pattern, batch_size))
                .await?
                .map_err(|e| StoreError::backend("reconcile", &pattern, e))?;
            report.scanned_records += keys.len() as u64;

            for key in &keys {
                let added = self
                    .call("reconcile", backend.set_add(MESSAGES_SET, key))
                    .await?
                    .map_err(|e| StoreError::backend("reconcile", key, e))?;
                if !added {
                    continue;
                }
                // A delete may have committed after the key was scanned.
                let still_there = self
                    .call("reconcile", backend.get(key))
                    .await?
                    .map_err(|e| StoreError::backend("reconcile", key, e))?
                    .is_some();
                if still_there {
                    warn!(key = %key, "Indexed orphaned message");
                    report.reindexed_records += 1;
                } else {
                    self.call("reconcile", backend.set_remove(MESSAGES_SET, key))
                        .await?
                        .map_err(|e| StoreError::backend("reconcile", key, e))?;
                    debug!(key = %key, "Record deleted during reconcile, index entry withdrawn");
                }
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        info!(
            scanned_index_entries = report.scanned_index_entries,
            removed_index_entries = report.removed_index_entries,
            scanned_records = report.scanned_records,
            reindexed_records = report.reindexed_records,
            "Reconciliation finished"
        );
        Ok(report)
    }
}
