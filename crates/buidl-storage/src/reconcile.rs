use std::sync::Arc;

use buidl_core::CanonicalRecord;
use serde::Serialize;
use tracing::debug;

use crate::store::{RecordStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Create / update / skip against persisted state, keyed by
/// `(source, source_id)`. Last write wins; callers reconcile a source's keys
/// one at a time.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub async fn reconcile(&self, record: &CanonicalRecord) -> Result<ReconcileOutcome, StoreError> {
        let existing = self
            .store
            .find(record.kind(), record.source(), record.source_id())
            .await?;

        let outcome = match existing {
            None => {
                self.store.insert(record).await?;
                ReconcileOutcome::Created
            }
            Some(stored) if stored.content_hash != record.content_hash() => {
                self.store.update(stored.id, record).await?;
                ReconcileOutcome::Updated
            }
            Some(_) => ReconcileOutcome::Unchanged,
        };
        debug!(
            source = %record.source(),
            source_id = record.source_id(),
            ?outcome,
            "reconciled record"
        );
        Ok(outcome)
    }
}
