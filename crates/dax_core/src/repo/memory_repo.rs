//! Transient DAX repository held in process memory.
//!
//! # Responsibility
//! - Mirror the durable store's observable behavior without any I/O.
//! - Serve tests, demos and short-lived tooling runs.
//!
//! # Invariants
//! - All state sits behind one reader/writer lock owned by the store.
//! - Reads share the lock; `create`, `bulk_upsert` and `delete_all` hold it
//!   exclusively for their whole duration.
//! - `keys` always maps every stored business key to exactly one row id.
//! - A failing `bulk_upsert` is rolled back before the lock is released.

use crate::model::envelope::{DaxFilter, PageRequest, RecordPage};
use crate::model::record::{listing_order, DaxKey, DaxRecord, DaxRecordId};
use crate::repo::{describe_record, DaxRepository, RepoError, RepoResult};
use chrono::Utc;
use log::debug;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryState {
    rows: HashMap<DaxRecordId, DaxRecord>,
    keys: HashMap<DaxKey, DaxRecordId>,
}

/// Pre-image of one row touched by a batch, used for rollback.
struct UndoEntry {
    id: DaxRecordId,
    previous: Option<DaxRecord>,
}

impl MemoryState {
    fn insert_new(&mut self, id: DaxRecordId, record: DaxRecord) -> RepoResult<()> {
        let key = record.key();
        if self.rows.contains_key(&id) || self.keys.contains_key(&key) {
            return Err(RepoError::Conflict(describe_record(&record)));
        }

        self.keys.insert(key, id);
        self.rows.insert(id, record);
        Ok(())
    }

    fn upsert(&mut self, id: DaxRecordId, record: DaxRecord) -> RepoResult<UndoEntry> {
        let Some(existing_id) = self.keys.get(&record.key()).copied() else {
            self.insert_new(id, record)?;
            return Ok(UndoEntry { id, previous: None });
        };

        let existing = self.rows.get_mut(&existing_id).ok_or_else(|| {
            RepoError::InvalidData(format!("key index points at missing row {existing_id}"))
        })?;
        let previous = existing.clone();
        existing.report_type = record.report_type;
        existing.value = record.value;
        existing.currency = record.currency;
        existing.updated_at = record.updated_at;

        Ok(UndoEntry {
            id: existing_id,
            previous: Some(previous),
        })
    }

    fn undo(&mut self, entry: UndoEntry) {
        match entry.previous {
            // Upserts never change a row's key, so the index is still valid.
            Some(previous) => {
                self.rows.insert(entry.id, previous);
            }
            None => {
                if let Some(removed) = self.rows.remove(&entry.id) {
                    self.keys.remove(&removed.key());
                }
            }
        }
    }
}

/// In-process DAX repository guarded by a single `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryDaxRepository {
    state: RwLock<MemoryState>,
}

impl MemoryDaxRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DaxRepository for MemoryDaxRepository {
    fn create(&self, record: &mut DaxRecord) -> RepoResult<DaxRecordId> {
        let mut stamped = record.stamped(Utc::now());
        let id = *stamped.id.get_or_insert_with(Uuid::new_v4);

        self.state.write().insert_new(id, stamped.clone())?;

        *record = stamped;
        Ok(id)
    }

    fn bulk_upsert(&self, records: &[DaxRecord]) -> RepoResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let mut state = self.state.write();
        let mut journal = Vec::with_capacity(records.len());

        for record in records {
            let mut stamped = record.stamped(now);
            let id = *stamped.id.get_or_insert_with(Uuid::new_v4);

            match state.upsert(id, stamped) {
                Ok(entry) => journal.push(entry),
                Err(err) => {
                    for entry in journal.into_iter().rev() {
                        state.undo(entry);
                    }
                    return Err(err);
                }
            }
        }

        debug!(
            "event=dax_bulk_upsert module=repo store=memory status=ok records={}",
            records.len()
        );
        Ok(())
    }

    fn find_all(&self, page: PageRequest) -> RepoResult<RecordPage> {
        self.find_by_filters(&DaxFilter::default(), page)
    }

    fn find_by_filters(&self, filter: &DaxFilter, page: PageRequest) -> RepoResult<RecordPage> {
        let state = self.state.read();
        let mut matches: Vec<&DaxRecord> = state
            .rows
            .values()
            .filter(|record| filter.matches(record))
            .collect();
        matches.sort_by(|left, right| listing_order(left, right));

        let total_count = matches.len() as u64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let records = matches
            .into_iter()
            .skip(offset)
            .take(page.limit as usize)
            .cloned()
            .collect();

        Ok(RecordPage {
            records,
            total_count,
        })
    }

    fn get_metrics(&self, ticker: &str) -> RepoResult<Vec<String>> {
        let state = self.state.read();
        let metrics: BTreeSet<&str> = state
            .rows
            .values()
            .filter(|record| record.ticker == ticker)
            .map(|record| record.metric.as_str())
            .collect();

        Ok(metrics.into_iter().map(str::to_string).collect())
    }

    fn delete_all(&self) -> RepoResult<()> {
        let mut state = self.state.write();
        let removed = state.rows.len();
        *state = MemoryState::default();
        debug!("event=dax_delete_all module=repo store=memory status=ok removed={removed}");
        Ok(())
    }

    fn count(&self) -> RepoResult<u64> {
        Ok(self.state.read().rows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ticker: &str, metric: &str, value: f64) -> DaxRecord {
        DaxRecord::new("Company", ticker, "income", metric, 2025, Some(value), "EUR")
    }

    #[test]
    fn failed_batch_leaves_store_unchanged() {
        let repo = MemoryDaxRepository::new();
        let mut seeded = record("AAA", "Revenue", 1.0);
        let seeded_id = repo.create(&mut seeded).unwrap();

        // Second element reuses the seeded id under a different key.
        let mut clashing = record("BBB", "Revenue", 3.0);
        clashing.id = Some(seeded_id);
        let batch = vec![record("AAA", "Revenue", 2.0), clashing];

        let err = repo.bulk_upsert(&batch).unwrap_err();
        assert!(matches!(err, RepoError::Conflict(_)));

        let page = repo.find_all(PageRequest::new(1, 10)).unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.records[0].value, Some(1.0));
        assert_eq!(page.records[0].updated_at, seeded.updated_at);
    }

    #[test]
    fn key_index_tracks_rows_after_delete_all() {
        let repo = MemoryDaxRepository::new();
        repo.bulk_upsert(&[record("AAA", "Revenue", 1.0)]).unwrap();
        repo.delete_all().unwrap();
        repo.bulk_upsert(&[record("AAA", "Revenue", 2.0)]).unwrap();

        let state = repo.state.read();
        assert_eq!(state.rows.len(), 1);
        assert_eq!(state.keys.len(), 1);
    }
}
