// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Archival of old records.
//!
//! When the store runs low on space, records are visited oldest first.
//! Records older than a year are deleted. Younger submitted records are first
//! simplified down to their score, and deleted on a later pass. Unsubmitted
//! records are deleted outright. Before a submitted record is deleted, the
//! completed-count counter is incremented, so that long-run statistics
//! survive the deletion.

use crate::error::Fallible;
use crate::quota::Usage;
use crate::quota::usage;
use crate::store::Store;
use crate::types::date::Date;
use crate::types::record::Record;

/// The key under which the number of deleted submitted records is kept.
pub const COMPLETED_COUNT_KEY: &str = "completed_count";

/// Records at least this many days old are deleted regardless of state.
const RETENTION_DAYS: i64 = 365;

/// Once this much space is free, the sweep may stop early.
const RECOVERED_PERCENT: f64 = 50.0;

#[derive(Debug)]
pub struct SweepReport {
    pub deleted: usize,
    pub simplified: usize,
    /// Records visited, including ones that couldn't be read.
    pub processed: usize,
    pub before: Usage,
    pub after: Usage,
}

impl SweepReport {
    /// Whether the low-space warning should stay up after this sweep.
    pub fn warning(&self) -> bool {
        self.after.remaining_percent < RECOVERED_PERCENT
    }

    /// A message for the user, if the sweep changed anything.
    pub fn notice(&self) -> Option<String> {
        if self.deleted == 0 && self.simplified == 0 {
            return None;
        }
        Some(format!(
            "Storage cleanup finished: deleted {} old tasks, simplified {} completed tasks. Free space went from {:.1}% to {:.1}%.",
            self.deleted, self.simplified, self.before.remaining_percent, self.after.remaining_percent
        ))
    }
}

/// The number of submitted records that have been deleted so far.
pub fn completed_count(store: &Store) -> Fallible<u64> {
    Ok(store.get(COMPLETED_COUNT_KEY)?.unwrap_or(0))
}

/// Keys of all date records, oldest first.
pub fn record_keys(store: &Store) -> Fallible<Vec<(Date, String)>> {
    let mut records: Vec<(Date, String)> = store
        .keys()?
        .into_iter()
        .filter_map(|key| Date::from_key(&key).map(|date| (date, key)))
        .collect();
    records.sort();
    Ok(records)
}

/// Run one archival sweep.
///
/// `force_clean_count` is the debug override: the sweep is skipped unless
/// there are more records than it, and otherwise it processes at least that
/// many records. Past that, the sweep stops as soon as more than half the
/// store is free. Returns `None` if the sweep was skipped.
pub fn sweep(store: &Store, force_clean_count: usize, today: Date) -> Fallible<Option<SweepReport>> {
    let _guard = store.exclusive();
    let records = record_keys(store)?;
    if records.len() < force_clean_count + 1 {
        return Ok(None);
    }

    let before = usage(store)?;
    let cutoff = today.minus_days(RETENTION_DAYS);
    let mut deleted = 0;
    let mut simplified = 0;
    let mut processed = 0;
    for (date, key) in records {
        let current = usage(store)?;
        if processed >= force_clean_count && current.remaining_percent > RECOVERED_PERCENT {
            break;
        }
        processed += 1;

        let Some(record) = store.get::<Record>(&key)? else {
            continue;
        };

        if date <= cutoff {
            if record.is_submitted() {
                store.remove_counting(&key, COMPLETED_COUNT_KEY)?;
                log::info!("clean: {key}");
            } else {
                store.remove(&key)?;
                log::info!("del: {key}");
            }
            deleted += 1;
            continue;
        }

        match &record {
            Record::Submitted(_) => {
                if let Some(archived) = record.simplify() {
                    store.set(&key, &archived)?;
                    simplified += 1;
                    log::info!("simplify: {key}");
                }
            }
            Record::Simplified(_) => {
                store.remove_counting(&key, COMPLETED_COUNT_KEY)?;
                deleted += 1;
                log::info!("clean: {key}");
            }
            Record::Pending { .. } => {
                store.remove(&key)?;
                deleted += 1;
                log::info!("del: {key}");
            }
        }
    }

    let after = usage(store)?;
    log::info!(
        "Cleanup finished: deleted {deleted}, simplified {simplified}, {:.2}% remaining",
        after.remaining_percent
    );
    Ok(Some(SweepReport {
        deleted,
        simplified,
        processed,
        before,
        after,
    }))
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use serde_json::json;

    use super::*;
    use crate::helper::open_test_store;
    use crate::helper::submitted_record;
    use crate::types::record::Summary;

    fn today() -> Date {
        Date::parse("2024-03-01").unwrap()
    }

    /// Shrinks the quota so that a large filler entry keeps the store more
    /// than half full for the whole sweep.
    fn crowded(store: &Store) -> Fallible<Store> {
        store.set("filler", &"f".repeat(20_000))?;
        let used = usage(store)?.used;
        Ok(store.with_capacity(used + used / 5))
    }

    #[test]
    fn test_policy_table() -> Fallible<()> {
        let (_dir, store) = open_test_store(1_000_000)?;
        // 2023-03-02 is exactly 365 days before 2024-03-01.
        store.set("2023-03-02", &submitted_record(5, 3))?;
        store.set("2023-03-01", &Record::new())?;
        store.set("2023-03-03", &submitted_record(5, 4))?;
        store.set(
            "2023-06-01",
            &Record::Simplified(Summary {
                correct_count: 2,
                total_questions: 5,
            }),
        )?;
        store.set("2024-02-28", &Record::new())?;
        let store = crowded(&store)?;

        let report = sweep(&store, 0, today())?.unwrap();
        assert_eq!(report.processed, 5);
        assert_eq!(report.deleted, 4);
        assert_eq!(report.simplified, 1);
        // One for the year-old submitted record, one for the simplified one.
        assert_eq!(completed_count(&store)?, 2);

        let keys: Vec<String> = record_keys(&store)?.into_iter().map(|(_, k)| k).collect();
        assert_eq!(keys, vec!["2023-03-03".to_string()]);
        let simplified: Value = store.get("2023-03-03")?.unwrap();
        assert_eq!(
            simplified,
            json!({"submitted": true, "simplified": true, "correctCount": 4, "totalQuestions": 5})
        );
        Ok(())
    }

    #[test]
    fn test_simplified_then_deleted() -> Fallible<()> {
        let (_dir, store) = open_test_store(1_000_000)?;
        store.set("2024-01-10", &submitted_record(5, 5))?;
        let store = crowded(&store)?;

        sweep(&store, 0, today())?;
        assert!(store.get::<Record>("2024-01-10")?.unwrap().is_simplified());
        assert_eq!(completed_count(&store)?, 0);

        sweep(&store, 0, today())?;
        assert_eq!(store.get::<Record>("2024-01-10")?, None);
        assert_eq!(completed_count(&store)?, 1);
        Ok(())
    }

    #[test]
    fn test_counter_increments_exactly_once_per_submitted_deletion() -> Fallible<()> {
        let (_dir, store) = open_test_store(1_000_000)?;
        store.set(COMPLETED_COUNT_KEY, &10)?;
        store.set("2020-01-01", &submitted_record(3, 1))?;
        store.set("2021-01-01", &submitted_record(3, 2))?;
        store.set("2021-06-01", &Record::new())?;
        let store = crowded(&store)?;

        let report = sweep(&store, 0, today())?.unwrap();
        assert_eq!(report.deleted, 3);
        assert_eq!(completed_count(&store)?, 12);
        Ok(())
    }

    #[test]
    fn test_full_store_is_still_cleaned() -> Fallible<()> {
        let (_dir, store) = open_test_store(1_000_000)?;
        store.set("2020-01-01", &submitted_record(5, 3))?;
        store.set("2020-01-02", &submitted_record(5, 4))?;
        let used = usage(&store)?.used;
        let store = store.with_capacity(used + 10);

        let report = sweep(&store, 0, today())?.unwrap();
        assert!(report.deleted >= 1);
        assert_eq!(store.get_raw("2020-01-01")?, None);
        assert_eq!(completed_count(&store)?, report.deleted as u64);
        Ok(())
    }

    #[test]
    fn test_stops_early_once_space_is_recovered() -> Fallible<()> {
        let (_dir, store) = open_test_store(1_000_000)?;
        store.set("2024-01-01", &Record::new())?;
        store.set("2024-01-02", &Record::new())?;
        store.set("2024-01-03", &Record::new())?;
        // Plenty of space: without an override, nothing is processed.
        let report = sweep(&store, 0, today())?.unwrap();
        assert_eq!(report.processed, 0);
        assert!(report.notice().is_none());
        assert!(!report.warning());

        // With an override of two, exactly two are processed.
        let report = sweep(&store, 2, today())?.unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(report.deleted, 2);
        assert!(report.notice().is_some());
        let keys: Vec<String> = record_keys(&store)?.into_iter().map(|(_, k)| k).collect();
        assert_eq!(keys, vec!["2024-01-03".to_string()]);
        Ok(())
    }

    #[test]
    fn test_skipped_with_too_few_records() -> Fallible<()> {
        let (_dir, store) = open_test_store(1_000_000)?;
        store.set("2020-01-01", &Record::new())?;
        store.set("2020-01-02", &Record::new())?;
        assert!(sweep(&store, 2, today())?.is_none());
        assert_eq!(store.keys()?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_unreadable_records_are_skipped() -> Fallible<()> {
        let (_dir, store) = open_test_store(1_000_000)?;
        store.set_raw("2020-01-01", "{garbage")?;
        store.set("2020-01-02", &Record::new())?;
        let store = crowded(&store)?;
        let report = sweep(&store, 0, today())?.unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(report.deleted, 1);
        assert!(store.get_raw("2020-01-01")?.is_some());
        Ok(())
    }

    #[test]
    fn test_other_keys_are_ignored() -> Fallible<()> {
        let (_dir, store) = open_test_store(1_000_000)?;
        store.set("system_settings", &json!({"apiModel": "qwen-plus"}))?;
        store.set("2020-01-01", &Record::new())?;
        let store = crowded(&store)?;
        sweep(&store, 0, today())?;
        let mut keys = store.keys()?;
        keys.sort();
        assert_eq!(keys, vec!["filler".to_string(), "system_settings".to_string()]);
        Ok(())
    }
}
