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

use serde::Serialize;

use crate::archive::completed_count;
use crate::archive::record_keys;
use crate::error::Fallible;
use crate::journal::Journal;
use crate::quota::Usage;
use crate::quota::usage;
use crate::store::Store;
use crate::types::date::Date;
use crate::types::record::Record;
use crate::types::record::Summary;

/// Completed tasks: those deleted by archival, plus the submitted records
/// still in the store.
pub fn completed_total(store: &Store) -> Fallible<u64> {
    let mut total = completed_count(store)?;
    for (_, key) in record_keys(store)? {
        if let Some(record) = store.get::<Record>(&key)? {
            if record.is_submitted() {
                total += 1;
            }
        }
    }
    Ok(total)
}

#[derive(Debug, PartialEq)]
pub enum TaskStatus {
    Pending,
    Done(Summary),
    /// The record is there but couldn't be read.
    Unreadable,
}

#[derive(Debug, PartialEq)]
pub struct TaskEntry {
    pub date: Date,
    pub status: TaskStatus,
}

impl TaskEntry {
    /// How the entry is shown in the task list.
    pub fn label(&self, today: Date) -> String {
        let status = match (&self.status, self.date == today) {
            (TaskStatus::Pending, true) => "pending".to_string(),
            (TaskStatus::Done(_), true) => "done".to_string(),
            (TaskStatus::Pending, false) => "incomplete".to_string(),
            (TaskStatus::Done(summary), false) => {
                format!("{}/{}", summary.correct_count, summary.total_questions)
            }
            (TaskStatus::Unreadable, _) => "unreadable".to_string(),
        };
        if self.date == today {
            format!("{} {} (today, {status})", self.date, self.date.weekday_name())
        } else {
            format!("{} {} ({status})", self.date, self.date.weekday_name())
        }
    }
}

/// Every task, newest first. Today's task is created if it doesn't exist.
pub fn task_list(journal: &Journal) -> Fallible<Vec<TaskEntry>> {
    let today = journal.today();
    if journal.store.get_raw(&today.key())?.is_none() {
        log::info!("Creating task {today}");
        journal.store.set(&today.key(), &Record::new())?;
        journal.check_quota()?;
    }
    let mut entries = Vec::new();
    for (date, key) in record_keys(&journal.store)?.into_iter().rev() {
        let status = match journal.store.get::<Record>(&key)? {
            Some(record) if record.is_submitted() => TaskStatus::Done(record.summary()),
            Some(_) => TaskStatus::Pending,
            None => TaskStatus::Unreadable,
        };
        entries.push(TaskEntry { date, status });
    }
    Ok(entries)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub completed_total: u64,
    /// Completed tasks whose records have been deleted.
    pub completed_archived: u64,
    pub records: usize,
    pub usage: Usage,
}

pub fn stats(store: &Store) -> Fallible<Stats> {
    Ok(Stats {
        completed_total: completed_total(store)?,
        completed_archived: completed_count(store)?,
        records: record_keys(store)?.len(),
        usage: usage(store)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::COMPLETED_COUNT_KEY;
    use crate::config::Config;
    use crate::helper::open_test_journal;
    use crate::helper::submitted_record;

    #[test]
    fn test_completed_total() -> Fallible<()> {
        let (_dir, journal) = open_test_journal(Config::default())?;
        let store = &journal.store;
        store.set(COMPLETED_COUNT_KEY, &7)?;
        store.set("2024-01-01", &submitted_record(5, 1))?;
        store.set("2024-01-02", &submitted_record(5, 1).simplify().unwrap())?;
        store.set("2024-01-03", &Record::new())?;
        assert_eq!(completed_total(store)?, 9);

        let stats = stats(store)?;
        assert_eq!(stats.completed_archived, 7);
        assert_eq!(stats.records, 3);
        let json = serde_json::to_value(&stats)?;
        assert_eq!(json["completedTotal"], 9);
        Ok(())
    }

    #[test]
    fn test_task_list() -> Fallible<()> {
        let (_dir, journal) = open_test_journal(Config::default())?;
        journal.store.set("2024-02-28", &submitted_record(5, 4))?;
        journal.store.set("2024-02-29", &Record::new())?;

        let list = task_list(&journal)?;
        let today = journal.today();
        let labels: Vec<String> = list.iter().map(|entry| entry.label(today)).collect();
        assert_eq!(
            labels,
            vec![
                "2024-03-01 friday (today, pending)".to_string(),
                "2024-02-29 thursday (incomplete)".to_string(),
                "2024-02-28 wednesday (4/5)".to_string(),
            ]
        );
        Ok(())
    }
}
