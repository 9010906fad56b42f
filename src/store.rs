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

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ErrorKind;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail_kind;

/// The bytes an entry is charged against the quota: two per UTF-16 code unit
/// of key and value.
pub fn entry_cost(key: &str, value: &str) -> usize {
    2 * (key.encode_utf16().count() + value.encode_utf16().count())
}

/// A namespaced key-value store with a byte quota, backed by SQLite. Values
/// are JSON text.
///
/// Individual operations are atomic. Operations that span the whole store
/// (a sweep, a sync) must hold [`Store::exclusive`] for their duration.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    exclusive: Arc<Mutex<()>>,
    namespace: String,
    capacity: usize,
}

impl Store {
    pub fn new(database_path: &str, namespace: &str, capacity: usize) -> Fallible<Self> {
        let mut conn = Connection::open(database_path)?;
        {
            let tx = conn.transaction()?;
            if !probe_schema_exists(&tx)? {
                tx.execute_batch(include_str!("schema.sql"))?;
                tx.commit()?;
            }
        }
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            exclusive: Arc::new(Mutex::new(())),
            namespace: namespace.to_string(),
            capacity,
        })
    }

    /// The quota, in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Serialize `value` and store it under `key`.
    ///
    /// If serialization fails, or the write would exceed the quota, nothing
    /// is written and the previous value (if any) is kept.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Fallible<()> {
        let text = serde_json::to_string(value).map_err(|e| {
            log::error!("Storage error: {key}: {e}");
            ErrorReport::with_kind(ErrorKind::Storage, format!("failed to serialize {key}: {e}"))
        })?;
        self.set_raw(key, &text)
    }

    /// Store already-serialized text under `key`.
    pub fn set_raw(&self, key: &str, text: &str) -> Fallible<()> {
        let mut conn = self.acquire();
        let tx = conn.transaction()?;
        let used = used_bytes(&tx, &self.namespace)?;
        let previous: Option<String> = select_value(&tx, &self.namespace, key)?;
        let freed = previous.map_or(0, |prev| entry_cost(key, &prev));
        let needed = used - freed + entry_cost(key, text);
        if needed > self.capacity {
            log::error!("Storage error: quota exceeded writing {key}");
            return fail_kind(
                ErrorKind::Storage,
                format!(
                    "storage quota exceeded: writing {key} needs {needed} of {} bytes.",
                    self.capacity
                ),
            );
        }
        upsert(&tx, &self.namespace, key, text)?;
        tx.commit()?;
        log::debug!("Storage set: {key}");
        Ok(())
    }

    /// Read and deserialize the value under `key`. A missing key and a value
    /// that doesn't parse as `T` both yield `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Fallible<Option<T>> {
        let Some(text) = self.get_raw(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&text) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                log::debug!("Storage get error: {key}: {e}");
                Ok(None)
            }
        }
    }

    pub fn get_raw(&self, key: &str) -> Fallible<Option<String>> {
        let conn = self.acquire();
        let sql = "select value from entries where namespace = ? and key = ?;";
        let value = conn
            .query_row(sql, (&self.namespace, key), |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn remove(&self, key: &str) -> Fallible<()> {
        let conn = self.acquire();
        conn.execute(
            "delete from entries where namespace = ? and key = ?;",
            (&self.namespace, key),
        )?;
        log::debug!("Storage removed: {key}");
        Ok(())
    }

    /// Delete `key` and, in the same transaction, add one to the counter
    /// under `counter_key`. Returns whether anything was deleted; if not, the
    /// counter is left alone.
    ///
    /// The quota only refuses this if it would grow the store past capacity,
    /// so a full store can still be cleaned.
    pub fn remove_counting(&self, key: &str, counter_key: &str) -> Fallible<bool> {
        let mut conn = self.acquire();
        let tx = conn.transaction()?;
        let Some(removed) = select_value(&tx, &self.namespace, key)? else {
            return Ok(false);
        };
        let previous = select_value(&tx, &self.namespace, counter_key)?;
        let count: u64 = previous
            .as_deref()
            .and_then(|text| serde_json::from_str(text).ok())
            .unwrap_or(0);
        let counter = (count + 1).to_string();
        let used = used_bytes(&tx, &self.namespace)?;
        let needed = used - entry_cost(key, &removed)
            - previous.map_or(0, |prev| entry_cost(counter_key, &prev))
            + entry_cost(counter_key, &counter);
        if needed > self.capacity && needed > used {
            log::error!("Storage error: quota exceeded counting {key}");
            return fail_kind(
                ErrorKind::Storage,
                format!(
                    "storage quota exceeded: writing {counter_key} needs {needed} of {} bytes.",
                    self.capacity
                ),
            );
        }
        tx.execute(
            "delete from entries where namespace = ? and key = ?;",
            (&self.namespace, key),
        )?;
        upsert(&tx, &self.namespace, counter_key, &counter)?;
        tx.commit()?;
        log::debug!("Storage removed: {key}, {counter_key} = {counter}");
        Ok(true)
    }

    /// Delete every entry in this namespace.
    pub fn clear(&self) -> Fallible<()> {
        let conn = self.acquire();
        conn.execute("delete from entries where namespace = ?;", [&self.namespace])?;
        log::debug!("Storage cleared");
        Ok(())
    }

    pub fn keys(&self) -> Fallible<Vec<String>> {
        Ok(self.entries()?.into_iter().map(|(key, _)| key).collect())
    }

    /// All key/value pairs, ordered by key.
    pub fn entries(&self) -> Fallible<Vec<(String, String)>> {
        let conn = self.acquire();
        let mut stmt =
            conn.prepare("select key, value from entries where namespace = ? order by key;")?;
        let mut rows = stmt.query([&self.namespace])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push((row.get(0)?, row.get(1)?));
        }
        Ok(entries)
    }

    /// Replace the whole namespace with `entries` in one transaction. If the
    /// new contents don't fit the quota, the store is left as it was.
    pub fn replace_all(&self, entries: &[(String, String)]) -> Fallible<()> {
        let needed: usize = entries.iter().map(|(k, v)| entry_cost(k, v)).sum();
        if needed > self.capacity {
            return fail_kind(
                ErrorKind::Storage,
                format!(
                    "storage quota exceeded: restored data needs {needed} of {} bytes.",
                    self.capacity
                ),
            );
        }
        let mut conn = self.acquire();
        let tx = conn.transaction()?;
        tx.execute("delete from entries where namespace = ?;", [&self.namespace])?;
        for (key, value) in entries {
            upsert(&tx, &self.namespace, key, value)?;
        }
        tx.commit()?;
        log::debug!("Storage replaced with {} entries", entries.len());
        Ok(())
    }

    /// The same store with a different quota.
    #[cfg(test)]
    pub fn with_capacity(&self, capacity: usize) -> Self {
        Self {
            capacity,
            ..self.clone()
        }
    }

    /// Take the store-wide lock.
    pub fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.exclusive.lock().unwrap()
    }

    fn acquire(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }
}

fn used_bytes(tx: &Transaction, namespace: &str) -> Fallible<usize> {
    let mut stmt = tx.prepare("select key, value from entries where namespace = ?;")?;
    let mut rows = stmt.query([namespace])?;
    let mut used = 0;
    while let Some(row) = rows.next()? {
        let key: String = row.get(0)?;
        let value: String = row.get(1)?;
        used += entry_cost(&key, &value);
    }
    Ok(used)
}

fn select_value(tx: &Transaction, namespace: &str, key: &str) -> Fallible<Option<String>> {
    let sql = "select value from entries where namespace = ? and key = ?;";
    let value = tx
        .query_row(sql, (namespace, key), |row| row.get(0))
        .optional()?;
    Ok(value)
}

fn upsert(tx: &Transaction, namespace: &str, key: &str, value: &str) -> Fallible<()> {
    let sql = "insert into entries (namespace, key, value) values (?, ?, ?) on conflict (namespace, key) do update set value = excluded.value;";
    tx.execute(sql, (namespace, key, value))?;
    Ok(())
}

fn probe_schema_exists(tx: &Transaction) -> Fallible<bool> {
    let sql = "select count(*) from sqlite_master where type='table' AND name=?;";
    let count: i64 = tx.query_row(sql, ["entries"], |row| row.get(0))?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use serde_json::json;

    use super::*;
    use crate::helper::create_tmp_directory;
    use crate::helper::open_test_store;
    use crate::quota::usage;

    #[test]
    fn test_round_trip() -> Fallible<()> {
        let (_dir, store) = open_test_store(4096)?;
        let values = [
            json!(null),
            json!(42),
            json!("text with \"quotes\" and 中文"),
            json!([1, "two", {"three": 3}]),
            json!({"submitted": false, "nested": {"list": [true, false]}}),
        ];
        for (i, value) in values.iter().enumerate() {
            let key = format!("k{i}");
            store.set(&key, value)?;
            let read: Option<Value> = store.get(&key)?;
            assert_eq!(read.as_ref(), Some(value));
        }
        Ok(())
    }

    #[test]
    fn test_missing_and_unparseable() -> Fallible<()> {
        let (_dir, store) = open_test_store(4096)?;
        assert_eq!(store.get::<Value>("nope")?, None);
        store.set_raw("broken", "{not json")?;
        assert_eq!(store.get::<Value>("broken")?, None);
        // Valid JSON of the wrong shape is also `None`.
        store.set("number", &7)?;
        assert_eq!(store.get::<String>("number")?, None);
        Ok(())
    }

    #[test]
    fn test_quota_exceeded_keeps_previous() -> Fallible<()> {
        let (_dir, store) = open_test_store(100)?;
        store.set("a", "small")?;
        let big = "x".repeat(200);
        let err = store.set("a", &big).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(store.get::<String>("a")?, Some("small".to_string()));
        Ok(())
    }

    #[test]
    fn test_overwrite_counts_only_new_value() -> Fallible<()> {
        // "k" + "\"vvvvvvvvvvvvvvvvvvvvvv\"" is 1 + 24 = 25 units = 50 bytes.
        let (_dir, store) = open_test_store(60)?;
        let value = "v".repeat(22);
        store.set("k", &value)?;
        store.set("k", &value)?;
        Ok(())
    }

    #[test]
    fn test_namespaces_are_isolated() -> Fallible<()> {
        let dir = create_tmp_directory()?;
        let path = dir.path().join("shared.db");
        let path = path.to_str().unwrap();
        let a = Store::new(path, "a", 4096)?;
        let b = Store::new(path, "b", 4096)?;
        a.set("key", "from a")?;
        b.set("key", "from b")?;
        a.clear()?;
        assert_eq!(a.keys()?, Vec::<String>::new());
        assert_eq!(b.get::<String>("key")?, Some("from b".to_string()));
        Ok(())
    }

    #[test]
    fn test_replace_all_rolls_back() -> Fallible<()> {
        let (_dir, store) = open_test_store(200)?;
        store.set("keep", "me")?;
        let too_big = vec![("big".to_string(), "y".repeat(300))];
        assert!(store.replace_all(&too_big).is_err());
        assert_eq!(store.keys()?, vec!["keep".to_string()]);

        let fits = vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
        ];
        store.replace_all(&fits)?;
        assert_eq!(
            store.entries()?,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string())
            ]
        );
        Ok(())
    }

    #[test]
    fn test_remove_counting_on_a_full_store() -> Fallible<()> {
        let (_dir, store) = open_test_store(4096)?;
        store.set("old", &"x".repeat(40))?;
        store.set("older", &"y".repeat(40))?;
        // No room for anything new.
        let store = store.with_capacity(usage(&store)?.used);
        assert!(store.set("completed_count", &1).is_err());

        assert!(store.remove_counting("old", "completed_count")?);
        assert_eq!(store.get::<u64>("completed_count")?, Some(1));
        assert!(store.remove_counting("older", "completed_count")?);
        assert_eq!(store.get::<u64>("completed_count")?, Some(2));
        assert_eq!(store.keys()?, vec!["completed_count".to_string()]);

        // Nothing to delete, nothing to count.
        assert!(!store.remove_counting("old", "completed_count")?);
        assert_eq!(store.get::<u64>("completed_count")?, Some(2));
        Ok(())
    }

    #[test]
    fn test_entry_cost() {
        assert_eq!(entry_cost("ab", "cd"), 8);
        // Characters outside the BMP are two UTF-16 units.
        assert_eq!(entry_cost("", "😀"), 4);
    }
}
