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

//! Backup to and restore from a remote basket.
//!
//! A basket is a JSON object holding a copy of every store entry whose value
//! is JSON. Secrets in the settings entry are stripped before upload, and on
//! restore the local secrets are kept instead of whatever the basket holds.

use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;
use percent_encoding::utf8_percent_encode;
use rand::Rng;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::Map;
use serde_json::Value;

use crate::error::ErrorKind;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail_kind;
use crate::journal::Journal;
use crate::prompt::Prompt;
use crate::settings::SECRET_FIELDS;
use crate::settings::SETTINGS_KEY;
use crate::settings::Settings;
use crate::store::Store;

const BASKET_PREFIX: &str = "ai-qac-";

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub fn generate_basket_name() -> String {
    let suffix: u32 = rand::rng().random_range(100_000..1_000_000);
    format!("{BASKET_PREFIX}{suffix}")
}

/// The basket name from the settings, generating and saving one if there is
/// none yet.
pub fn basket_name(store: &Store) -> Fallible<String> {
    let mut settings = Settings::load(store)?;
    if let Some(name) = &settings.basket {
        return Ok(name.clone());
    }
    let name = generate_basket_name();
    log::info!("Generated basket name {name}");
    settings.basket = Some(name.clone());
    settings.save(store)?;
    Ok(name)
}

/// Every entry whose value is JSON, with the secrets removed from the
/// settings.
pub fn collect_sync_data(store: &Store) -> Fallible<Map<String, Value>> {
    let _guard = store.exclusive();
    let mut data = Map::new();
    for (key, text) in store.entries()? {
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => {
                data.insert(key, value);
            }
            Err(_) => log::debug!("Not syncing {key}: not JSON"),
        }
    }
    if let Some(Value::Object(settings)) = data.get_mut(SETTINGS_KEY) {
        for field in SECRET_FIELDS {
            settings.remove(field);
        }
    }
    Ok(data)
}

/// The secrets in the local settings that are set.
fn local_secrets(store: &Store) -> Fallible<Map<String, Value>> {
    let mut secrets = Map::new();
    if let Some(Value::Object(settings)) = store.get::<Value>(SETTINGS_KEY)? {
        for field in SECRET_FIELDS {
            match settings.get(field) {
                Some(Value::String(s)) if !s.is_empty() => {
                    secrets.insert(field.to_string(), Value::String(s.clone()));
                }
                _ => {}
            }
        }
    }
    Ok(secrets)
}

#[derive(Debug, PartialEq)]
pub struct PushReport {
    pub basket: String,
    pub entries: usize,
}

#[derive(Debug, PartialEq)]
pub enum RestoreOutcome {
    Cancelled,
    Restored { basket: String, entries: usize },
}

pub struct SyncClient {
    client: Client,
    base_url: String,
}

impl SyncClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn basket_url(&self, key: &str, basket: &str) -> String {
        format!(
            "{}/{}/basket/{}",
            self.base_url,
            utf8_percent_encode(key, PATH_SEGMENT),
            utf8_percent_encode(basket, PATH_SEGMENT)
        )
    }

    /// Upload a copy of the store. Nothing local changes, apart from saving
    /// a newly generated basket name.
    pub async fn push(&self, journal: &Journal) -> Fallible<PushReport> {
        let settings = journal.settings()?;
        let key = sync_key(&settings)?;
        let basket = basket_name(&journal.store)?;
        let data = collect_sync_data(&journal.store)?;
        let entries = data.len();
        let body = Value::Object(data).to_string();

        log::info!("Pushing {entries} entries to basket {basket}");
        let response = self
            .client
            .post(self.basket_url(&key, &basket))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| sync_error(format!("sync failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return fail_kind(ErrorKind::Sync, format!("sync failed: {status}"));
        }
        Ok(PushReport { basket, entries })
    }

    /// Replace the store with the contents of a basket.
    ///
    /// `basket` overrides the configured basket name; on success it becomes
    /// the new default. The local store is only touched once the basket has
    /// been downloaded and decoded.
    pub async fn restore<P: Prompt>(
        &self,
        journal: &Journal,
        prompt: &mut P,
        basket: Option<&str>,
    ) -> Fallible<RestoreOutcome> {
        if !prompt.confirm("Restoring overwrites all local data. Continue?") {
            return Ok(RestoreOutcome::Cancelled);
        }
        let settings = journal.settings()?;
        let key = sync_key(&settings)?;
        let custom = basket.map(str::trim).filter(|name| !name.is_empty());
        let name = match (custom, &settings.basket) {
            (Some(name), _) => name.to_string(),
            (None, Some(name)) => name.clone(),
            (None, None) => {
                return fail_kind(
                    ErrorKind::Sync,
                    "no basket to restore from: push first, or name a basket.",
                );
            }
        };

        log::info!("Restoring from basket {name}");
        let response = self
            .client
            .get(self.basket_url(&key, &name))
            .send()
            .await
            .map_err(|e| sync_error(format!("restore failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return fail_kind(ErrorKind::Sync, format!("restore failed: {status}"));
        }
        let text = response
            .text()
            .await
            .map_err(|e| sync_error(format!("restore failed: {e}")))?;
        let Ok(Value::Object(mut data)) = serde_json::from_str::<Value>(&text) else {
            return fail_kind(ErrorKind::Sync, "restore failed: the basket is not a JSON object.");
        };

        let secrets = local_secrets(&journal.store)?;
        let mut restored = match data.remove(SETTINGS_KEY) {
            Some(Value::Object(settings)) => settings,
            _ => Map::new(),
        };
        restored.extend(secrets);
        if let Some(name) = custom {
            restored.insert("json_name".to_string(), Value::String(name.to_string()));
        }
        data.insert(SETTINGS_KEY.to_string(), Value::Object(restored));

        let entries: Vec<(String, String)> = data
            .iter()
            .map(|(key, value)| (key.clone(), value.to_string()))
            .collect();
        {
            let _guard = journal.store.exclusive();
            journal.store.replace_all(&entries)?;
        }
        log::info!("Restored {} entries", entries.len());
        journal.check_quota()?;
        Ok(RestoreOutcome::Restored {
            basket: name,
            entries: entries.len(),
        })
    }
}

fn sync_key(settings: &Settings) -> Fallible<String> {
    let key = settings.pantry_key.trim();
    if key.is_empty() {
        return fail_kind(
            ErrorKind::Sync,
            "no sync key configured: set one with `settings set pantry-key KEY`.",
        );
    }
    Ok(key.to_string())
}

fn sync_error(message: String) -> ErrorReport {
    ErrorReport::with_kind(ErrorKind::Sync, message)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::Mutex;

    use axum::Router;
    use axum::extract::Path;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::get;
    use serde_json::json;

    use super::*;
    use crate::config::Config;
    use crate::helper::Scripted;
    use crate::helper::open_test_journal;
    use crate::helper::spawn_router;
    use crate::helper::submitted_record;
    use crate::types::record::Record;

    type Baskets = Arc<Mutex<HashMap<(String, String), String>>>;

    async fn get_basket(
        State(baskets): State<Baskets>,
        Path((key, basket)): Path<(String, String)>,
    ) -> (StatusCode, String) {
        match baskets.lock().unwrap().get(&(key, basket)) {
            Some(body) => (StatusCode::OK, body.clone()),
            None => (StatusCode::NOT_FOUND, "Could not get basket".to_string()),
        }
    }

    async fn post_basket(
        State(baskets): State<Baskets>,
        Path((key, basket)): Path<(String, String)>,
        body: String,
    ) -> StatusCode {
        if key == "broken" {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        baskets.lock().unwrap().insert((key, basket), body);
        StatusCode::OK
    }

    /// A fake basket service. Returns its base URL and the baskets it holds.
    async fn fake_pantry() -> Fallible<(String, Baskets)> {
        let baskets: Baskets = Arc::new(Mutex::new(HashMap::new()));
        let router = Router::new()
            .route("/{key}/basket/{basket}", get(get_basket).post(post_basket))
            .with_state(baskets.clone());
        let base = spawn_router(router).await?;
        Ok((base, baskets))
    }

    fn journal_with_sync(
        sync_base_url: &str,
        pantry_key: &str,
    ) -> Fallible<(tempfile::TempDir, Journal)> {
        let config = Config {
            sync_base_url: sync_base_url.to_string(),
            ..Config::default()
        };
        let (dir, journal) = open_test_journal(config)?;
        let mut settings = journal.settings()?;
        settings.api_key = "sk-local".to_string();
        settings.pantry_key = pantry_key.to_string();
        settings.password = Some("pw".to_string());
        settings.save(&journal.store)?;
        Ok((dir, journal))
    }

    #[test]
    fn test_generate_basket_name() {
        let name = generate_basket_name();
        let suffix: u32 = name.strip_prefix("ai-qac-").unwrap().parse().unwrap();
        assert!((100_000..1_000_000).contains(&suffix));
    }

    #[test]
    fn test_basket_name_is_persisted() -> Fallible<()> {
        let (_dir, journal) = open_test_journal(Config::default())?;
        let first = basket_name(&journal.store)?;
        assert_eq!(basket_name(&journal.store)?, first);
        assert_eq!(journal.settings()?.basket, Some(first));
        Ok(())
    }

    #[test]
    fn test_collect_strips_secrets_and_skips_non_json() -> Fallible<()> {
        let (_dir, journal) = journal_with_sync("http://localhost", "pk")?;
        journal.store.set_raw("scratch", "not json")?;
        journal.store.set("2024-02-01", &submitted_record(2, 1))?;
        let data = collect_sync_data(&journal.store)?;
        assert!(!data.contains_key("scratch"));
        assert!(data.contains_key("2024-02-01"));
        let settings = data[SETTINGS_KEY].as_object().unwrap();
        for field in SECRET_FIELDS {
            assert!(!settings.contains_key(field));
        }
        assert_eq!(settings["apiModel"], "qwen-plus");
        Ok(())
    }

    #[test]
    fn test_basket_url_is_encoded() {
        let client = SyncClient::new("https://getpantry.cloud/apiv1/pantry/");
        assert_eq!(
            client.basket_url("a b/c", "ai-qac-123456"),
            "https://getpantry.cloud/apiv1/pantry/a%20b%2Fc/basket/ai-qac-123456"
        );
    }

    #[tokio::test]
    async fn test_push_then_restore() -> Fallible<()> {
        let (base, baskets) = fake_pantry().await?;
        let (_dir, journal) = journal_with_sync(&base, "pk-1")?;
        journal.store.set("2024-02-01", &submitted_record(3, 2))?;
        journal.store.set("2024-02-02", &Record::new())?;
        let before = journal.store.get::<Value>("2024-02-01")?;

        let client = SyncClient::new(&base);
        let report = client.push(&journal).await?;
        assert_eq!(report.entries, 3);
        let uploaded: Value = {
            let baskets = baskets.lock().unwrap();
            let body = &baskets[&("pk-1".to_string(), report.basket.clone())];
            serde_json::from_str(body)?
        };
        assert!(uploaded[SETTINGS_KEY].get("apiKey").is_none());
        assert_eq!(uploaded[SETTINGS_KEY]["json_name"], report.basket.as_str());

        // Local changes after the push: a new secret and a new record.
        let mut settings = journal.settings()?;
        settings.api_key = "sk-rotated".to_string();
        settings.save(&journal.store)?;
        journal.store.set("2024-02-03", &Record::new())?;

        let outcome = client
            .restore(&journal, &mut Scripted::agreeable(), None)
            .await?;
        assert_eq!(
            outcome,
            RestoreOutcome::Restored {
                basket: report.basket.clone(),
                entries: 3
            }
        );
        assert_eq!(journal.store.get::<Value>("2024-02-01")?, before);
        assert_eq!(journal.store.get_raw("2024-02-03")?, None);
        let settings = journal.settings()?;
        assert_eq!(settings.api_key, "sk-rotated");
        assert_eq!(settings.pantry_key, "pk-1");
        assert_eq!(settings.password.as_deref(), Some("pw"));
        assert_eq!(settings.basket, Some(report.basket));
        Ok(())
    }

    #[tokio::test]
    async fn test_push_failure_reports_status() -> Fallible<()> {
        let (base, _baskets) = fake_pantry().await?;
        let (_dir, journal) = journal_with_sync(&base, "broken")?;
        let err = SyncClient::new(&base).push(&journal).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Sync);
        assert_eq!(err.message(), "sync failed: 500 Internal Server Error");
        Ok(())
    }

    #[tokio::test]
    async fn test_push_needs_key() -> Fallible<()> {
        let (base, _baskets) = fake_pantry().await?;
        let (_dir, journal) = journal_with_sync(&base, "")?;
        let err = SyncClient::new(&base).push(&journal).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Sync);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_restore_leaves_store_alone() -> Fallible<()> {
        let (base, _baskets) = fake_pantry().await?;
        let (_dir, journal) = journal_with_sync(&base, "pk-1")?;
        journal.store.set("2024-02-01", &Record::new())?;
        let before = journal.store.entries()?;

        let err = SyncClient::new(&base)
            .restore(&journal, &mut Scripted::agreeable(), Some("ai-qac-000000"))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "restore failed: 404 Not Found");
        assert_eq!(journal.store.entries()?, before);

        let outcome = SyncClient::new(&base)
            .restore(&journal, &mut Scripted::new(&[false], &[]), Some("x"))
            .await?;
        assert_eq!(outcome, RestoreOutcome::Cancelled);
        assert_eq!(journal.store.entries()?, before);
        Ok(())
    }

    #[tokio::test]
    async fn test_restore_from_custom_basket() -> Fallible<()> {
        let (base, baskets) = fake_pantry().await?;
        let remote = json!({
            "2023-12-31": {"submitted": true, "simplified": true, "correctCount": 3, "totalQuestions": 5},
            "completed_count": 4,
            "system_settings": {"apiModel": "deepseek-chat", "apiKey": "sk-remote"}
        });
        baskets.lock().unwrap().insert(
            ("pk-1".to_string(), "shared".to_string()),
            remote.to_string(),
        );
        let (_dir, journal) = journal_with_sync(&base, "pk-1")?;

        SyncClient::new(&base)
            .restore(&journal, &mut Scripted::agreeable(), Some(" shared "))
            .await?;
        let settings = journal.settings()?;
        assert_eq!(settings.api_model, "deepseek-chat");
        assert_eq!(settings.api_key, "sk-local");
        assert_eq!(settings.basket.as_deref(), Some("shared"));
        assert!(journal.store.get::<Record>("2023-12-31")?.unwrap().is_simplified());
        assert_eq!(crate::archive::completed_count(&journal.store)?, 4);
        Ok(())
    }
}
