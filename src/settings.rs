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

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::error::ErrorKind;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail_kind;
use crate::store::Store;

/// The store key holding the settings object.
pub const SETTINGS_KEY: &str = "system_settings";

/// Settings fields that never leave the device.
pub const SECRET_FIELDS: [&str; 3] = ["apiKey", "pantryKey", "settings_password"];

const DEFAULT_MODEL: &str = "qwen-plus";

const DEFAULT_QUESTION_COUNT: usize = 30;

const DEFAULT_PROMPT: &str = "Write questions for a sixth-grade student. They should be neither too easy nor too hard.
1. Classical poetry and prose: idioms, Tang and Song poems, classical texts.
2. Modern language: characters and words (form, sound, meaning), grammar, rhetoric (metaphor, parallelism, etc.), punctuation, correcting faulty sentences.
3. Literature: important authors, classic works, history and famous anecdotes.
4. Other: natural science.
";

/// Every field is read on its own: a field of the wrong type or `null` falls
/// back to its default, so one bad value never costs the others.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_model", deserialize_with = "model_or_default")]
    pub api_model: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub api_url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub api_key: String,
    #[serde(
        default = "default_question_count",
        deserialize_with = "number_or_string"
    )]
    pub question_count: usize,
    #[serde(default = "default_prompt", deserialize_with = "prompt_or_default")]
    pub api_prompt: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pantry_key: String,
    /// The remote basket name.
    #[serde(
        default,
        rename = "json_name",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_empty_string"
    )]
    pub basket: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub debug_mode: bool,
    #[serde(
        default,
        rename = "settings_password",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_empty_string"
    )]
    pub password: Option<String>,
    /// Fields this version doesn't know about, kept as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_question_count() -> usize {
    DEFAULT_QUESTION_COUNT
}

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

/// Strings as they are, numbers and booleans as text, anything else `None`.
fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(Value::deserialize(deserializer)?).filter(|s| !s.trim().is_empty()))
}

fn model_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(non_empty_string(deserializer)?.unwrap_or_else(default_model))
}

fn prompt_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(non_empty_string(deserializer)?.unwrap_or_else(default_prompt))
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(s.trim(), "true" | "on" | "1"),
        _ => false,
    })
}

/// Older settings objects store the question count as a string. Anything
/// that isn't a positive integer reads as the default.
fn number_or_string<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let count = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(count.filter(|n| *n > 0).unwrap_or(DEFAULT_QUESTION_COUNT))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_model: default_model(),
            api_url: String::new(),
            api_key: String::new(),
            question_count: DEFAULT_QUESTION_COUNT,
            api_prompt: default_prompt(),
            pantry_key: String::new(),
            basket: None,
            debug_mode: false,
            password: None,
            extra: Map::new(),
        }
    }
}

/// The chat completions endpoint for well-known models.
pub fn infer_api_url(model: &str) -> Option<&'static str> {
    if model == "deepseek-chat" {
        Some("https://api.deepseek.com/v1/chat/completions")
    } else if model.contains("qwen") || model == "deepseek-v3" {
        Some("https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions")
    } else {
        None
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum PasswordCheck {
    /// No password existed; the attempt became the password.
    Set,
    Accepted,
    Rejected,
}

impl Settings {
    /// The stored settings, or the defaults if there are none. Stored
    /// settings that aren't an object at all are an error, so that saving
    /// can't replace them with defaults.
    pub fn load(store: &Store) -> Fallible<Self> {
        let Some(text) = store.get_raw(SETTINGS_KEY)? else {
            return Ok(Self::default());
        };
        serde_json::from_str(&text).map_err(|e| {
            log::error!("Unreadable settings: {e}");
            ErrorReport::with_kind(
                ErrorKind::Storage,
                format!("the stored settings could not be read: {e}"),
            )
        })
    }

    pub fn save(&self, store: &Store) -> Fallible<()> {
        log::info!("Saving settings");
        store.set(SETTINGS_KEY, self)
    }

    /// Whether questions can be generated remotely.
    pub fn has_api_credentials(&self) -> bool {
        !self.api_url.trim().is_empty() && !self.api_key.trim().is_empty()
    }

    /// Switch models, filling in the endpoint if none was given.
    pub fn set_model(&mut self, model: &str) {
        self.api_model = model.to_string();
        if self.api_url.trim().is_empty() {
            if let Some(url) = infer_api_url(model) {
                self.api_url = url.to_string();
            }
        }
    }

    /// Update a field by its command-line name.
    pub fn set_field(&mut self, name: &str, value: &str) -> Fallible<()> {
        match name {
            "model" => self.set_model(value),
            "url" => self.api_url = value.trim().to_string(),
            "key" => self.api_key = value.trim().to_string(),
            "count" => match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.question_count = n,
                _ => {
                    return fail_kind(
                        ErrorKind::Validation,
                        format!("invalid question count: {value}"),
                    );
                }
            },
            "prompt" => self.api_prompt = value.to_string(),
            "pantry-key" => self.pantry_key = value.trim().to_string(),
            "basket" => {
                let value = value.trim();
                self.basket = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            "debug" => match value.trim() {
                "true" | "on" | "1" => self.debug_mode = true,
                "false" | "off" | "0" => self.debug_mode = false,
                _ => {
                    return fail_kind(ErrorKind::Validation, format!("invalid flag: {value}"));
                }
            },
            _ => {
                return fail_kind(
                    ErrorKind::Validation,
                    format!("unknown setting: {name}"),
                );
            }
        }
        Ok(())
    }

    /// Check an access password. The first non-blank attempt sets it.
    pub fn verify_password(&mut self, attempt: &str) -> Fallible<PasswordCheck> {
        match &self.password {
            None => {
                if attempt.trim().is_empty() {
                    return fail_kind(ErrorKind::Validation, "please choose an access password.");
                }
                self.password = Some(attempt.to_string());
                log::info!("Access password set");
                Ok(PasswordCheck::Set)
            }
            Some(stored) if stored == attempt => {
                log::info!("Password accepted");
                Ok(PasswordCheck::Accepted)
            }
            Some(_) => {
                log::info!("Password rejected");
                Ok(PasswordCheck::Rejected)
            }
        }
    }

    /// The settings as shown to the user: secrets are masked.
    pub fn redacted(&self) -> Fallible<Value> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            for field in SECRET_FIELDS {
                if let Some(Value::String(s)) = map.get_mut(field) {
                    if !s.is_empty() {
                        *s = "********".to_string();
                    }
                }
            }
        }
        Ok(value)
    }
}
