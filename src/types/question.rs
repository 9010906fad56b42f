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
use serde_json::Value;

use crate::error::ErrorReport;
use crate::error::fail;

pub type QuestionId = u32;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum QuestionType {
    /// Free-text answer.
    Input,
    /// Pick one of the listed options.
    Select,
}

impl QuestionType {
    pub fn as_str(&self) -> &str {
        match self {
            QuestionType::Input => "input",
            QuestionType::Select => "select",
        }
    }
}

impl TryFrom<String> for QuestionType {
    type Error = ErrorReport;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "input" => Ok(QuestionType::Input),
            "select" => Ok(QuestionType::Select),
            _ => fail(format!("Invalid question type: {}", value)),
        }
    }
}

impl From<QuestionType> for String {
    fn from(value: QuestionType) -> Self {
        value.as_str().to_string()
    }
}

/// A single quiz question, as attached to a record.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub question: String,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "null_as_default"
    )]
    pub options: Vec<String>,
    #[serde(deserialize_with = "scalar_to_string")]
    pub answer: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hint: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub thinking: String,
}

/// Generated answers are sometimes bare numbers or booleans.
pub fn scalar_to_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "answer must be a string, got {other}"
        ))),
    }
}

/// `null` reads as the default.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Question {
    /// Whether `user_answer` matches the canonical answer. Surrounding
    /// whitespace in the user's answer is ignored, as is case on both sides.
    pub fn is_correct(&self, user_answer: &str) -> bool {
        is_correct(user_answer, &self.answer)
    }
}

pub fn is_correct(user_answer: &str, answer: &str) -> bool {
    user_answer.trim().to_lowercase() == answer.to_lowercase()
}
