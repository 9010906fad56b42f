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

//! Decoding of generated question batches.
//!
//! Model output is expected to be a JSON array of question objects, but in
//! practice it is often wrapped in a Markdown code fence or surrounded by
//! prose. The decoder looks for the outermost array and parses that.

use std::fmt::Display;
use std::fmt::Formatter;

use serde::Deserialize;

use crate::types::question::Question;
use crate::types::question::QuestionId;
use crate::types::question::QuestionType;
use crate::types::question::null_as_default;
use crate::types::question::scalar_to_string;

/// A batch that didn't decode.
#[derive(Debug, PartialEq)]
pub struct ParseError {
    /// Index of the offending batch.
    pub batch: usize,
    pub message: String,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "batch {}: {}", self.batch, self.message)
    }
}

/// A generated question, before it has been given an id.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct QuestionDraft {
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub question: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: Vec<String>,
    #[serde(deserialize_with = "scalar_to_string")]
    pub answer: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hint: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub thinking: String,
}

impl QuestionDraft {
    pub fn into_question(self, id: QuestionId) -> Question {
        Question {
            id,
            kind: self.kind,
            question: self.question,
            options: self.options,
            answer: self.answer,
            hint: self.hint,
            thinking: self.thinking,
        }
    }
}

/// The text from the first `[` to the last `]`, inclusive.
fn outermost_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Decode one batch of model output into question drafts.
pub fn decode_batch(batch: usize, text: &str) -> Result<Vec<QuestionDraft>, ParseError> {
    let error = |message: String| ParseError { batch, message };
    let json = outermost_array(text).ok_or_else(|| error("no JSON array found".to_string()))?;
    serde_json::from_str(json).map_err(|e| error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_array() {
        let text = r#"[{"type":"input","question":"How many months are in a year?","answer":"12","hint":"h","thinking":"t"}]"#;
        let drafts = decode_batch(0, text).unwrap();
        assert_eq!(drafts.len(), 1);
        let question = drafts[0].clone().into_question(4);
        assert_eq!(question.id, 4);
        assert_eq!(question.kind, QuestionType::Input);
        assert_eq!(question.answer, "12");
    }

    #[test]
    fn test_fenced_with_prose() {
        let text = "Here are your questions:\n```json\n[\n  {\"type\": \"select\", \"question\": \"Days in a week?\", \"options\": [\"1\", \"2\", \"7\", \"6\"], \"answer\": 7}\n]\n```\nGood luck!";
        let drafts = decode_batch(2, text).unwrap();
        assert_eq!(drafts[0].answer, "7");
        assert_eq!(drafts[0].options.len(), 4);
        assert_eq!(drafts[0].hint, "");
    }

    #[test]
    fn test_errors_name_the_batch() {
        let err = decode_batch(3, "I cannot help with that.").unwrap_err();
        assert_eq!(err.batch, 3);
        assert_eq!(err.to_string(), "batch 3: no JSON array found");

        let err = decode_batch(1, r#"[{"type": "essay", "question": "q", "answer": "a"}]"#)
            .unwrap_err();
        assert_eq!(err.batch, 1);

        assert!(decode_batch(0, "] nothing [").is_err());
    }
}
