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

use std::collections::VecDeque;

use axum::Router;
use tempfile::TempDir;
use tempfile::tempdir;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::config::DATABASE_FILE;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::journal::Journal;
use crate::prompt::Prompt;
use crate::store::Store;
use crate::types::date::Date;
use crate::types::question::Question;
use crate::types::question::QuestionType;
use crate::types::record::GradedAnswer;
use crate::types::record::Record;
use crate::types::record::Submission;
use crate::types::timestamp::Timestamp;

pub fn create_tmp_directory() -> Fallible<TempDir> {
    Ok(tempdir()?)
}

/// A fresh store in a temporary directory. Keep the directory alive for as
/// long as the store is used.
pub fn open_test_store(capacity: usize) -> Fallible<(TempDir, Store)> {
    let dir = create_tmp_directory()?;
    let path = dir.path().join(DATABASE_FILE);
    let store = Store::new(&path.display().to_string(), "test", capacity)?;
    Ok((dir, store))
}

/// A journal in a temporary directory, on 2024-03-01.
pub fn open_test_journal(config: Config) -> Fallible<(TempDir, Journal)> {
    let dir = create_tmp_directory()?;
    let today = Date::parse("2024-03-01")?;
    let journal = Journal::with_config(dir.path().to_path_buf(), config, today)?;
    Ok((dir, journal))
}

/// `n` input questions with ids `1..=n`; question `i` has answer `a{i}`.
pub fn sample_questions(n: u32) -> Vec<Question> {
    (1..=n)
        .map(|id| Question {
            id,
            kind: QuestionType::Input,
            question: format!("Question {id}?"),
            options: Vec::new(),
            answer: format!("a{id}"),
            hint: format!("hint {id}"),
            thinking: format!("because {id}"),
        })
        .collect()
}

/// A submitted record with `total` questions, the first `correct` of which
/// were answered correctly.
pub fn submitted_record(total: u32, correct: u32) -> Record {
    let questions = sample_questions(total);
    let answers = questions
        .iter()
        .map(|q| {
            let answer = if q.id <= correct {
                GradedAnswer {
                    answer: q.answer.clone(),
                    correct: true,
                }
            } else {
                GradedAnswer {
                    answer: "wrong".to_string(),
                    correct: false,
                }
            };
            (q.id, answer)
        })
        .collect();
    Record::Submitted(Submission {
        questions,
        answers,
        correct_count: correct as usize,
        submit_time: Some(Timestamp::now()),
    })
}

/// Answers prompts from a script. Runs out as "no" and end of input.
pub struct Scripted {
    confirms: VecDeque<bool>,
    lines: VecDeque<String>,
}

impl Scripted {
    pub fn new(confirms: &[bool], lines: &[&str]) -> Self {
        Self {
            confirms: confirms.iter().copied().collect(),
            lines: lines.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Says yes to everything.
    pub fn agreeable() -> Self {
        Self::new(&[true; 8], &[])
    }
}

impl Prompt for Scripted {
    fn confirm(&mut self, _message: &str) -> bool {
        self.confirms.pop_front().unwrap_or(false)
    }

    fn ask(&mut self, _message: &str) -> Option<String> {
        self.lines.pop_front()
    }
}

/// Serve `router` on a free local port. Returns the base URL.
pub async fn spawn_router(router: Router) -> Fallible<String> {
    let port = portpicker::pick_unused_port()
        .ok_or_else(|| ErrorReport::new("no free port available"))?;
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("http://127.0.0.1:{port}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submitted_record() {
        let record = submitted_record(4, 3);
        assert_eq!(record.summary().correct_count, 3);
        assert_eq!(record.summary().total_questions, 4);
    }

    #[test]
    fn test_scripted_runs_out() {
        let mut prompt = Scripted::new(&[true], &["x"]);
        assert!(prompt.confirm("?"));
        assert!(!prompt.confirm("?"));
        assert_eq!(prompt.ask("?").as_deref(), Some("x"));
        assert_eq!(prompt.ask("?"), None);
    }
}
