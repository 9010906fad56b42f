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

//! The per-day task workflow: open a date, fetch its questions, answer and
//! check them one at a time, then submit.
//!
//! A [`TaskSession`] holds the in-memory working copy of one record, plus the
//! answers typed so far and the per-question attempt counters. None of that
//! is persisted until submission. Opening another date means creating a new
//! session, which discards all of it.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;

use crate::error::ErrorKind;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail_kind;
use crate::generate::default_questions;
use crate::generate::generate_questions;
use crate::journal::Journal;
use crate::llm::QuestionSupplier;
use crate::prompt::Prompt;
use crate::stats::completed_total;
use crate::types::date::Date;
use crate::types::question::Question;
use crate::types::question::QuestionId;
use crate::types::record::GradedAnswer;
use crate::types::record::Record;
use crate::types::record::Submission;
use crate::types::record::Summary;
use crate::types::timestamp::Timestamp;

/// Incorrect attempts allowed before a question is locked.
const MAX_ATTEMPTS: u32 = 2;

const DEFAULT_HINT: &str = "The answer is incorrect, please try again.";

#[derive(Debug, PartialEq)]
pub enum CheckOutcome {
    /// Nothing was entered. Doesn't count as an attempt.
    Empty,
    /// Correct. The question is now locked.
    Correct { answer: String, thinking: String },
    /// First miss.
    Hint(String),
    /// Second miss. The question is now locked.
    Revealed { answer: String, thinking: String },
    /// The question was already locked.
    Locked,
}

#[derive(Debug, PartialEq)]
pub enum SubmitOutcome {
    Cancelled,
    Submitted {
        summary: Summary,
        /// All completed tasks, including deleted ones.
        completed_total: u64,
    },
}

pub enum RedoOutcome {
    Cancelled,
    /// The record was reset. It isn't today's, so it wasn't reopened.
    Reset,
    Reopened(TaskSession),
}

#[derive(Debug)]
pub struct TaskSession {
    date: Date,
    record: Record,
    pending: HashMap<QuestionId, String>,
    attempts: HashMap<QuestionId, u32>,
    locked: HashSet<QuestionId>,
    ignore_unanswered: bool,
}

impl TaskSession {
    /// Load the record for `date`, creating an empty one if there is none.
    ///
    /// A stored record that can't be read is an error, and is left as it is.
    pub fn open(journal: &Journal, date: Date) -> Fallible<Self> {
        let key = date.key();
        let record = match journal.store.get_raw(&key)? {
            Some(text) => serde_json::from_str::<Record>(&text).map_err(|e| {
                log::error!("Unreadable task {key}: {e}");
                ErrorReport::with_kind(
                    ErrorKind::Storage,
                    format!("the task for {key} could not be read: {e}"),
                )
            })?,
            None => {
                log::info!("Creating task {key}");
                let record = Record::new();
                journal.store.set(&key, &record)?;
                journal.check_quota()?;
                record
            }
        };
        Ok(Self {
            date,
            record,
            pending: HashMap::new(),
            attempts: HashMap::new(),
            locked: HashSet::new(),
            ignore_unanswered: false,
        })
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn questions(&self) -> &[Question] {
        self.record.questions().unwrap_or_default()
    }

    /// Allow submitting with unanswered questions.
    pub fn set_ignore_unanswered(&mut self, ignore: bool) {
        self.ignore_unanswered = ignore;
    }

    /// Attach questions to the record, unless it already has some.
    pub async fn fetch_questions<S: QuestionSupplier>(
        &mut self,
        journal: &Journal,
        supplier: &S,
    ) -> Fallible<()> {
        if self.record.is_simplified() {
            return fail_kind(
                ErrorKind::Validation,
                "this task has been archived; redo it to start over.",
            );
        }
        if self.record.questions().is_some() {
            log::debug!("Using cached questions for {}", self.date);
            return Ok(());
        }
        let settings = journal.settings()?;
        let questions = if settings.has_api_credentials() {
            log::info!("Fetching questions for {}", self.date);
            generate_questions(supplier, &settings)
                .await
                .map_err(|e| {
                    ErrorReport::with_kind(
                        ErrorKind::Fetch,
                        format!("API request failed: {}", e.message()),
                    )
                })?
        } else {
            log::info!("No question service configured, using the built-in questions.");
            default_questions(self.date)
        };
        let record = Record::Pending {
            questions: Some(questions),
        };
        journal.store.set(&self.date.key(), &record)?;
        self.record = record;
        journal.check_quota()?;
        Ok(())
    }

    /// The questions, if the record is still open for answers.
    fn open_questions(&self) -> Fallible<&[Question]> {
        match &self.record {
            Record::Pending {
                questions: Some(questions),
            } => Ok(questions),
            Record::Pending { questions: None } => fail_kind(
                ErrorKind::Validation,
                "questions have not been fetched yet.",
            ),
            Record::Submitted(_) => fail_kind(
                ErrorKind::Validation,
                "this task has already been submitted.",
            ),
            Record::Simplified(_) => {
                fail_kind(ErrorKind::Validation, "this task has been archived.")
            }
        }
    }

    fn question(&self, id: QuestionId) -> Fallible<&Question> {
        self.open_questions()?
            .iter()
            .find(|q| q.id == id)
            .ok_or_else(|| {
                ErrorReport::with_kind(ErrorKind::Validation, format!("no question with id {id}."))
            })
    }

    /// Record an attempt in memory.
    pub fn answer(&mut self, id: QuestionId, value: &str) -> Fallible<()> {
        self.question(id)?;
        if self.locked.contains(&id) {
            return fail_kind(ErrorKind::Validation, format!("question {id} is locked."));
        }
        self.pending.insert(id, value.to_string());
        Ok(())
    }

    /// Check the pending attempt for a question.
    pub fn check(&mut self, id: QuestionId) -> Fallible<CheckOutcome> {
        let question = self.question(id)?.clone();
        if self.locked.contains(&id) {
            return Ok(CheckOutcome::Locked);
        }
        let attempt = self.pending.get(&id).map(|s| s.trim()).unwrap_or_default();
        if attempt.is_empty() {
            return Ok(CheckOutcome::Empty);
        }
        let correct = question.is_correct(attempt);
        let attempts = self.attempts.entry(id).or_insert(0);
        *attempts += 1;
        if correct {
            self.locked.insert(id);
            Ok(CheckOutcome::Correct {
                answer: question.answer,
                thinking: question.thinking,
            })
        } else if *attempts >= MAX_ATTEMPTS {
            self.locked.insert(id);
            Ok(CheckOutcome::Revealed {
                answer: question.answer,
                thinking: question.thinking,
            })
        } else if question.hint.is_empty() {
            Ok(CheckOutcome::Hint(DEFAULT_HINT.to_string()))
        } else {
            Ok(CheckOutcome::Hint(question.hint))
        }
    }

    /// Questions without a non-blank attempt.
    pub fn unanswered(&self) -> usize {
        self.questions()
            .iter()
            .filter(|q| {
                self.pending
                    .get(&q.id)
                    .is_none_or(|answer| answer.trim().is_empty())
            })
            .count()
    }

    /// Grade and persist every answer, then reopen the now-submitted record.
    pub fn submit<P: Prompt>(
        &mut self,
        journal: &Journal,
        prompt: &mut P,
    ) -> Fallible<SubmitOutcome> {
        if self.record.is_submitted() {
            return fail_kind(
                ErrorKind::Validation,
                "this task has already been submitted.",
            );
        }
        if !prompt.confirm("Submit your answers? They can't be changed afterwards.") {
            log::info!("Submission of {} cancelled", self.date);
            return Ok(SubmitOutcome::Cancelled);
        }
        let questions: Vec<Question> = self.questions().to_vec();
        if questions.is_empty() {
            return fail_kind(ErrorKind::Validation, "there are no questions to submit.");
        }
        if !self.ignore_unanswered {
            let missing = self.unanswered();
            if missing == 1 {
                return fail_kind(
                    ErrorKind::Validation,
                    "1 question is still unanswered. Answer every question before submitting.",
                );
            } else if missing > 1 {
                return fail_kind(
                    ErrorKind::Validation,
                    format!(
                        "{missing} questions are still unanswered. Answer every question before submitting."
                    ),
                );
            }
        }

        let answers: BTreeMap<QuestionId, GradedAnswer> = questions
            .iter()
            .map(|q| {
                let answer = self.pending.get(&q.id).cloned().unwrap_or_default();
                let correct = !answer.trim().is_empty() && q.is_correct(&answer);
                (q.id, GradedAnswer { answer, correct })
            })
            .collect();
        let correct_count = answers.values().filter(|a| a.correct).count();
        let record = Record::Submitted(Submission {
            questions,
            answers,
            correct_count,
            submit_time: Some(Timestamp::now()),
        });
        let summary = record.summary();
        journal.store.set(&self.date.key(), &record)?;
        log::info!(
            "Submitted {}: {}/{} correct",
            self.date,
            summary.correct_count,
            summary.total_questions
        );
        journal.check_quota()?;
        let completed_total = completed_total(&journal.store)?;
        *self = TaskSession::open(journal, self.date)?;
        Ok(SubmitOutcome::Submitted {
            summary,
            completed_total,
        })
    }
}

/// Discard the record for `date` and start it over.
pub fn redo<P: Prompt>(journal: &Journal, date: Date, prompt: &mut P) -> Fallible<RedoOutcome> {
    let message = format!("Redo the task for {date}? Its questions and answers will be discarded.");
    if !prompt.confirm(&message) {
        return Ok(RedoOutcome::Cancelled);
    }
    journal.store.set(&date.key(), &Record::new())?;
    log::info!("Reset task {date}");
    journal.check_quota()?;
    if date == journal.today() {
        Ok(RedoOutcome::Reopened(TaskSession::open(journal, date)?))
    } else {
        Ok(RedoOutcome::Reset)
    }
}
