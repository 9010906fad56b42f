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

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::error::ErrorReport;
use crate::types::question::Question;
use crate::types::question::QuestionId;
use crate::types::timestamp::Timestamp;

/// The persisted state of one day's quiz.
///
/// On disk this is a flat JSON object (`submitted`, `questions`,
/// `totalQuestions`, `correctCount`, `answers`, `submitTime`, `simplified`);
/// in memory each lifecycle stage is its own variant, so a simplified record
/// cannot carry questions and an unsubmitted one cannot carry answers.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(into = "RecordRepr", try_from = "RecordRepr")]
pub enum Record {
    /// Not yet submitted. `questions` is `None` until the first fetch.
    Pending { questions: Option<Vec<Question>> },
    /// Submitted and graded, with the full question and answer history.
    Submitted(Submission),
    /// Archived down to its score.
    Simplified(Summary),
}

#[derive(Clone, PartialEq, Debug)]
pub struct Submission {
    pub questions: Vec<Question>,
    pub answers: BTreeMap<QuestionId, GradedAnswer>,
    pub correct_count: usize,
    pub submit_time: Option<Timestamp>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub correct_count: usize,
    pub total_questions: usize,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct GradedAnswer {
    pub answer: String,
    pub correct: bool,
}

impl Record {
    pub fn new() -> Self {
        Record::Pending { questions: None }
    }

    pub fn is_submitted(&self) -> bool {
        !matches!(self, Record::Pending { .. })
    }

    pub fn is_simplified(&self) -> bool {
        matches!(self, Record::Simplified(_))
    }

    pub fn questions(&self) -> Option<&[Question]> {
        match self {
            Record::Pending { questions } => questions.as_deref(),
            Record::Submitted(submission) => Some(&submission.questions),
            Record::Simplified(_) => None,
        }
    }

    pub fn summary(&self) -> Summary {
        match self {
            Record::Pending { questions } => Summary {
                correct_count: 0,
                total_questions: questions.as_ref().map_or(0, |q| q.len()),
            },
            Record::Submitted(submission) => Summary {
                correct_count: submission.correct_count,
                total_questions: submission.questions.len(),
            },
            Record::Simplified(summary) => *summary,
        }
    }

    /// The archived form of a submitted record. Returns `None` for anything
    /// else: pending records have no score to keep, and simplified records
    /// are already as small as they get.
    pub fn simplify(&self) -> Option<Record> {
        match self {
            Record::Submitted(_) => Some(Record::Simplified(self.summary())),
            _ => None,
        }
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordRepr {
    submitted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    questions: Option<Vec<Question>>,
    #[serde(default)]
    total_questions: usize,
    #[serde(default)]
    correct_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    answers: Option<BTreeMap<QuestionId, GradedAnswer>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    submit_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    simplified: bool,
}

impl From<Record> for RecordRepr {
    fn from(record: Record) -> Self {
        let summary = record.summary();
        match record {
            Record::Pending { questions } => RecordRepr {
                submitted: false,
                questions,
                total_questions: summary.total_questions,
                correct_count: 0,
                answers: None,
                submit_time: None,
                simplified: false,
            },
            Record::Submitted(submission) => RecordRepr {
                submitted: true,
                questions: Some(submission.questions),
                total_questions: summary.total_questions,
                correct_count: summary.correct_count,
                answers: Some(submission.answers),
                submit_time: submission.submit_time,
                simplified: false,
            },
            Record::Simplified(summary) => RecordRepr {
                submitted: true,
                questions: None,
                total_questions: summary.total_questions,
                correct_count: summary.correct_count,
                answers: None,
                submit_time: None,
                simplified: true,
            },
        }
    }
}

impl TryFrom<RecordRepr> for Record {
    type Error = ErrorReport;

    fn try_from(repr: RecordRepr) -> Result<Self, Self::Error> {
        if !repr.submitted {
            // Stray scores or answers on an unsubmitted record are dropped.
            return Ok(Record::Pending {
                questions: repr.questions,
            });
        }
        let summary = Summary {
            correct_count: repr.correct_count,
            total_questions: repr.total_questions,
        };
        if repr.simplified {
            return Ok(Record::Simplified(summary));
        }
        match repr.questions {
            Some(questions) => {
                if repr.correct_count > questions.len() {
                    return Err(ErrorReport::new(format!(
                        "record claims {} correct answers out of {} questions",
                        repr.correct_count,
                        questions.len()
                    )));
                }
                Ok(Record::Submitted(Submission {
                    questions,
                    answers: repr.answers.unwrap_or_default(),
                    correct_count: repr.correct_count,
                    submit_time: repr.submit_time,
                }))
            }
            // A submitted record without its questions only has a score left.
            None => Ok(Record::Simplified(summary)),
        }
    }
}
