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

//! Plain-text rendering of tasks for the terminal.

use std::fmt::Write;

use crate::task::CheckOutcome;
use crate::types::question::Question;
use crate::types::question::QuestionType;
use crate::types::record::Submission;
use crate::types::record::Summary;

/// A question as it is asked: numbered options for select questions, the
/// hint as a placeholder for input questions.
pub fn render_question(position: usize, question: &Question) -> String {
    let mut out = format!("Question {position}: {}\n", question.question);
    match question.kind {
        QuestionType::Select => {
            for (index, option) in question.options.iter().enumerate() {
                let _ = writeln!(out, "  {}) {option}", index + 1);
            }
        }
        QuestionType::Input => {
            if !question.hint.is_empty() {
                let _ = writeln!(out, "  ({})", question.hint);
            }
        }
    }
    out
}

/// Turn what the user typed into an answer. For select questions, an option
/// number picks that option.
pub fn resolve_choice(question: &Question, input: &str) -> String {
    if question.kind == QuestionType::Select {
        if let Ok(n) = input.trim().parse::<usize>() {
            if let Some(option) = n.checked_sub(1).and_then(|i| question.options.get(i)) {
                return option.clone();
            }
        }
    }
    input.to_string()
}

pub fn render_check(outcome: &CheckOutcome) -> String {
    match outcome {
        CheckOutcome::Empty => "Please enter an answer.".to_string(),
        CheckOutcome::Correct { answer, thinking } => {
            reveal("✓ Correct!", answer, thinking)
        }
        CheckOutcome::Hint(hint) => format!("Hint: {hint}"),
        CheckOutcome::Revealed { answer, thinking } => reveal("✗ Incorrect.", answer, thinking),
        CheckOutcome::Locked => "This question is already locked.".to_string(),
    }
}

fn reveal(verdict: &str, answer: &str, thinking: &str) -> String {
    let mut out = format!("{verdict}\nAnswer: {answer}");
    if !thinking.is_empty() {
        let _ = write!(out, "\nExplanation: {thinking}");
    }
    out
}

/// A submitted task, question by question.
pub fn render_submission(submission: &Submission) -> String {
    let mut out = format!(
        "Score: {}/{}\n",
        submission.correct_count,
        submission.questions.len()
    );
    for (index, question) in submission.questions.iter().enumerate() {
        let graded = submission.answers.get(&question.id);
        let answer = graded
            .map(|a| a.answer.trim())
            .filter(|a| !a.is_empty())
            .unwrap_or("(no answer)");
        let correct = graded.is_some_and(|a| a.correct);
        let _ = writeln!(out, "\nQuestion {}: {}", index + 1, question.question);
        let _ = writeln!(
            out,
            "  Your answer: {answer} {}",
            if correct { "✓" } else { "✗" }
        );
        if !correct {
            let _ = writeln!(out, "  Correct answer: {}", question.answer);
        }
        if !question.thinking.is_empty() {
            let _ = writeln!(out, "  Explanation: {}", question.thinking);
        }
    }
    out
}

pub fn render_summary(summary: &Summary) -> String {
    format!(
        "This task has been archived.\nScore: {}/{}",
        summary.correct_count, summary.total_questions
    )
}
