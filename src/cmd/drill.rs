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

use crate::error::Fallible;
use crate::journal::Journal;
use crate::llm::HttpSupplier;
use crate::prompt::Prompt;
use crate::prompt::Terminal;
use crate::task::CheckOutcome;
use crate::task::RedoOutcome;
use crate::task::SubmitOutcome;
use crate::task::TaskSession;
use crate::task::redo;
use crate::types::date::Date;
use crate::types::record::Record;
use crate::view::render_check;
use crate::view::render_question;
use crate::view::render_submission;
use crate::view::render_summary;
use crate::view::resolve_choice;

/// Work through the task for `date` interactively. With
/// `ignore_unanswered`, the task can be submitted before every question has
/// an answer.
pub async fn drill(journal: &Journal, date: Date, ignore_unanswered: bool) -> Fallible<()> {
    let mut session = TaskSession::open(journal, date)?;
    session.set_ignore_unanswered(ignore_unanswered);
    println!("Task for {date} ({}).", date.weekday_name());
    match session.record() {
        Record::Simplified(summary) => {
            println!("{}", render_summary(summary));
            return Ok(());
        }
        Record::Submitted(submission) => {
            println!("{}", render_submission(submission));
            return Ok(());
        }
        Record::Pending { questions } => {
            if questions.is_none() {
                println!("Fetching questions...");
            }
        }
    }
    session.fetch_questions(journal, &HttpSupplier::new()).await?;

    let mut prompt = Terminal;
    let questions = session.questions().to_vec();
    for (index, question) in questions.iter().enumerate() {
        println!("\n{}", render_question(index + 1, question));
        loop {
            let Some(input) = prompt.ask("Your answer:") else {
                println!("\nStopped. Your answers have not been submitted.");
                return Ok(());
            };
            session.answer(question.id, &resolve_choice(question, &input))?;
            let outcome = session.check(question.id)?;
            println!("{}", render_check(&outcome));
            match outcome {
                CheckOutcome::Empty if ignore_unanswered => break,
                CheckOutcome::Empty | CheckOutcome::Hint(_) => continue,
                _ => break,
            }
        }
    }

    println!();
    match session.submit(journal, &mut prompt)? {
        SubmitOutcome::Cancelled => {
            println!("Not submitted.");
        }
        SubmitOutcome::Submitted {
            summary,
            completed_total,
        } => {
            println!(
                "Submitted: {}/{} correct. Tasks completed so far: {completed_total}.",
                summary.correct_count, summary.total_questions
            );
        }
    }
    Ok(())
}

/// Print the task for `date` without changing anything.
pub fn show(journal: &Journal, date: Date) -> Fallible<()> {
    let key = date.key();
    if journal.store.get_raw(&key)?.is_none() {
        println!("No task for {date}.");
        return Ok(());
    }
    match journal.store.get::<Record>(&key)? {
        None => println!("The task for {date} could not be read."),
        Some(Record::Pending { questions }) => {
            let count = questions.map_or(0, |q| q.len());
            println!("The task for {date} has not been submitted ({count} questions).");
        }
        Some(Record::Submitted(submission)) => println!("{}", render_submission(&submission)),
        Some(Record::Simplified(summary)) => println!("{}", render_summary(&summary)),
    }
    Ok(())
}

pub fn redo_task<P: Prompt>(journal: &Journal, date: Date, prompt: &mut P) -> Fallible<()> {
    match redo(journal, date, prompt)? {
        RedoOutcome::Cancelled => println!("Cancelled."),
        RedoOutcome::Reset => println!("The task for {date} has been reset."),
        RedoOutcome::Reopened(session) => println!(
            "Today's task has been reset ({} questions). Run `dailyquiz drill` to start over.",
            session.questions().len()
        ),
    }
    Ok(())
}
