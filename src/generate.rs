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

use rand::Rng;

use crate::decode::decode_batch;
use crate::error::ErrorKind;
use crate::error::Fallible;
use crate::error::fail_kind;
use crate::llm::ChatRequest;
use crate::llm::QuestionSupplier;
use crate::settings::Settings;
use crate::types::date::Date;
use crate::types::question::Question;
use crate::types::question::QuestionId;
use crate::types::question::QuestionType;

/// Questions requested per prompt.
const QUESTIONS_PER_BATCH: usize = 5;

const TEMPERATURE: f64 = 1.8;

const AUTHORING_RULES: &str = r#"1. Multiple-choice questions have 4 options, exactly one of which is correct.
2. Fill-in questions should have a clear and unique answer, so that it is easy to tell whether a response is right. Avoid subjective questions.
3. Every question has the following fields:
   a. type: input or select
   b. question: the question text
   c. options: the candidate answers, for select questions
   d. answer: the correct answer. For select questions it must be identical to one of the options.
   e. hint: helps the user towards the answer without giving it away
   f. thinking: explains the answer, so that the user can solve similar questions
4. Return all questions as a JSON array that a standard JSON parser accepts, in this format:
[
    {
        "type": "select",
        "question": "How many days are there in a week?",
        "options": ["1", "2", "7", "6"],
        "answer": "7",
        "hint": "Look at a calendar.",
        "thinking": "A simple question about dates, answered by looking at a calendar."
    },
    {
        "type": "input",
        "question": "How many months are there in a year? (answer with digits)",
        "answer": "12",
        "hint": "A year has 365 days, and a month has about 30.",
        "thinking": "A simple question about dates, answered by looking at a calendar."
    }
]"#;

/// One prompt per batch of five questions, each with its own random seed so
/// that batches don't repeat each other.
pub fn build_prompts<R: Rng>(topic: &str, count: usize, rng: &mut R) -> Vec<String> {
    let batches = count.div_ceil(QUESTIONS_PER_BATCH);
    (0..batches)
        .map(|_| {
            let seed: u32 = rng.random_range(10_000_000..100_000_000);
            format!(
                "# Topics\n{topic}\n# Requirements\n{AUTHORING_RULES}\n5. From the random seed ({seed}), generate a random number (000000-999999).\n6. Pick questions completely at random; the questions must not be related to each other.\n7. Generate select and input questions in the ratio {QUESTIONS_PER_BATCH}:0.\n# Return {QUESTIONS_PER_BATCH} questions:"
            )
        })
        .collect()
}

/// The built-in questions used when no question service is configured.
pub fn default_questions(date: Date) -> Vec<Question> {
    let key = date.key();
    vec![
        Question {
            id: 1,
            kind: QuestionType::Select,
            question: "What is today's date?".to_string(),
            options: vec![key.clone(), "yesterday".to_string(), "tomorrow".to_string()],
            answer: key,
            hint: "Check the current date.".to_string(),
            thinking: "A simple question about dates: the answer is the current date.".to_string(),
        },
        Question {
            id: 2,
            kind: QuestionType::Input,
            question: "What day of the week is it today? (in English, e.g. monday)".to_string(),
            options: Vec::new(),
            answer: date.weekday_name().to_string(),
            hint: "Check a calendar.".to_string(),
            thinking: "The days of the week are monday, tuesday, wednesday, thursday, friday, saturday and sunday.".to_string(),
        },
        Question {
            id: 3,
            kind: QuestionType::Select,
            question: "Which of the following is not a JavaScript data type?".to_string(),
            options: vec![
                "String".to_string(),
                "Number".to_string(),
                "Character".to_string(),
                "Boolean".to_string(),
            ],
            answer: "Character".to_string(),
            hint: "JavaScript has six primitive types.".to_string(),
            thinking: "JavaScript's primitive types are String, Number, Boolean, Undefined, Null and Symbol. Character is a type in languages like Java, not JavaScript.".to_string(),
        },
        Question {
            id: 4,
            kind: QuestionType::Input,
            question: "What does HTML5 stand for?".to_string(),
            options: Vec::new(),
            answer: "HyperText Markup Language 5".to_string(),
            hint: "The fifth version of the hypertext markup language.".to_string(),
            thinking: "HTML is short for HyperText Markup Language, and HTML5 is its fifth major version.".to_string(),
        },
        Question {
            id: 5,
            kind: QuestionType::Input,
            question: "Which CSS selector selects every element?".to_string(),
            options: Vec::new(),
            answer: "*".to_string(),
            hint: "It's a wildcard.".to_string(),
            thinking: "The universal selector, written as an asterisk, matches every element in the document.".to_string(),
        },
    ]
}

/// Generate a fresh set of questions with the configured service.
///
/// Batches that don't decode are dropped. The fetch fails if fewer than half
/// of the requested questions survive. Ids are assigned from 1.
pub async fn generate_questions<S: QuestionSupplier>(
    supplier: &S,
    settings: &Settings,
) -> Fallible<Vec<Question>> {
    let count = settings.question_count;
    let prompts = build_prompts(&settings.api_prompt, count, &mut rand::rng());
    let request = ChatRequest {
        endpoint: &settings.api_url,
        api_key: &settings.api_key,
        model: &settings.api_model,
        prompts: &prompts,
        temperature: TEMPERATURE,
    };
    let contents = supplier.complete(&request).await?;

    let mut drafts = Vec::new();
    for (batch, content) in contents.iter().enumerate() {
        match decode_batch(batch, content) {
            Ok(batch) => drafts.extend(batch),
            Err(e) => log::warn!("Dropping undecodable batch: {e}"),
        }
    }
    // Fewer than half means the service is producing junk.
    if drafts.len() * 2 < count {
        return fail_kind(
            ErrorKind::Fetch,
            format!(
                "wrong number of questions: got {}, expected {count}.",
                drafts.len()
            ),
        );
    }
    Ok(drafts
        .into_iter()
        .enumerate()
        .map(|(index, draft)| draft.into_question(index as QuestionId + 1))
        .collect())
}
