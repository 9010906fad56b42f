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

use futures::future::try_join_all;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use serde_json::json;

use crate::error::ErrorKind;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail_kind;

/// A request to the question-authoring service: one chat completion per
/// prompt.
pub struct ChatRequest<'a> {
    pub endpoint: &'a str,
    pub api_key: &'a str,
    pub model: &'a str,
    pub prompts: &'a [String],
    pub temperature: f64,
}

/// Something that turns prompts into raw model output, one text per prompt,
/// in order.
#[allow(async_fn_in_trait)]
pub trait QuestionSupplier {
    async fn complete(&self, request: &ChatRequest<'_>) -> Fallible<Vec<String>>;
}

/// Talks to an OpenAI-compatible chat completions endpoint. All prompts are
/// sent concurrently; if any one of them fails, the whole request fails.
pub struct HttpSupplier {
    client: Client,
}

impl HttpSupplier {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    async fn complete_one(
        &self,
        request: &ChatRequest<'_>,
        index: usize,
        prompt: &str,
    ) -> Fallible<String> {
        let body = json!({
            "model": request.model,
            "messages": [
                {
                    "role": "user",
                    "content": prompt,
                }
            ],
            "temperature": request.temperature,
        });
        let response = self
            .client
            .post(request.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(request.api_key)
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| fetch_error(format!("prompts[{index}]: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| fetch_error(format!("prompts[{index}]: {e}")))?;
        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or_else(|| format!("API error: ({})", status.as_u16()));
            log::error!("prompts[{index}] error: {message}");
            return fail_kind(ErrorKind::Fetch, message);
        }
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| fetch_error(format!("prompts[{index}]: invalid response: {e}")))?;
        match value["choices"][0]["message"]["content"].as_str() {
            Some(content) => Ok(content.to_string()),
            None => fail_kind(
                ErrorKind::Fetch,
                format!("prompts[{index}]: response has no message content"),
            ),
        }
    }
}

impl QuestionSupplier for HttpSupplier {
    async fn complete(&self, request: &ChatRequest<'_>) -> Fallible<Vec<String>> {
        log::debug!(
            "Chat request to {} with model {}, {} prompts, temperature {}",
            request.endpoint,
            request.model,
            request.prompts.len(),
            request.temperature
        );
        let calls = request
            .prompts
            .iter()
            .enumerate()
            .map(|(index, prompt)| self.complete_one(request, index, prompt));
        try_join_all(calls).await
    }
}

fn fetch_error(message: String) -> ErrorReport {
    ErrorReport::with_kind(ErrorKind::Fetch, message)
}
