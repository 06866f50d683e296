//! OpenAI-compatible chat completions client.
//!
//! Works against any server implementing the OpenAI chat completions API
//! (Ollama, vLLM, llama.cpp server, OpenAI itself). Responses are streamed
//! via Server-Sent Events and the interrupt counter is checked on every
//! line, so a barge-in stops generation within one streamed token.

use super::classify::{CLASSIFIER_PROMPT, parse_decision};
use super::history::{ChatHistory, Role, word_count};
use super::sanitize::sanitize;
use crate::collaborators::{Generation, GenerationRequest, LlmClient, SearchDecision};
use crate::config::LlmConfig;
use crate::error::{HarkError, Result};
use crate::pipeline::interrupt::InterruptCounter;
use std::io::{BufRead, BufReader};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const NO_THINK: &str = " /no_think";

/// LLM client using an OpenAI-compatible HTTP API.
pub struct OpenAiClient {
    config: LlmConfig,
    api_key: String,
    base_url: String,
    history: ChatHistory,
    agent: ureq::Agent,
}

impl OpenAiClient {
    /// # Errors
    ///
    /// Returns an error if a configured history file exists but cannot be
    /// read.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout_s.max(1));
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .build();

        let history = match &config.history_path {
            Some(path) => ChatHistory::load(path, config.max_tokens, &config.system_prompt)?,
            None => ChatHistory::new(config.max_tokens, &config.system_prompt),
        };

        let base = config
            .api_url
            .strip_suffix("/v1")
            .unwrap_or(&config.api_url)
            .trim_end_matches('/')
            .to_owned();
        info!("API LLM configured: {base} model={}", config.api_model);

        Ok(Self {
            config: config.clone(),
            api_key: config.effective_api_key(),
            base_url: base,
            history,
            agent,
        })
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    fn post(&self, path: &str) -> ureq::Request {
        let mut req = self
            .agent
            .post(&format!("{}{path}", self.base_url))
            .set("Content-Type", "application/json");
        if !self.api_key.is_empty() {
            req = req.set("Authorization", &format!("Bearer {}", self.api_key));
        }
        req
    }

    /// Stream a completion. Returns `None` when the counter went positive.
    fn stream_chat(
        &self,
        messages: Vec<serde_json::Value>,
        interrupt: &InterruptCounter,
    ) -> Result<Option<String>> {
        let body = serde_json::json!({
            "model": self.config.api_model,
            "messages": messages,
            "stream": true,
            "temperature": self.config.temperature,
            "top_p": self.config.top_p,
        });
        let body = serde_json::to_string(&body)
            .map_err(|e| HarkError::Llm(format!("JSON serialization failed: {e}")))?;

        let response = self
            .post("/v1/chat/completions")
            .send_string(&body)
            .map_err(|e| HarkError::Llm(format!("API request failed: {e}")))?;

        let mut text = String::new();
        let reader = BufReader::new(response.into_reader());
        for line in reader.lines() {
            if interrupt.is_interrupted() {
                return Ok(None);
            }
            let line = line.map_err(|e| HarkError::Llm(format!("read error: {e}")))?;
            let Some(data) = line.strip_prefix("data:").map(str::trim_start) else {
                continue;
            };
            if data == "[DONE]" {
                break;
            }
            let chunk: serde_json::Value = serde_json::from_str(data)
                .map_err(|e| HarkError::Llm(format!("JSON parse error: {e}")))?;
            if let Some(content) = chunk["choices"][0]["delta"]["content"].as_str() {
                text.push_str(content);
            }
            if chunk["choices"][0]["finish_reason"].as_str() == Some("stop") {
                break;
            }
        }
        if interrupt.is_interrupted() {
            return Ok(None);
        }
        Ok(Some(text))
    }
}

fn message(role: Role, content: &str) -> serde_json::Value {
    serde_json::json!({ "role": role.as_str(), "content": content })
}

impl LlmClient for OpenAiClient {
    fn warm_up(&mut self) -> Result<()> {
        let mut req = self.agent.get(&format!("{}/v1/models", self.base_url));
        if !self.api_key.is_empty() {
            req = req.set("Authorization", &format!("Bearer {}", self.api_key));
        }
        req.call()
            .map_err(|e| HarkError::Llm(format!("model server unreachable: {e}")))?;
        debug!("model server reachable");
        Ok(())
    }

    fn classify_search_need(
        &mut self,
        text: &str,
        interrupt: &InterruptCounter,
    ) -> Result<Option<SearchDecision>> {
        let messages = vec![
            message(Role::System, CLASSIFIER_PROMPT),
            message(Role::User, &format!("{text}{NO_THINK}")),
        ];
        let Some(reply) = self.stream_chat(messages, interrupt)? else {
            return Ok(None);
        };
        let decision = parse_decision(&sanitize(&reply));
        debug!(?decision, "search classifier");
        Ok(Some(decision))
    }

    fn generate(
        &mut self,
        request: &GenerationRequest,
        interrupt: &InterruptCounter,
    ) -> Result<Generation> {
        let mut user = request.turn.full();
        if !self.config.enable_think {
            user.push_str(NO_THINK);
        }
        let started = Instant::now();

        let mut messages = vec![message(Role::System, &self.config.system_prompt)];
        messages.extend(
            self.history
                .window(word_count(&user))
                .iter()
                .map(|e| message(e.message.role, &e.message.content)),
        );
        messages.push(message(Role::User, &user));
        debug!(prompt = %user, turns = messages.len(), "generating");

        let Some(raw) = self.stream_chat(messages, interrupt)? else {
            info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "generation interrupted"
            );
            return Ok(Generation::Interrupted);
        };
        let answer = sanitize(&raw);
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            words = word_count(&answer),
            "generation complete"
        );

        if let Err(e) = self.history.commit(&request.turn.body, &answer) {
            warn!("failed to save chat history: {e}");
        }
        Ok(Generation::Complete(answer))
    }
}
