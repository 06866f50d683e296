//! Shared helpers: recording sinks, a mock OpenAI-compatible server and
//! console-driven collaborators.

use hark::HarkConfig;
use hark::collaborators::{AudioSink, StatusSink};
use hark::console::{
    ConsoleInput, ConsoleRecorder, ConsoleSynthesizer, ConsoleTranscriber, ConsoleWake,
};
use hark::llm::OpenAiClient;
use hark::pipeline::capture::CaptureCollaborators;
use hark::pipeline::response::ResponseCollaborators;
use hark::retrieval::LexicalStore;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Spoken-time scale for console recordings in tests.
pub(crate) const SECONDS_PER_WORD: f64 = 0.05;

// ── config ──

/// Defaults with short recordings, web search off and the LLM pointed at
/// `llm`.
pub(crate) fn config(llm: &MockServer) -> HarkConfig {
    let mut config = HarkConfig::default();
    config.capture.silence_threshold_s = 0.1;
    config.capture.min_voice_s = 0.02;
    config.response.enable_websearch = false;
    config.llm.api_url = format!("{}/v1", llm.uri());
    config.llm.api_model = "test-model".into();
    config.llm.api_key = "sk-test".into();
    config.llm.history_path = None;
    config
}

// ── mock LLM ──

pub(crate) fn sse(tokens: &[&str]) -> ResponseTemplate {
    let mut body = String::new();
    for token in tokens {
        let chunk = serde_json::json!({ "choices": [{ "delta": { "content": token } }] });
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

/// Model listing for warm-up plus a generation answer for every request.
pub(crate) async fn mount_llm(server: &MockServer, answer: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(sse(answer))
        .mount(server)
        .await;
}

/// Classifier replies take priority over the generic answer.
pub(crate) async fn mount_classifier(server: &MockServer, reply: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("You are a classifier"))
        .respond_with(sse(&[reply]))
        .with_priority(1)
        .mount(server)
        .await;
}

/// Final user message of every generation request, oldest first.
pub(crate) async fn user_turns(server: &MockServer) -> Vec<String> {
    let requests = server.received_requests().await.unwrap_or_default();
    requests
        .iter()
        .filter(|r| r.url.path() == "/v1/chat/completions")
        .filter_map(|r| serde_json::from_slice::<serde_json::Value>(&r.body).ok())
        .filter(|body| {
            !body["messages"][0]["content"]
                .as_str()
                .unwrap_or_default()
                .starts_with("You are a classifier")
        })
        .filter_map(|body| {
            body["messages"]
                .as_array()
                .and_then(|m| m.last())
                .and_then(|m| m["content"].as_str())
                .map(str::to_owned)
        })
        .collect()
}

// ── collaborators ──

pub(crate) fn console_capture(input: &Arc<ConsoleInput>) -> CaptureCollaborators {
    CaptureCollaborators {
        wake: Box::new(ConsoleWake::new(Arc::clone(input))),
        recorder: Box::new(
            ConsoleRecorder::new(Arc::clone(input)).with_seconds_per_word(SECONDS_PER_WORD),
        ),
        transcriber: Box::new(ConsoleTranscriber::new(Arc::clone(input))),
    }
}

/// Response collaborators with an empty store, no web search and a
/// listener on `input`.
pub(crate) fn console_response(
    config: &HarkConfig,
    input: &Arc<ConsoleInput>,
    sink: RecordingSink,
) -> ResponseCollaborators {
    let rate = config.audio.output_sample_rate;
    ResponseCollaborators {
        retrieval: Box::new(LexicalStore::new()),
        search: None,
        llm: Box::new(OpenAiClient::new(&config.llm).expect("llm client")),
        synthesizer: Box::new(ConsoleSynthesizer::new("hark", rate)),
        notifier: Box::new(ConsoleSynthesizer::new("hark (searching)", rate)),
        sink: Box::new(sink),
        listener: Box::new(ConsoleWake::new(Arc::clone(input))),
    }
}

// ── audio sink ──

/// How one playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ending {
    Finished,
    Stopped,
}

#[derive(Debug, Default)]
struct SinkLog {
    current: usize,
    playbacks: Vec<(usize, Ending)>,
}

/// Sink that records samples per playback. A paced sink blocks for each
/// chunk's real duration.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingSink {
    log: Arc<Mutex<SinkLog>>,
    pace_rate: Option<u32>,
}

impl RecordingSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn paced(sample_rate: u32) -> Self {
        Self {
            pace_rate: Some(sample_rate),
            ..Self::default()
        }
    }

    /// Samples written and how each completed playback ended.
    pub(crate) fn playbacks(&self) -> Vec<(usize, Ending)> {
        self.log.lock().unwrap().playbacks.clone()
    }

    fn end(&self, ending: Ending) {
        let mut log = self.log.lock().unwrap();
        let samples = std::mem::take(&mut log.current);
        log.playbacks.push((samples, ending));
    }
}

impl AudioSink for RecordingSink {
    fn write(&mut self, chunk: &[f32]) -> hark::Result<()> {
        if let Some(rate) = self.pace_rate {
            std::thread::sleep(Duration::from_secs_f64(
                chunk.len() as f64 / f64::from(rate),
            ));
        }
        self.log.lock().unwrap().current += chunk.len();
        Ok(())
    }

    fn finish(&mut self) -> hark::Result<()> {
        self.end(Ending::Finished);
        Ok(())
    }

    fn stop(&mut self) {
        self.end(Ending::Stopped);
    }
}

// ── status ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StatusEvent {
    Show(String),
    Clear,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingStatus {
    events: Arc<Mutex<Vec<StatusEvent>>>,
}

impl RecordingStatus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl StatusSink for RecordingStatus {
    fn show(&self, text: &str) -> hark::Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(StatusEvent::Show(text.to_owned()));
        Ok(())
    }

    fn clear(&self) -> hark::Result<()> {
        self.events.lock().unwrap().push(StatusEvent::Clear);
        Ok(())
    }
}

// ── waiting ──

/// Poll `cond` until it holds or `timeout` passes.
pub(crate) fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
