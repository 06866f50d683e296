//! Scripted collaborators shared by the unit tests.
//!
//! Every fake is `Clone` over shared state so a test can hand one copy to a
//! worker and keep another to inspect what happened.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::collaborators::{
    AudioSink, CommandRecorder, Document, Generation, GenerationRequest, LlmClient,
    RecordedCommand, RetrievalStore, RetrievedChunk, SearchClient, SearchDecision, StatusSink,
    SynthesizedAudio, Synthesizer, Transcriber, WakeWordEngine,
};
use crate::error::{HarkError, Result};
use crate::pipeline::interrupt::{InterruptCounter, PlaybackActive};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const POLL: Duration = Duration::from_millis(2);

/// `seconds` of silence at 16 kHz.
pub fn recording(seconds: f64) -> RecordedCommand {
    RecordedCommand {
        samples: vec![0; (seconds * 16_000.0) as usize],
        sample_rate: 16_000,
    }
}

pub fn chunk(content: &str, score: f32) -> RetrievedChunk {
    RetrievedChunk {
        content: content.to_owned(),
        source: "test".to_owned(),
        score,
    }
}

// ── wake word ──

/// One scripted `detect` call.
#[derive(Debug, Clone)]
pub enum WakeStep {
    /// Detected immediately.
    Hear,
    /// Detected after a delay unless aborted first.
    After(Duration),
    /// Detected `delay` after playback becomes active.
    WhilePlaying(PlaybackActive, Duration),
    /// Engine failure.
    Fail,
}

/// Wake word engine following a script; waits for the abort predicate once
/// the script runs out.
#[derive(Debug, Clone, Default)]
pub struct ScriptedWake {
    steps: Arc<Mutex<VecDeque<WakeStep>>>,
    calls: Arc<Mutex<usize>>,
}

impl ScriptedWake {
    pub fn script(steps: Vec<WakeStep>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into())),
            calls: Arc::default(),
        }
    }

    pub fn never() -> Self {
        Self::default()
    }

    pub fn after(delay: Duration) -> Self {
        Self::script(vec![WakeStep::After(delay)])
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

fn wait_until(abort: &dyn Fn() -> bool, mut ready: impl FnMut() -> bool) -> bool {
    loop {
        if ready() {
            return true;
        }
        if abort() {
            return false;
        }
        std::thread::sleep(POLL);
    }
}

impl WakeWordEngine for ScriptedWake {
    fn detect(&mut self, abort: &dyn Fn() -> bool) -> Result<bool> {
        *self.calls.lock().unwrap() += 1;
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(WakeStep::Hear) => Ok(true),
            Some(WakeStep::After(delay)) => {
                let start = Instant::now();
                Ok(wait_until(abort, || start.elapsed() >= delay))
            }
            Some(WakeStep::WhilePlaying(playback, delay)) => {
                if !wait_until(abort, || playback.is_active()) {
                    return Ok(false);
                }
                let start = Instant::now();
                Ok(wait_until(abort, || start.elapsed() >= delay))
            }
            Some(WakeStep::Fail) => Err(HarkError::WakeWord("scripted failure".into())),
            None => Ok(wait_until(abort, || false)),
        }
    }
}

// ── recorder / transcriber ──

#[derive(Debug, Clone, Default)]
pub struct ScriptedRecorder {
    takes: Arc<Mutex<VecDeque<Result<RecordedCommand>>>>,
}

impl ScriptedRecorder {
    pub fn script(takes: Vec<Result<RecordedCommand>>) -> Self {
        Self {
            takes: Arc::new(Mutex::new(takes.into())),
        }
    }

    pub fn push(&self, take: RecordedCommand) {
        self.takes.lock().unwrap().push_back(Ok(take));
    }
}

impl CommandRecorder for ScriptedRecorder {
    fn record(&mut self, _silence_threshold: Duration) -> Result<RecordedCommand> {
        let take = self.takes.lock().unwrap().pop_front();
        take.unwrap_or_else(|| {
            // Nothing scripted: behave like a quiet room.
            std::thread::sleep(POLL);
            Ok(RecordedCommand::default())
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedTranscriber {
    texts: Arc<Mutex<VecDeque<Result<String>>>>,
    fail_warm_up: bool,
}

impl ScriptedTranscriber {
    pub fn script(texts: Vec<Result<String>>) -> Self {
        Self {
            texts: Arc::new(Mutex::new(texts.into())),
            fail_warm_up: false,
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::script(texts.iter().map(|t| Ok((*t).to_owned())).collect())
    }

    pub fn failing_warm_up() -> Self {
        Self {
            fail_warm_up: true,
            ..Self::default()
        }
    }

    pub fn push(&self, text: &str) {
        self.texts.lock().unwrap().push_back(Ok(text.to_owned()));
    }
}

impl Transcriber for ScriptedTranscriber {
    fn warm_up(&mut self) -> Result<()> {
        if self.fail_warm_up {
            return Err(HarkError::Stt("model missing".into()));
        }
        Ok(())
    }

    fn transcribe(&mut self, _command: &RecordedCommand) -> Result<String> {
        self.texts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

// ── retrieval / search ──

#[derive(Debug, Default)]
pub struct RetrievalLog {
    pub scripted: VecDeque<Vec<RetrievedChunk>>,
    pub added: Vec<Document>,
    pub queries: Vec<String>,
    /// Counter to bump on the next query, simulating a barge-in during lookup.
    pub barge_in_on_query: Option<InterruptCounter>,
}

/// Returns scripted hits first, then every added document at score 0.8.
#[derive(Debug, Clone, Default)]
pub struct FakeRetrieval {
    pub log: Arc<Mutex<RetrievalLog>>,
}

impl FakeRetrieval {
    pub fn with_hits(hits: Vec<Vec<RetrievedChunk>>) -> Self {
        let fake = Self::default();
        fake.log.lock().unwrap().scripted = hits.into();
        fake
    }

    pub fn queries(&self) -> Vec<String> {
        self.log.lock().unwrap().queries.clone()
    }

    pub fn added(&self) -> Vec<Document> {
        self.log.lock().unwrap().added.clone()
    }
}

impl RetrievalStore for FakeRetrieval {
    fn query(&mut self, text: &str) -> Result<Vec<RetrievedChunk>> {
        let mut log = self.log.lock().unwrap();
        log.queries.push(text.to_owned());
        if let Some(counter) = log.barge_in_on_query.take() {
            counter.increment();
        }
        if let Some(hits) = log.scripted.pop_front() {
            return Ok(hits);
        }
        Ok(log
            .added
            .iter()
            .map(|d| RetrievedChunk {
                content: d.content.clone(),
                source: d.source.clone(),
                score: 0.8,
            })
            .collect())
    }

    fn add_document(&mut self, document: Document) -> Result<()> {
        self.log.lock().unwrap().added.push(document);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeSearch {
    pub queries: Arc<Mutex<Vec<String>>>,
    pub pages: Vec<Document>,
    pub fail: bool,
}

impl FakeSearch {
    pub fn with_pages(pages: Vec<Document>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl SearchClient for FakeSearch {
    fn search(&mut self, query: &str) -> Result<Vec<String>> {
        if self.fail {
            return Err(HarkError::Search("offline".into()));
        }
        self.queries.lock().unwrap().push(query.to_owned());
        Ok(self.pages.iter().map(|p| p.source.clone()).collect())
    }

    fn fetch(&mut self, urls: &[String]) -> Result<Vec<Document>> {
        Ok(self
            .pages
            .iter()
            .filter(|p| urls.contains(&p.source))
            .cloned()
            .collect())
    }
}

// ── language model ──

#[derive(Debug, Default)]
pub struct LlmLog {
    pub decisions: VecDeque<SearchDecision>,
    pub answers: VecDeque<String>,
    pub classified: Vec<String>,
    pub requests: Vec<GenerationRequest>,
    /// Counter to bump on the next generate call, simulating a barge-in
    /// while tokens are streaming.
    pub barge_in_on_generate: Option<InterruptCounter>,
    pub fail_generate: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FakeLlm {
    pub log: Arc<Mutex<LlmLog>>,
}

impl FakeLlm {
    pub fn answering(answers: &[&str]) -> Self {
        let fake = Self::default();
        fake.log.lock().unwrap().answers = answers.iter().map(|a| (*a).to_owned()).collect();
        fake
    }

    pub fn deciding(self, decision: SearchDecision) -> Self {
        self.log.lock().unwrap().decisions.push_back(decision);
        self
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.log.lock().unwrap().requests.clone()
    }

    pub fn classified(&self) -> Vec<String> {
        self.log.lock().unwrap().classified.clone()
    }
}

impl LlmClient for FakeLlm {
    fn classify_search_need(
        &mut self,
        text: &str,
        interrupt: &InterruptCounter,
    ) -> Result<Option<SearchDecision>> {
        let mut log = self.log.lock().unwrap();
        log.classified.push(text.to_owned());
        if interrupt.is_interrupted() {
            return Ok(None);
        }
        Ok(Some(
            log.decisions
                .pop_front()
                .unwrap_or(SearchDecision::NotNeeded),
        ))
    }

    fn generate(
        &mut self,
        request: &GenerationRequest,
        interrupt: &InterruptCounter,
    ) -> Result<Generation> {
        let mut log = self.log.lock().unwrap();
        log.requests.push(request.clone());
        if let Some(counter) = log.barge_in_on_generate.take() {
            counter.increment();
        }
        if log.fail_generate {
            return Err(HarkError::Llm("connection reset".into()));
        }
        if interrupt.is_interrupted() {
            return Ok(Generation::Interrupted);
        }
        Ok(Generation::Complete(
            log.answers
                .pop_front()
                .unwrap_or_else(|| format!("answer to {}", request.text)),
        ))
    }
}

// ── synthesis / output ──

#[derive(Debug, Clone)]
pub struct FakeSynth {
    pub spoken: Arc<Mutex<Vec<String>>>,
    /// Length of every clip.
    pub clip: Duration,
    pub sample_rate: u32,
}

impl FakeSynth {
    pub fn new(clip: Duration) -> Self {
        Self {
            spoken: Arc::default(),
            clip,
            sample_rate: 1_000,
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

impl Default for FakeSynth {
    fn default() -> Self {
        Self::new(Duration::from_millis(200))
    }
}

impl Synthesizer for FakeSynth {
    fn synthesize(
        &mut self,
        text: &str,
        interrupt: &InterruptCounter,
    ) -> Result<Option<SynthesizedAudio>> {
        if interrupt.is_interrupted() {
            return Ok(None);
        }
        self.spoken.lock().unwrap().push(text.to_owned());
        let len = (self.clip.as_secs_f64() * f64::from(self.sample_rate)) as usize;
        Ok(Some(SynthesizedAudio {
            samples: vec![0.1; len],
            sample_rate: self.sample_rate,
        }))
    }
}

#[derive(Debug, Default)]
struct SinkLog {
    chunks: usize,
    samples: usize,
    finished: bool,
    stopped: bool,
    saw_active: bool,
}

/// Audio sink that records writes, optionally sleeping per chunk.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    log: Arc<Mutex<SinkLog>>,
    pace: Option<Duration>,
    observe: Option<PlaybackActive>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paced(pace: Duration) -> Self {
        Self {
            pace: Some(pace),
            ..Self::default()
        }
    }

    pub fn observing(playback: PlaybackActive) -> Self {
        Self {
            observe: Some(playback),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn chunks_written(&self) -> usize {
        self.log.lock().unwrap().chunks
    }

    pub fn written_samples(&self) -> usize {
        self.log.lock().unwrap().samples
    }

    pub fn finished(&self) -> bool {
        self.log.lock().unwrap().finished
    }

    pub fn stopped(&self) -> bool {
        self.log.lock().unwrap().stopped
    }

    pub fn saw_playback_active(&self) -> bool {
        self.log.lock().unwrap().saw_active
    }
}

impl AudioSink for RecordingSink {
    fn write(&mut self, chunk: &[f32]) -> Result<()> {
        if self.fail {
            return Err(HarkError::Playback("device unplugged".into()));
        }
        if let Some(pace) = self.pace {
            std::thread::sleep(pace);
        }
        let mut log = self.log.lock().unwrap();
        log.chunks += 1;
        log.samples += chunk.len();
        if self.observe.as_ref().is_some_and(PlaybackActive::is_active) {
            log.saw_active = true;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.log.lock().unwrap().finished = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.log.lock().unwrap().stopped = true;
    }
}

// ── status ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    Show(String),
    Clear,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingStatus {
    events: Arc<Mutex<Vec<StatusEvent>>>,
}

impl RecordingStatus {
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl StatusSink for RecordingStatus {
    fn show(&self, text: &str) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(StatusEvent::Show(text.to_owned()));
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.events.lock().unwrap().push(StatusEvent::Clear);
        Ok(())
    }
}
