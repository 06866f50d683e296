//! Response decision pipeline.
//!
//! One round per START marker:
//!
//! ```text
//! debounce → filter → continuation → pre-flight → goodbye?
//!   → retrieval → (classify → notify ∥ search → ingest → re-query)
//!   → generate → synthesize → barge-in playback
//! ```
//!
//! followed by FINISH reconciliation. Any stage that sees a positive
//! interrupt counter ends the round early and records the utterance in the
//! [`InterruptContext`] for the next prompt.

use super::Shared;
use super::barge_in::{BargeInPlayer, PlaybackOutcome};
use super::context::InterruptContext;
use super::filter::{Debouncer, MeaningfulnessFilter};
use super::interrupt::{InterruptCounter, PlaybackActive};
use super::messages::WorkItem;
use super::prompt::PromptTemplate;
use super::queue::Reconciliation;
use crate::audio::wav::WavDumper;
use crate::collaborators::{
    AudioSink, Generation, GenerationRequest, LlmClient, RetrievalStore, RetrievedChunk,
    SearchClient, SearchDecision, Synthesizer, WakeWordEngine,
};
use crate::config::{HarkConfig, ResponseConfig};
use crate::error::Result;
use rand::seq::SliceRandom;
use std::ops::ControlFlow;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const FALLBACK_GOODBYE: &str = "Goodbye!";

/// The response worker's collaborators.
pub struct ResponseCollaborators {
    pub retrieval: Box<dyn RetrievalStore>,
    /// `None` disables the search fallback regardless of configuration.
    pub search: Option<Box<dyn SearchClient>>,
    pub llm: Box<dyn LlmClient>,
    pub synthesizer: Box<dyn Synthesizer>,
    /// Voices the search notification while the search runs.
    pub notifier: Box<dyn Synthesizer>,
    pub sink: Box<dyn AudioSink>,
    /// Listens for the wake phrase during playback.
    pub listener: Box<dyn WakeWordEngine>,
}

/// Pipeline stage at which a round noticed an interruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PreFlight,
    Retrieval,
    Classify,
    Search,
    Generate,
    Synthesize,
    Playback,
}

/// Why a round produced no speech without being interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Duplicate,
    NotMeaningful,
    EmptyAnswer,
}

/// How one START was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// The answer was played to the end.
    Spoken,
    Skipped(SkipReason),
    Interrupted(Stage),
    /// A collaborator failed; the round was abandoned.
    Failed,
}

impl RoundOutcome {
    pub fn is_interrupted(self) -> bool {
        matches!(self, Self::Interrupted(_))
    }
}

type Flow<T> = ControlFlow<Stage, T>;

/// Consumes [`WorkItem`]s and speaks the answers.
pub struct ResponseWorker {
    config: ResponseConfig,
    goodbye_responses: Vec<String>,
    parts: ResponseCollaborators,
    shared: Shared,
    debouncer: Debouncer,
    filter: MeaningfulnessFilter,
    interrupts: InterruptContext,
    player: BargeInPlayer,
    template: PromptTemplate,
    dumps: Option<WavDumper>,
    /// Round whose FINISH was not drained in time, with its interrupted flag.
    unreconciled: Option<(Uuid, bool)>,
}

impl ResponseWorker {
    /// # Errors
    ///
    /// Returns an error if a filter pattern does not compile.
    pub fn new(config: &HarkConfig, parts: ResponseCollaborators, shared: Shared) -> Result<Self> {
        Ok(Self {
            config: config.response.clone(),
            goodbye_responses: config.conversation.goodbye_responses.clone(),
            parts,
            shared,
            debouncer: Debouncer::new(config.response.debounce_window()),
            filter: MeaningfulnessFilter::new(&config.filter)?,
            interrupts: InterruptContext::new(config.response.max_interrupt_context),
            player: BargeInPlayer::new(config.playback.chunk_ms),
            template: PromptTemplate::V1,
            dumps: None,
            unreconciled: None,
        })
    }

    /// Save every spoken answer in the dumper's directory as
    /// `response-<timestamp>-<id>.wav`.
    pub fn with_dumps(mut self, dumps: WavDumper) -> Self {
        self.dumps = Some(dumps);
        self
    }

    pub fn interrupt_context(&self) -> &InterruptContext {
        &self.interrupts
    }

    /// Load models before the readiness rendezvous.
    ///
    /// # Errors
    ///
    /// Returns the first collaborator initialisation error.
    pub fn warm_up(&mut self) -> Result<()> {
        self.parts.llm.warm_up()?;
        self.parts.synthesizer.warm_up()?;
        self.parts.notifier.warm_up()
    }

    /// Process rounds until `cancel` fires.
    pub fn run(mut self, cancel: &CancellationToken) {
        info!("response worker running");
        while !cancel.is_cancelled() {
            match self.process_next(cancel) {
                Some(outcome) => debug!(?outcome, "response round done"),
                None => break,
            }
        }
        info!("response worker stopped");
    }

    /// Handle the next START and reconcile its FINISH. Stray FINISH markers
    /// met on the way are settled. Returns `None` once `cancel` has fired
    /// and the queue is empty.
    pub fn process_next(&mut self, cancel: &CancellationToken) -> Option<RoundOutcome> {
        loop {
            let item = self.shared.queue.pop(cancel)?;
            if item.is_finish() {
                self.settle_orphan(&item);
                continue;
            }
            let outcome = self.handle_round(&item);
            self.finish_round(&item, outcome);
            return Some(outcome);
        }
    }

    fn handle_round(&mut self, start: &WorkItem) -> RoundOutcome {
        let outcome = match self.respond(start) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(text = %start.text, "response round failed: {e}");
                RoundOutcome::Failed
            }
        };
        if let RoundOutcome::Interrupted(stage) = outcome {
            warn!(?stage, text = %start.text, "response interrupted");
            self.interrupts.push(&start.text);
        }
        outcome
    }

    fn finish_round(&mut self, start: &WorkItem, outcome: RoundOutcome) {
        self.shared.clear_status();
        let interrupted = outcome.is_interrupted();
        if !interrupted {
            self.interrupts.clear();
        }

        let reconciliation = self.shared.queue.reconcile(
            start,
            interrupted,
            &self.shared.interrupt,
            self.config.finish_timeout(),
        );
        match reconciliation {
            Reconciliation::Reconciled { interrupted } => {
                debug!(interrupted, count = self.shared.interrupt.get(), "round reconciled");
            }
            Reconciliation::Mismatched(next) => {
                warn!(
                    expected = %start.text,
                    found = %next.text,
                    marker = ?next.marker,
                    "queue out of sync, item returned to queue"
                );
                self.unreconciled = Some((start.round_id, interrupted));
            }
            Reconciliation::TimedOut => {
                error!(text = %start.text, "FINISH marker did not arrive in time");
                self.unreconciled = Some((start.round_id, interrupted));
            }
        }
    }

    fn settle_orphan(&mut self, finish: &WorkItem) {
        let interrupted = match self.unreconciled {
            Some((round_id, interrupted)) if round_id == finish.round_id => {
                self.unreconciled = None;
                info!(text = %finish.text, "late FINISH reconciled");
                interrupted
            }
            _ => {
                warn!(text = %finish.text, "FINISH without a matching START");
                false
            }
        };
        self.shared.queue.settle(interrupted, &self.shared.interrupt);
    }

    fn respond(&mut self, start: &WorkItem) -> Result<RoundOutcome> {
        let text = start.text.as_str();
        let now = self.shared.clock.now();

        if self.debouncer.is_duplicate(text, start.continuation, now) {
            info!(text, "duplicate command skipped");
            return Ok(RoundOutcome::Skipped(SkipReason::Duplicate));
        }
        if !start.continuation && !start.is_goodbye && !self.filter.is_meaningful(text) {
            info!(text, "command not meaningful, skipped");
            return Ok(RoundOutcome::Skipped(SkipReason::NotMeaningful));
        }
        if start.continuation {
            if let Some(superseded) = self.interrupts.pop_latest() {
                debug!(%superseded, "continuation replaces interrupted text");
            }
        }
        if self.shared.interrupt.is_interrupted() {
            return Ok(RoundOutcome::Interrupted(Stage::PreFlight));
        }

        let answer = if start.is_goodbye {
            self.goodbye_response()
        } else {
            let context = match self.gather_context(text)? {
                ControlFlow::Continue(context) => context,
                ControlFlow::Break(stage) => return Ok(RoundOutcome::Interrupted(stage)),
            };
            let request = GenerationRequest {
                text: text.to_owned(),
                turn: self.template.render(text, &self.interrupts, &context),
            };
            match self.parts.llm.generate(&request, &self.shared.interrupt)? {
                Generation::Complete(answer) => answer,
                Generation::Interrupted => return Ok(RoundOutcome::Interrupted(Stage::Generate)),
            }
        };

        if answer.trim().is_empty() {
            warn!(text, "model returned an empty answer");
            return Ok(RoundOutcome::Skipped(SkipReason::EmptyAnswer));
        }
        self.speak(start, &answer)
    }

    fn goodbye_response(&self) -> String {
        self.goodbye_responses
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| FALLBACK_GOODBYE.to_owned())
    }

    /// Retrieval, falling back to a web search when nothing relevant is
    /// stored.
    fn gather_context(&mut self, text: &str) -> Result<Flow<Vec<RetrievedChunk>>> {
        let hits = self.parts.retrieval.query(text)?;
        if self.shared.interrupt.is_interrupted() {
            return Ok(ControlFlow::Break(Stage::Retrieval));
        }
        let best = hits.iter().map(|h| h.score).fold(0.0_f32, f32::max);
        if best >= self.config.confidence_threshold {
            debug!(best, "answering from stored context");
            return Ok(ControlFlow::Continue(hits));
        }
        if !self.config.enable_websearch || self.parts.search.is_none() {
            return Ok(ControlFlow::Continue(Vec::new()));
        }

        let decision = self
            .parts
            .llm
            .classify_search_need(text, &self.shared.interrupt)?;
        match decision {
            None => Ok(ControlFlow::Break(Stage::Classify)),
            Some(SearchDecision::NotNeeded) => {
                debug!(best, "no search needed");
                Ok(ControlFlow::Continue(Vec::new()))
            }
            Some(SearchDecision::Search { topic }) => self.search_with_notice(text, &topic),
        }
    }

    /// Speak the notification on a helper thread while the search runs.
    /// The engine gets the full utterance; the store is re-queried by topic.
    fn search_with_notice(
        &mut self,
        text: &str,
        topic: &str,
    ) -> Result<Flow<Vec<RetrievedChunk>>> {
        info!(topic, "searching the web");
        let notice = self.config.search_notification.replace("{topic}", topic);
        let ResponseCollaborators {
            retrieval,
            search,
            notifier,
            sink,
            ..
        } = &mut self.parts;
        let Some(search) = search.as_mut() else {
            return Ok(ControlFlow::Continue(Vec::new()));
        };
        let player = self.player;
        let playback = &self.shared.playback;
        let interrupt = &self.shared.interrupt;

        std::thread::scope(|scope| {
            let notify = scope.spawn(move || {
                speak_notice(&notice, notifier.as_mut(), sink.as_mut(), player, playback, interrupt);
            });
            let result = search_and_ingest(search.as_mut(), retrieval.as_mut(), text, topic, interrupt);
            if notify.join().is_err() {
                warn!("search notification thread panicked");
            }
            result
        })
    }

    fn speak(&mut self, start: &WorkItem, answer: &str) -> Result<RoundOutcome> {
        let Some(audio) = self
            .parts
            .synthesizer
            .synthesize(answer, &self.shared.interrupt)?
        else {
            return Ok(RoundOutcome::Interrupted(Stage::Synthesize));
        };
        if let Some(dumps) = &self.dumps {
            dumps.write_response(&audio);
        }

        self.shared.show_status(answer);
        let latency = self
            .shared
            .clock
            .now()
            .saturating_duration_since(start.start_time);
        info!(latency_ms = latency.as_millis() as u64, answer, "speaking");

        let outcome = self.player.play(
            &audio,
            self.parts.sink.as_mut(),
            self.parts.listener.as_mut(),
            &self.shared.playback,
            &self.shared.interrupt,
        )?;
        Ok(match outcome {
            PlaybackOutcome::Completed => RoundOutcome::Spoken,
            PlaybackOutcome::Interrupted => RoundOutcome::Interrupted(Stage::Playback),
        })
    }
}

fn speak_notice(
    notice: &str,
    notifier: &mut dyn Synthesizer,
    sink: &mut dyn AudioSink,
    player: BargeInPlayer,
    playback: &PlaybackActive,
    interrupt: &InterruptCounter,
) {
    let audio = match notifier.synthesize(notice, interrupt) {
        Ok(Some(audio)) => audio,
        Ok(None) => return,
        Err(e) => {
            warn!("search notification synthesis failed: {e}");
            return;
        }
    };
    if let Err(e) = player.play_unlistened(&audio, sink, playback, interrupt) {
        warn!("search notification playback failed: {e}");
    }
}

fn search_and_ingest(
    search: &mut dyn SearchClient,
    retrieval: &mut dyn RetrievalStore,
    query: &str,
    topic: &str,
    interrupt: &InterruptCounter,
) -> Result<Flow<Vec<RetrievedChunk>>> {
    let urls = search.search(query)?;
    if interrupt.is_interrupted() {
        return Ok(ControlFlow::Break(Stage::Search));
    }
    if urls.is_empty() {
        info!(query, "search returned no results");
        return Ok(ControlFlow::Continue(Vec::new()));
    }

    let pages = search.fetch(&urls)?;
    if interrupt.is_interrupted() {
        return Ok(ControlFlow::Break(Stage::Search));
    }
    debug!(fetched = pages.len(), of = urls.len(), "pages fetched");
    for page in pages {
        if interrupt.is_interrupted() {
            return Ok(ControlFlow::Break(Stage::Search));
        }
        retrieval.add_document(page)?;
    }
    let hits = retrieval.query(topic)?;
    if interrupt.is_interrupted() {
        return Ok(ControlFlow::Break(Stage::Search));
    }
    Ok(ControlFlow::Continue(hits))
}
