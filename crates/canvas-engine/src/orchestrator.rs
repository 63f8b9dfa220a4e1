use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use canvas_contracts::events::{now_utc_iso, EventPayload, EventWriter};
use canvas_contracts::history::{HistoryEntry, HistoryLedger};
use canvas_contracts::runs::{
    GenerationRun, ImageMetadata, ImageParams, ImageRequestItem, ItemStatus, RunStatus,
};
use canvas_contracts::settings::{random_seed, Settings};
use chrono::Utc;
use serde_json::{json, Value};
use url::Url;

use crate::cancel::CancelToken;
use crate::error::{GenerationError, ItemLoadError};
use crate::providers::{ImageSource, PollinationsClient, PromptEnhancer};
use crate::request::build_image_url_with_base;
use crate::retry::{RetryOutcome, RetryPolicy};

pub const BATCH_SIZE: usize = 4;

/// Progress while items are still settling stays below this; only a
/// completed run reports 100.
const MAX_IN_FLIGHT_PROGRESS: f64 = 99.0;

pub trait SeedSource: Send + Sync {
    fn next_seed(&self) -> i64;
}

/// Uniform seeds in `[0, 1_000_000)`. Repeats within a batch are allowed.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSeeds;

impl SeedSource for RandomSeeds {
    fn next_seed(&self) -> i64 {
        random_seed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    pub index: usize,
    pub url: String,
    pub metadata: ImageMetadata,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: u64,
    pub prompt: String,
    pub enhanced_prompt: Option<String>,
    pub images: Vec<LoadedImage>,
    pub failed: Vec<ItemLoadError>,
    pub elapsed_seconds: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub run: GenerationRun,
    pub items: Vec<ImageRequestItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorEvent {
    StateChanged(SessionSnapshot),
    Notice(Notice),
}

struct SessionState {
    last_run_id: u64,
    run: GenerationRun,
    items: Vec<ImageRequestItem>,
    history: HistoryLedger,
    last_prompt: Option<String>,
    cancel: CancelToken,
    subscribers: Vec<Sender<OrchestratorEvent>>,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            run: self.run.clone(),
            items: self.items.clone(),
        }
    }

    fn broadcast(&mut self, event: OrchestratorEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    fn publish(&mut self) {
        let snapshot = self.snapshot();
        self.broadcast(OrchestratorEvent::StateChanged(snapshot));
    }

    fn notice(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.broadcast(OrchestratorEvent::Notice(Notice {
            level,
            message: message.into(),
        }));
    }

    fn is_active(&self, run_id: u64) -> bool {
        self.run.run_id == run_id
    }
}

/// Owns the generation state machine and the session state shown to the user.
///
/// Each run gets an id when it starts. Work from an older run checks its id
/// before touching shared state and is dropped once a newer run has begun;
/// starting a run also cancels the older run's pending retry delays.
pub struct Orchestrator {
    images: Arc<dyn ImageSource>,
    enhancer: Option<Arc<dyn PromptEnhancer>>,
    seeds: Arc<dyn SeedSource>,
    image_base: Url,
    retry: RetryPolicy,
    batch_size: usize,
    events: EventWriter,
    state: Mutex<SessionState>,
}

impl Orchestrator {
    pub fn new(images: Arc<dyn ImageSource>, image_base: Url) -> Self {
        Self {
            images,
            enhancer: None,
            seeds: Arc::new(RandomSeeds),
            image_base,
            retry: RetryPolicy::default(),
            batch_size: BATCH_SIZE,
            events: EventWriter::disabled(),
            state: Mutex::new(SessionState {
                last_run_id: 0,
                run: GenerationRun::idle(),
                items: Vec::new(),
                history: HistoryLedger::new(),
                last_prompt: None,
                cancel: CancelToken::new(),
                subscribers: Vec::new(),
            }),
        }
    }

    /// Wires every collaborator to one hosted client.
    pub fn from_client(client: PollinationsClient, enhance_prompts: bool) -> Self {
        let image_base = client.config().image_base.clone();
        let client = Arc::new(client);
        let orchestrator = Self::new(client.clone(), image_base);
        if enhance_prompts {
            orchestrator.with_enhancer(client)
        } else {
            orchestrator
        }
    }

    pub fn with_enhancer(mut self, enhancer: Arc<dyn PromptEnhancer>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    pub fn with_seed_source(mut self, seeds: Arc<dyn SeedSource>) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = events;
        self
    }

    pub fn enhances_prompts(&self) -> bool {
        self.enhancer.is_some()
    }

    pub fn subscribe(&self) -> Receiver<OrchestratorEvent> {
        let (tx, rx) = mpsc::channel();
        self.lock_state().subscribers.push(tx);
        rx
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock_state().snapshot()
    }

    pub fn history(&self) -> HistoryLedger {
        self.lock_state().history.clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.lock_state().last_prompt.clone()
    }

    /// Runs the last submitted prompt again with fresh seeds.
    pub fn regenerate(&self, settings: &Settings) -> Result<RunReport, GenerationError> {
        let prompt = self.last_prompt().unwrap_or_default();
        self.run_generation(&prompt, settings)
    }

    pub fn run_generation(
        &self,
        prompt_text: &str,
        settings: &Settings,
    ) -> Result<RunReport, GenerationError> {
        if prompt_text.trim().is_empty() {
            self.lock_state()
                .notice(NoticeLevel::Error, GenerationError::EmptyPrompt.to_string());
            self.emit("validation_rejected", json!({ "reason": "empty_prompt" }));
            return Err(GenerationError::EmptyPrompt);
        }

        let settings = settings.clone();
        let (run_id, cancel) = self.begin_run(prompt_text);
        self.emit(
            "run_started",
            json!({
                "run_id": run_id,
                "prompt": prompt_text,
                "settings": settings,
                "enhance_prompt": self.enhancer.is_some(),
            }),
        );

        let enhanced_prompt = match &self.enhancer {
            Some(enhancer) => match enhancer.enhance(prompt_text) {
                Ok(text) => {
                    if !self.is_active(run_id) {
                        return Err(self.superseded(run_id, "enhancement"));
                    }
                    self.emit(
                        "prompt_enhanced",
                        json!({ "run_id": run_id, "enhanced_prompt": text }),
                    );
                    Some(text)
                }
                Err(err) => {
                    let message = format!("{err:#}");
                    self.emit(
                        "enhancement_failed",
                        json!({ "run_id": run_id, "error": message }),
                    );
                    return Err(self.fail_run(run_id, GenerationError::Enhancement(message)));
                }
            },
            None => None,
        };
        let url_prompt = enhanced_prompt.as_deref().unwrap_or(prompt_text);

        let mut urls = Vec::with_capacity(self.batch_size);
        let mut items = Vec::with_capacity(self.batch_size);
        for _ in 0..self.batch_size {
            let seed = self.seeds.next_seed();
            let url = build_image_url_with_base(&self.image_base, url_prompt, seed, &settings);
            items.push(ImageRequestItem::new(
                url.as_str(),
                ImageMetadata {
                    seed,
                    params: ImageParams::from(&settings),
                    timestamp: now_utc_iso(),
                },
            ));
            urls.push(url);
        }

        {
            let mut state = self.lock_state();
            if !state.is_active(run_id) {
                drop(state);
                return Err(self.superseded(run_id, "batch"));
            }
            state.items = items.clone();
            state.run.status = RunStatus::Generating;
            state.publish();
        }
        self.emit(
            "batch_published",
            json!({
                "run_id": run_id,
                "urls": urls.iter().map(Url::as_str).collect::<Vec<_>>(),
                "seeds": items.iter().map(ImageRequestItem::seed).collect::<Vec<_>>(),
            }),
        );

        let outcomes: Vec<Result<LoadedImage, ItemLoadError>> = thread::scope(|scope| {
            let handles: Vec<_> = items
                .iter()
                .zip(urls.iter())
                .enumerate()
                .map(|(index, (item, url))| {
                    let cancel = cancel.clone();
                    scope.spawn(move || self.load_item(run_id, index, item, url, &cancel))
                })
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(index, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        self.settle_item(run_id, index, ItemStatus::Failed);
                        Err(ItemLoadError {
                            index,
                            attempts: 0,
                            message: "image worker panicked".to_string(),
                        })
                    })
                })
                .collect()
        });

        let mut loaded = Vec::new();
        let mut failed = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(image) => loaded.push(image),
                Err(err) => failed.push(err),
            }
        }

        if loaded.is_empty() {
            return Err(self.fail_run(run_id, GenerationError::AllItemsFailed));
        }
        self.complete_run(run_id, prompt_text, enhanced_prompt, loaded, failed)
    }

    fn begin_run(&self, prompt_text: &str) -> (u64, CancelToken) {
        let mut state = self.lock_state();
        state.cancel.cancel();
        let previous = state.run.run_id;
        let previous_in_flight = matches!(
            state.run.status,
            RunStatus::Starting | RunStatus::Generating
        );

        state.last_run_id += 1;
        let run_id = state.last_run_id;
        let cancel = CancelToken::new();
        state.cancel = cancel.clone();
        state.run = GenerationRun::starting(run_id, Utc::now());
        state.items.clear();
        state.last_prompt = Some(prompt_text.to_string());
        state.publish();
        drop(state);

        if previous_in_flight {
            self.emit(
                "run_superseded",
                json!({ "run_id": previous, "superseded_by": run_id }),
            );
        }
        (run_id, cancel)
    }

    fn load_item(
        &self,
        run_id: u64,
        index: usize,
        item: &ImageRequestItem,
        url: &Url,
        cancel: &CancelToken,
    ) -> Result<LoadedImage, ItemLoadError> {
        let outcome = self.retry.run(
            cancel,
            |_| self.images.fetch_image(url),
            |attempt, err| {
                self.emit(
                    "item_retry",
                    json!({
                        "run_id": run_id,
                        "index": index,
                        "attempt": attempt,
                        "error": format!("{err:#}"),
                    }),
                );
            },
        );

        match outcome {
            RetryOutcome::Succeeded { value, attempts } => {
                if self.settle_item(run_id, index, ItemStatus::Loaded) {
                    self.emit(
                        "item_loaded",
                        json!({
                            "run_id": run_id,
                            "index": index,
                            "attempts": attempts,
                            "width": value.width,
                            "height": value.height,
                            "bytes": value.bytes.len(),
                        }),
                    );
                }
                Ok(LoadedImage {
                    index,
                    url: item.url().to_string(),
                    metadata: item.metadata().clone(),
                    width: value.width,
                    height: value.height,
                    bytes: value.bytes,
                })
            }
            RetryOutcome::Exhausted { error, attempts } => {
                let err = ItemLoadError {
                    index,
                    attempts,
                    message: format!("{error:#}"),
                };
                if self.settle_item(run_id, index, ItemStatus::Failed) {
                    self.emit(
                        "item_failed",
                        json!({
                            "run_id": run_id,
                            "index": index,
                            "attempts": attempts,
                            "error": err.message,
                        }),
                    );
                }
                Err(err)
            }
            RetryOutcome::Cancelled { attempts } => Err(ItemLoadError {
                index,
                attempts,
                message: "cancelled by a newer run".to_string(),
            }),
        }
    }

    /// Applies one item's terminal status and recomputes progress in a single
    /// critical section. Returns `false` when the update belongs to a stale run.
    fn settle_item(&self, run_id: u64, index: usize, status: ItemStatus) -> bool {
        let mut state = self.lock_state();
        if !state.is_active(run_id) {
            drop(state);
            self.emit(
                "update_discarded",
                json!({ "run_id": run_id, "index": index, "status": status.as_str() }),
            );
            return false;
        }
        let Some(item) = state.items.get_mut(index) else {
            return false;
        };
        if !item.settle(status) {
            return false;
        }
        let total = state.items.len().max(1);
        let settled = state
            .items
            .iter()
            .filter(|item| item.status().is_terminal())
            .count();
        let percent = (settled as f64 / total as f64) * 100.0;
        state
            .run
            .advance_progress(percent.min(MAX_IN_FLIGHT_PROGRESS));
        state.publish();
        true
    }

    fn complete_run(
        &self,
        run_id: u64,
        prompt_text: &str,
        enhanced_prompt: Option<String>,
        images: Vec<LoadedImage>,
        failed: Vec<ItemLoadError>,
    ) -> Result<RunReport, GenerationError> {
        let mut state = self.lock_state();
        if !state.is_active(run_id) {
            drop(state);
            return Err(self.superseded(run_id, "completion"));
        }
        state.run.complete(Utc::now());
        let elapsed_seconds = state.run.elapsed_seconds().unwrap_or_default();
        state.history.append(HistoryEntry {
            prompt: prompt_text.to_string(),
            images: images.iter().map(|image| image.url.clone()).collect(),
            metadata: images.iter().map(|image| image.metadata.clone()).collect(),
        });
        state.publish();
        state.notice(
            NoticeLevel::Success,
            format!("Generated {} images in {:.1}s", images.len(), elapsed_seconds),
        );
        drop(state);

        self.emit(
            "run_completed",
            json!({
                "run_id": run_id,
                "loaded": images.len(),
                "failed": failed.len(),
                "elapsed_s": elapsed_seconds,
            }),
        );
        Ok(RunReport {
            run_id,
            prompt: prompt_text.to_string(),
            enhanced_prompt,
            images,
            failed,
            elapsed_seconds,
        })
    }

    fn fail_run(&self, run_id: u64, err: GenerationError) -> GenerationError {
        let mut state = self.lock_state();
        if !state.is_active(run_id) {
            drop(state);
            return self.superseded(run_id, "failure");
        }
        let message = err.to_string();
        state.run.fail(Utc::now(), message.clone());
        state.publish();
        state.notice(NoticeLevel::Error, format!("Generation failed: {message}"));
        drop(state);

        self.emit(
            "run_failed",
            json!({ "run_id": run_id, "kind": err.kind(), "error": message }),
        );
        err
    }

    fn superseded(&self, run_id: u64, stage: &str) -> GenerationError {
        self.emit(
            "update_discarded",
            json!({ "run_id": run_id, "stage": stage }),
        );
        GenerationError::Superseded { run_id }
    }

    fn is_active(&self, run_id: u64) -> bool {
        self.lock_state().is_active(run_id)
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event_type: &str, payload: Value) {
        // The event log is best-effort; a full disk must not fail a run.
        let payload: EventPayload = payload.as_object().cloned().unwrap_or_default();
        let _ = self.events.emit(event_type, payload);
    }
}
