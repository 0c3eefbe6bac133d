use std::cell::RefCell;
use std::rc::Rc;

use futures::future::{AbortHandle, Abortable, Aborted};
use futures::StreamExt;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use mapspec_core::{PatchError, SpecDocument, Specification};
use mapspec_validate::issue::describe_issues;
use mapspec_validate::{to_specification_lossy, SchemaValidator, ValidationIssue};

use crate::record::{classify, LineSplitter, MetaRecord, StreamLine, Usage};
use crate::source::{GenerationRequest, RequestKind, TokenSource, TransportError};

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid base document: {0}")]
    InvalidBase(#[from] PatchError),
}

/// Progress reported while a generation runs.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The working document after a patch was applied.
    Snapshot(Value),
    Usage(Usage),
    /// An error reported in-band by the token source. Not terminal.
    Error { message: String },
    Narrative(String),
    /// Validation failed after auto-fix; a repair round-trip is starting.
    Repairing(Vec<ValidationIssue>),
    Finished(GenerationStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStatus {
    /// Valid after the stream (and auto-fix).
    Completed,
    /// Invalid after the stream, valid after the repair round-trip.
    Repaired,
    /// Still invalid after the one repair round-trip; rendered as-is.
    RepairExhausted,
    /// Stopped explicitly. Partial state is kept.
    Cancelled,
    /// Stopped because a newer request started. Partial state is kept.
    Superseded,
}

/// The result of one generation attempt.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub generation: Uuid,
    pub status: GenerationStatus,
    pub document: Value,
    /// Errors and warnings left in `document`.
    pub issues: Vec<ValidationIssue>,
    pub usage: Usage,
    pub patches_applied: usize,
    pub patches_rejected: usize,
}

impl GenerationOutcome {
    /// Typed specification keeping every entry that parses.
    pub fn specification(&self) -> Specification {
        to_specification_lossy(&self.document).0
    }

    pub fn is_valid(&self) -> bool {
        !self.issues.iter().any(ValidationIssue::is_error)
    }
}

struct ActiveGeneration {
    id: Uuid,
    abort: AbortHandle,
}

#[derive(Debug, Default)]
struct RunStats {
    usage: Usage,
    applied: usize,
    rejected: usize,
}

/// Builds specification snapshots from a patch stream.
///
/// Only one generation is live at a time: starting a new one aborts the
/// previous fetch, and [`PatchStreamBuilder::stop`] aborts the current one.
/// Partial state built before an abort is never rolled back.
pub struct PatchStreamBuilder {
    source: Rc<dyn TokenSource>,
    validator: Rc<dyn SchemaValidator>,
    active: RefCell<Option<ActiveGeneration>>,
}

impl PatchStreamBuilder {
    pub fn new(source: Rc<dyn TokenSource>, validator: Rc<dyn SchemaValidator>) -> Self {
        Self {
            source,
            validator,
            active: RefCell::new(None),
        }
    }

    /// Abort the in-flight generation, if any.
    pub fn stop(&self) -> bool {
        match self.active.borrow_mut().take() {
            Some(active) => {
                log::info!("Stopping generation {}", active.id);
                active.abort.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.borrow().is_some()
    }

    /// Run one generation on top of `base`, reporting progress to `sink`.
    ///
    /// Only a failure of the token source's transport is returned as an
    /// error; unparsable lines and rejected patches are dropped.
    pub async fn generate(
        &self,
        instruction: &str,
        base: Value,
        sink: &mut dyn FnMut(StreamEvent),
    ) -> Result<GenerationOutcome, StreamError> {
        let generation = Uuid::new_v4();
        let mut doc = SpecDocument::from_value(base)?;
        let mut stats = RunStats::default();
        log::info!("Starting generation {}", generation);

        let request = GenerationRequest {
            generation,
            instruction: instruction.to_string(),
            document: doc.snapshot(),
            kind: RequestKind::Initial,
        };
        if let Some(status) = self.run_request(request, &mut doc, &mut stats, sink).await? {
            return Ok(self.finish(generation, status, doc, Vec::new(), stats, sink));
        }

        self.validator.auto_fix(doc.as_value_mut());
        let issues = self.validator.validate(doc.as_value());
        if !issues.iter().any(ValidationIssue::is_error) {
            sink(StreamEvent::Snapshot(doc.snapshot()));
            return Ok(self.finish(generation, GenerationStatus::Completed, doc, issues, stats, sink));
        }

        log::info!(
            "Generation {} invalid after auto-fix ({} issue(s)), requesting one repair",
            generation,
            issues.len()
        );
        sink(StreamEvent::Repairing(issues.clone()));
        let request = GenerationRequest {
            generation,
            instruction: format!(
                "The map specification failed validation. Fix these errors with patches:\n{}",
                describe_issues(&issues)
            ),
            document: doc.snapshot(),
            kind: RequestKind::Repair { issues },
        };
        if let Some(status) = self.run_request(request, &mut doc, &mut stats, sink).await? {
            let issues = self.validator.validate(doc.as_value());
            return Ok(self.finish(generation, status, doc, issues, stats, sink));
        }

        self.validator.auto_fix(doc.as_value_mut());
        let issues = self.validator.validate(doc.as_value());
        let status = if issues.iter().any(ValidationIssue::is_error) {
            log::warn!("Generation {} still invalid after repair; rendering as-is", generation);
            GenerationStatus::RepairExhausted
        } else {
            GenerationStatus::Repaired
        };
        sink(StreamEvent::Snapshot(doc.snapshot()));
        Ok(self.finish(generation, status, doc, issues, stats, sink))
    }

    /// Stream one request into `doc`. Returns the stop status if aborted.
    async fn run_request(
        &self,
        request: GenerationRequest,
        doc: &mut SpecDocument,
        stats: &mut RunStats,
        sink: &mut dyn FnMut(StreamEvent),
    ) -> Result<Option<GenerationStatus>, StreamError> {
        let generation = request.generation;
        let (abort, registration) = AbortHandle::new_pair();
        let previous = self.active.borrow_mut().replace(ActiveGeneration {
            id: generation,
            abort,
        });
        if let Some(previous) = previous {
            if previous.id != generation {
                log::info!("Generation {} superseded by {}", previous.id, generation);
                previous.abort.abort();
            }
        }

        let consume = self.consume(request, doc, stats, sink);
        match Abortable::new(consume, registration).await {
            Ok(result) => {
                if result.is_err() {
                    self.clear_active(generation);
                }
                result.map(|()| None)
            }
            Err(Aborted) => {
                let mut active = self.active.borrow_mut();
                let superseded = active.as_ref().is_some_and(|a| a.id != generation);
                if !superseded {
                    *active = None;
                }
                Ok(Some(if superseded {
                    GenerationStatus::Superseded
                } else {
                    GenerationStatus::Cancelled
                }))
            }
        }
    }

    async fn consume(
        &self,
        request: GenerationRequest,
        doc: &mut SpecDocument,
        stats: &mut RunStats,
        sink: &mut dyn FnMut(StreamEvent),
    ) -> Result<(), StreamError> {
        let mut stream = self.source.open(&request);
        let mut splitter = LineSplitter::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for line in splitter.push(&chunk) {
                handle_line(&line, doc, stats, sink);
            }
        }
        if let Some(rest) = splitter.finish() {
            handle_line(&rest, doc, stats, sink);
        }
        Ok(())
    }

    fn clear_active(&self, generation: Uuid) {
        let mut active = self.active.borrow_mut();
        if active.as_ref().is_some_and(|a| a.id == generation) {
            *active = None;
        }
    }

    fn finish(
        &self,
        generation: Uuid,
        status: GenerationStatus,
        doc: SpecDocument,
        issues: Vec<ValidationIssue>,
        stats: RunStats,
        sink: &mut dyn FnMut(StreamEvent),
    ) -> GenerationOutcome {
        self.clear_active(generation);
        log::info!(
            "Generation {} finished: {:?}, {} patch(es) applied, {} rejected",
            generation,
            status,
            stats.applied,
            stats.rejected
        );
        sink(StreamEvent::Finished(status));
        GenerationOutcome {
            generation,
            status,
            document: doc.into_value(),
            issues,
            usage: stats.usage,
            patches_applied: stats.applied,
            patches_rejected: stats.rejected,
        }
    }
}

fn handle_line(line: &str, doc: &mut SpecDocument, stats: &mut RunStats, sink: &mut dyn FnMut(StreamEvent)) {
    match classify(line) {
        StreamLine::Blank | StreamLine::Comment | StreamLine::Fence => {}
        StreamLine::Meta(MetaRecord::Usage(usage)) => {
            stats.usage.add(usage);
            sink(StreamEvent::Usage(usage));
        }
        StreamLine::Meta(MetaRecord::Error { message }) => {
            log::warn!("Token source reported: {}", message);
            sink(StreamEvent::Error { message });
        }
        StreamLine::Patch(patch) => match doc.apply(&patch) {
            Ok(()) => {
                stats.applied += 1;
                sink(StreamEvent::Snapshot(doc.snapshot()));
            }
            Err(e) => {
                stats.rejected += 1;
                log::debug!("Discarding patch {}: {}", patch.path, e);
            }
        },
        StreamLine::Narrative(text) => sink(StreamEvent::Narrative(text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ScriptedSource;
    use futures::executor::{block_on, LocalPool};
    use futures::stream::{self, LocalBoxStream};
    use futures::task::LocalSpawnExt;
    use mapspec_validate::SpecValidator;
    use serde_json::json;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn builder(source: ScriptedSource) -> (PatchStreamBuilder, Rc<ScriptedSource>) {
        let source = Rc::new(source);
        let builder = PatchStreamBuilder::new(source.clone(), Rc::new(SpecValidator::new()));
        (builder, source)
    }

    fn run(builder: &PatchStreamBuilder, events: &mut Vec<StreamEvent>) -> Result<GenerationOutcome, StreamError> {
        block_on(builder.generate("make a map", json!({}), &mut |e| events.push(e)))
    }

    #[test]
    fn test_stream_builds_document() {
        init_logger();
        let (builder, source) = builder(ScriptedSource::new().with_script([
            "Sure, here is the map.\n```json\n",
            "{\"op\":\"replace\",\"path\":\"/basemap\",\"value\":\"dark\"}\n{\"op\":\"add\",\"pa",
            "th\":\"/markers/home\",\"value\":{\"coordinates\":[1,2]}}\n",
            "```\n{\"meta\":\"usage\",\"input_tokens\":10,\"output_tokens\":5}",
        ]));
        let mut events = Vec::new();
        let outcome = run(&builder, &mut events).unwrap();

        assert_eq!(outcome.status, GenerationStatus::Completed);
        assert_eq!(
            outcome.document,
            json!({"basemap": "dark", "markers": {"home": {"coordinates": [1, 2]}}})
        );
        assert_eq!(outcome.patches_applied, 2);
        assert_eq!(outcome.usage.total(), 15);
        assert_eq!(source.requests().len(), 1);
        assert!(!builder.is_running());

        let snapshots = events.iter().filter(|e| matches!(e, StreamEvent::Snapshot(_))).count();
        // One per patch plus the post-validation snapshot.
        assert_eq!(snapshots, 3);
        assert!(events.contains(&StreamEvent::Narrative("Sure, here is the map.".into())));
        assert_eq!(events.last(), Some(&StreamEvent::Finished(GenerationStatus::Completed)));
    }

    #[test]
    fn test_huge_usage_counts_saturate() {
        let (builder, _) = builder(ScriptedSource::new().with_text(
            "{\"meta\":\"usage\",\"input_tokens\":18446744073709551615,\"output_tokens\":1}\n\
             {\"meta\":\"usage\",\"input_tokens\":1,\"output_tokens\":1}\n\
             {\"op\":\"add\",\"path\":\"/zoom\",\"value\":3}",
        ));
        let mut events = Vec::new();
        let outcome = run(&builder, &mut events).unwrap();
        assert_eq!(outcome.status, GenerationStatus::Completed);
        assert_eq!(outcome.document, json!({"zoom": 3}));
        assert_eq!(outcome.usage.input_tokens, u64::MAX);
        assert_eq!(outcome.usage.output_tokens, 2);
        assert_eq!(outcome.usage.total(), u64::MAX);
    }

    #[test]
    fn test_bad_lines_discarded() {
        let (builder, _) = builder(ScriptedSource::new().with_text(
            "{\"op\":\"add\",\"path\":\"/zoom\",\"value\":3}\n\
             {\"op\":\"add\",\"path\":\"/zoom/level\",\"value\":3}\n\
             {\"op\":\"add\",\"path\":\"/center\n\
             {\"meta\":\"error\",\"message\":\"slow down\"}",
        ));
        let mut events = Vec::new();
        let outcome = run(&builder, &mut events).unwrap();
        assert_eq!(outcome.document, json!({"zoom": 3}));
        assert_eq!(outcome.patches_applied, 1);
        assert_eq!(outcome.patches_rejected, 1);
        assert!(events.contains(&StreamEvent::Error {
            message: "slow down".into()
        }));
    }

    #[test]
    fn test_one_repair_round_trip() {
        let (builder, source) = builder(
            ScriptedSource::new()
                .with_text(r#"{"op":"add","path":"/layers/sat","value":{"type":"raster","colour":"red"}}"#)
                .with_text(r#"{"op":"add","path":"/layers/sat/tiles","value":["https://t/{z}/{x}/{y}.png"]}"#),
        );
        let mut events = Vec::new();
        let outcome = run(&builder, &mut events).unwrap();

        assert_eq!(outcome.status, GenerationStatus::Repaired);
        assert!(outcome.is_valid());
        assert_eq!(
            outcome.document,
            json!({"layers": {"sat": {"type": "raster", "tiles": ["https://t/{z}/{x}/{y}.png"]}}})
        );
        let requests = source.requests();
        assert_eq!(requests.len(), 2);
        let RequestKind::Repair { issues } = &requests[1].kind else {
            panic!("expected repair request");
        };
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "/layers/sat/tiles");
        assert!(requests[1].instruction.contains("/layers/sat/tiles"));
        assert_eq!(requests[0].generation, requests[1].generation);
        assert!(events.iter().any(|e| matches!(e, StreamEvent::Repairing(_))));
    }

    #[test]
    fn test_repair_exhausted_renders_anyway() {
        let (builder, source) = builder(ScriptedSource::new().with_text(
            "{\"op\":\"add\",\"path\":\"/layers/sat\",\"value\":{\"type\":\"raster\"}}\n\
             {\"op\":\"add\",\"path\":\"/markers/a\",\"value\":{\"coordinates\":[0,0]}}",
        ));
        let mut events = Vec::new();
        let outcome = run(&builder, &mut events).unwrap();
        assert_eq!(outcome.status, GenerationStatus::RepairExhausted);
        assert_eq!(source.requests().len(), 2);
        assert!(!outcome.is_valid());
        let spec = outcome.specification();
        assert_eq!(spec.marker_count(), 1);
        assert_eq!(spec.layer_count(), 0);
    }

    #[test]
    fn test_transport_failure_is_terminal() {
        let (builder, _) = builder(ScriptedSource::new().with_failing_script(
            ["{\"op\":\"add\",\"path\":\"/zoom\",\"value\":3}\n"],
            TransportError::Status {
                status: 503,
                message: "unavailable".into(),
            },
        ));
        let mut events = Vec::new();
        let err = run(&builder, &mut events).unwrap_err();
        assert!(matches!(err, StreamError::Transport(TransportError::Status { status: 503, .. })));
        assert!(!builder.is_running());
        // The patch that arrived before the failure was still applied and shown.
        assert!(events.contains(&StreamEvent::Snapshot(json!({"zoom": 3}))));
    }

    #[test]
    fn test_invalid_base() {
        let (builder, _) = builder(ScriptedSource::new());
        let err = block_on(builder.generate("x", json!("nope"), &mut |_: StreamEvent| {})).unwrap_err();
        assert!(matches!(err, StreamError::InvalidBase(_)));
    }

    /// A source whose streams yield their chunks and then never end.
    struct HangingSource {
        chunks: Vec<&'static str>,
    }

    impl TokenSource for HangingSource {
        fn open(&self, _request: &GenerationRequest) -> LocalBoxStream<'static, Result<String, TransportError>> {
            let items: Vec<Result<String, TransportError>> =
                self.chunks.iter().map(|c| Ok(c.to_string())).collect();
            stream::iter(items).chain(stream::pending()).boxed_local()
        }
    }

    fn hanging_builder() -> Rc<PatchStreamBuilder> {
        Rc::new(PatchStreamBuilder::new(
            Rc::new(HangingSource {
                chunks: vec!["{\"op\":\"add\",\"path\":\"/zoom\",\"value\":4}\n"],
            }),
            Rc::new(SpecValidator::new()),
        ))
    }

    fn spawn_generation(
        pool: &LocalPool,
        builder: &Rc<PatchStreamBuilder>,
    ) -> Rc<RefCell<Option<GenerationOutcome>>> {
        let slot = Rc::new(RefCell::new(None));
        let (b, s) = (builder.clone(), slot.clone());
        pool.spawner()
            .spawn_local(async move {
                let outcome = b.generate("x", json!({}), &mut |_: StreamEvent| {}).await.unwrap();
                *s.borrow_mut() = Some(outcome);
            })
            .unwrap();
        slot
    }

    #[test]
    fn test_stop_keeps_partial_state() {
        let mut pool = LocalPool::new();
        let builder = hanging_builder();
        let slot = spawn_generation(&pool, &builder);

        pool.run_until_stalled();
        assert!(builder.is_running());
        assert!(slot.borrow().is_none());

        assert!(builder.stop());
        pool.run_until_stalled();
        let outcome = slot.borrow_mut().take().unwrap();
        assert_eq!(outcome.status, GenerationStatus::Cancelled);
        assert_eq!(outcome.document, json!({"zoom": 4}));
        assert!(!builder.is_running());
        assert!(!builder.stop());
    }

    #[test]
    fn test_new_request_supersedes() {
        let mut pool = LocalPool::new();
        let builder = hanging_builder();
        let first = spawn_generation(&pool, &builder);
        pool.run_until_stalled();
        let second = spawn_generation(&pool, &builder);
        pool.run_until_stalled();

        let outcome = first.borrow_mut().take().unwrap();
        assert_eq!(outcome.status, GenerationStatus::Superseded);
        assert_eq!(outcome.document, json!({"zoom": 4}));
        assert!(second.borrow().is_none());
        assert!(builder.is_running());

        builder.stop();
        pool.run_until_stalled();
        assert_eq!(second.borrow().as_ref().unwrap().status, GenerationStatus::Cancelled);
    }
}
