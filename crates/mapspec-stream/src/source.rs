use std::cell::RefCell;
use std::collections::VecDeque;

use futures::stream::{self, LocalBoxStream, StreamExt};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use mapspec_validate::ValidationIssue;

/// Failure of the token source's own transport. Terminal for one generation attempt.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Token source returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Stream interrupted: {0}")]
    Interrupted(String),
}

/// Why a generation request is being made.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestKind {
    /// The user's instruction.
    Initial,
    /// One repair round-trip carrying the validation errors left after auto-fix.
    Repair { issues: Vec<ValidationIssue> },
}

/// What the token source is asked to produce.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Generation attempt this request belongs to.
    pub generation: Uuid,
    pub instruction: String,
    /// The document the produced patches will be applied to.
    pub document: Value,
    pub kind: RequestKind,
}

/// Something that produces patch stream text, chunk by chunk.
pub trait TokenSource {
    /// Start a stream for `request`. Dropping the stream aborts the fetch.
    fn open(&self, request: &GenerationRequest) -> LocalBoxStream<'static, Result<String, TransportError>>;
}

/// Replays prerecorded streams, one per `open` call, in order.
///
/// Used to replay a saved generation from a script; once the scripts run
/// out every further request gets an empty stream.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    scripts: RefCell<VecDeque<Vec<Result<String, TransportError>>>>,
    requests: RefCell<Vec<GenerationRequest>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a stream made of `chunks`.
    pub fn with_script<I, S>(self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripts
            .borrow_mut()
            .push_back(chunks.into_iter().map(|c| Ok(c.into())).collect());
        self
    }

    /// Queue a stream that yields `chunks` and then fails.
    pub fn with_failing_script<I, S>(self, chunks: I, error: TransportError) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut items: Vec<_> = chunks.into_iter().map(|c| Ok(c.into())).collect();
        items.push(Err(error));
        self.scripts.borrow_mut().push_back(items);
        self
    }

    /// Queue a script from a whole text, one chunk per line.
    pub fn with_text(self, text: &str) -> Self {
        let chunks: Vec<String> = text.lines().map(|l| format!("{}\n", l)).collect();
        self.with_script(chunks)
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.borrow().clone()
    }
}

impl TokenSource for ScriptedSource {
    fn open(&self, request: &GenerationRequest) -> LocalBoxStream<'static, Result<String, TransportError>> {
        self.requests.borrow_mut().push(request.clone());
        let script = self.scripts.borrow_mut().pop_front().unwrap_or_default();
        stream::iter(script).boxed_local()
    }
}
