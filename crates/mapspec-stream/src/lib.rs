//! # MapSpec Stream
//!
//! Incremental construction of a map specification from a line-oriented
//! patch stream. Every applied patch produces a snapshot; once the stream
//! ends the document is auto-fixed and validated, and at most one repair
//! round-trip is made before the result is rendered as-is.

pub mod builder;
pub mod record;
pub mod source;

pub use builder::{GenerationOutcome, GenerationStatus, PatchStreamBuilder, StreamError, StreamEvent};
pub use record::{classify, LineSplitter, MetaRecord, StreamLine, Usage};
pub use source::{GenerationRequest, RequestKind, ScriptedSource, TokenSource, TransportError};
