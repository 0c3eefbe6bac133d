//! # MapSpec Validate
//!
//! Structural validation of specification documents.
//! The validator knows every field the document model accepts, strips
//! anything else, coerces values that have an obvious intended type, and
//! reports what is still wrong as `(path, message)` issues. A lossy
//! conversion then keeps every entry that does parse, so a document with
//! one broken layer still renders everything else.

pub mod autofix;
pub mod issue;
pub mod lossy;
pub mod schema;
pub mod validator;

pub use autofix::FixNote;
pub use issue::{IssueKind, Severity, ValidationIssue};
pub use lossy::to_specification_lossy;
pub use validator::{SchemaValidator, SpecValidator, ValidationReport};
