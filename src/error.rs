//! Error types for the parts of the crate that return `Result` rather than
//! a typed [`crate::ta::Status`] — model-construction failures, I/O during
//! output, and the umbrella error `main` reports with an exit code. Mirrors
//! the teacher's `export::ExportError` style: a small enum wrapping the
//! underlying cause, with `source()` delegating to it.

use std::fmt;

/// Ways a [`crate::model::System`] built by a caller can fail to be a valid
/// input to [`crate::ta::Ta`]. The textual parser that would normally
/// produce these is out of scope (spec §1); this is the contract an
/// in-memory builder must satisfy.
#[derive(Debug)]
pub enum ModelError {
    /// A process declares no initial location.
    NoInitialLocation { process: String },
    /// An edge references a location index out of range for its process.
    DanglingEdge { process: String, edge: usize },
    /// A declared integer variable's initial value falls outside its own
    /// `[min, max]` range.
    IntVarOutOfRange { index: usize, value: i32, min: i32, max: i32 },
    /// The CLI's internal text format failed to parse.
    Parse(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::NoInitialLocation { process } => write!(f, "process {process} declares no initial location"),
            ModelError::DanglingEdge { process, edge } => write!(f, "process {process} edge {edge} references an unknown location"),
            ModelError::IntVarOutOfRange { index, value, min, max } => {
                write!(f, "integer variable {index} initial value {value} is outside [{min}, {max}]")
            }
            ModelError::Parse(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ModelError {}

/// The umbrella error surfaced by the `reach`/`concur19` binary (spec §6):
/// a model error, a DBM overflow, or an I/O failure while reading the model
/// or writing output.
#[derive(Debug)]
pub enum CoreError {
    Model(ModelError),
    Overflow(crate::bound::Overflow),
    Io(std::io::Error),
    /// The search was cancelled via [`Cancellation`] before completing.
    Cancelled,
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Model(e) => write!(f, "model error: {e}"),
            CoreError::Overflow(_) => write!(f, "clock bound overflow"),
            CoreError::Io(e) => write!(f, "I/O error: {e}"),
            CoreError::Cancelled => write!(f, "search was cancelled"),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoreError::Model(e) => Some(e),
            CoreError::Overflow(e) => Some(e),
            CoreError::Io(e) => Some(e),
            CoreError::Cancelled => None,
        }
    }
}

impl From<ModelError> for CoreError {
    fn from(e: ModelError) -> Self {
        CoreError::Model(e)
    }
}

impl From<crate::bound::Overflow> for CoreError {
    fn from(e: crate::bound::Overflow) -> Self {
        CoreError::Overflow(e)
    }
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Io(e)
    }
}

/// A cooperative cancellation flag threaded through [`crate::covreach`]'s
/// work-list loop, checked between work-list pops so a long search can be
/// interrupted (e.g. by a CLI timeout) without tearing down mid-step.
#[derive(Clone, Default)]
pub struct Cancellation(std::sync::Arc<std::sync::atomic::AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Cancellation(std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, std::sync::atomic::Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::Acquire)
    }
}
