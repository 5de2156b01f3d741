pub mod batch;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod log_buffer;
pub mod observer;
pub mod preflight;
pub mod processor;

pub use batch::{BatchRunner, RunReport};
pub use error::{ItemError, PreconditionError};
pub use processor::{ItemEvent, RecordProcessor, RecordReport};
