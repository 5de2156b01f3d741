pub mod attachment;
pub mod error;
pub mod log;
pub mod outcome;
pub mod progress;
pub mod transform;

pub use attachment::{AttachmentField, AttachmentRef, ProcessedFile};
pub use error::CoreError;
pub use log::{LogEntry, LogLevel};
pub use outcome::{RecordOutcome, RecordStatus, Summary};
pub use progress::RunProgress;
pub use transform::TransformSpec;
