use reframe_service::DownloadError;
use reframe_transform::TransformError;
use thiserror::Error;

/// Problems detected before the first record is touched. Fatal to the run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("no source field selected")]
    MissingSourceField,

    #[error("no target field selected")]
    MissingTargetField,

    #[error("no records to process")]
    EmptyRecordSet,
}

/// Why a single attachment produced no output. Scoped to that attachment.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("transform panicked: {0}")]
    Panicked(String),
}
