use crate::editor::error::{EditError, Operation};
use crate::editor::orchestrator::SegmentedMask;
use crate::editor::state::EditResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// User-facing outcome of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub operation: Option<Operation>,
    pub message: String,
}

impl Notice {
    pub fn info(operation: Operation, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            operation: Some(operation),
            message: message.into(),
        }
    }

    pub fn warning(operation: Option<Operation>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            operation,
            message: message.into(),
        }
    }

    pub fn from_error(err: &EditError) -> Self {
        let level = match err {
            EditError::Busy | EditError::MissingInstruction | EditError::EmptyResult { .. } => {
                NoticeLevel::Warning
            }
            EditError::PersistFailure {
                operation: Operation::MaskPersist,
                ..
            } => NoticeLevel::Warning,
            _ => NoticeLevel::Error,
        };
        Self {
            level,
            operation: err.operation(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveAction {
    Discard,
    /// Add the edit to the board as a new image.
    Append,
    /// Overwrite the open image with the edit.
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    NothingToResolve,
    Discarded,
    Appended { record_id: String, image_url: String },
    Replaced { image_url: String },
}

/// Worker thread to UI thread.
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    Segmented(Result<SegmentedMask, EditError>),
    MaskPersisted(Result<String, EditError>),
    Generated(Result<EditResult, EditError>),
}
