use std::fmt;

/// A payload the mask codec could not interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub reason: String,
}

impl DecodeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not decode image payload: {}", self.reason)
    }
}

impl std::error::Error for DecodeError {}

/// Which external operation an error or notice belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Segmentation,
    Generation,
    MaskPersist,
    Append,
    Replace,
    Metadata,
    Load,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Operation::Segmentation => "segmentation",
            Operation::Generation => "generation",
            Operation::MaskPersist => "mask save",
            Operation::Append => "add to board",
            Operation::Replace => "replace photo",
            Operation::Metadata => "save details",
            Operation::Load => "load image",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    /// Another AI request is still in flight; nothing was sent.
    Busy,
    /// Generation was requested without an instruction.
    MissingInstruction,
    /// Network failure or non-2xx status.
    TransportFailure { operation: Operation, detail: String },
    /// The reply body could not be parsed.
    MalformedResponse { operation: Operation, detail: String },
    /// A well-formed reply reporting `success: false`.
    Rejected { operation: Operation, message: String },
    /// A successful reply that carried no usable image.
    EmptyResult { operation: Operation },
    DecodeError(DecodeError),
    /// The current mask could not be encoded for submission.
    EncodeFailure(String),
    /// Upload or record write failed. `uploaded_url` is set when the blob was
    /// stored before the record write failed and is now orphaned.
    PersistFailure {
        operation: Operation,
        detail: String,
        uploaded_url: Option<String>,
    },
    RecordNotFound { id: String },
}

impl EditError {
    pub fn operation(&self) -> Option<Operation> {
        match self {
            EditError::TransportFailure { operation, .. }
            | EditError::MalformedResponse { operation, .. }
            | EditError::Rejected { operation, .. }
            | EditError::EmptyResult { operation }
            | EditError::PersistFailure { operation, .. } => Some(*operation),
            _ => None,
        }
    }
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditError::Busy => write!(f, "another AI request is still running"),
            EditError::MissingInstruction => write!(f, "enter an edit instruction first"),
            EditError::TransportFailure { operation, detail } => {
                write!(f, "failed to connect to the {operation} service: {detail}")
            }
            EditError::MalformedResponse { operation, detail } => {
                write!(f, "the {operation} service returned an unreadable reply: {detail}")
            }
            EditError::Rejected { operation, message } => {
                write!(f, "{operation} failed: {message}")
            }
            EditError::EmptyResult { operation } => match operation {
                Operation::Segmentation => {
                    write!(f, "segmentation finished but returned no visual masks")
                }
                _ => write!(f, "{operation} finished but returned no image"),
            },
            EditError::DecodeError(err) => write!(f, "{err}"),
            EditError::EncodeFailure(detail) => write!(f, "could not encode the mask: {detail}"),
            EditError::PersistFailure {
                operation, detail, ..
            } => write!(f, "{operation} failed: {detail}"),
            EditError::RecordNotFound { id } => write!(f, "image {id} not found"),
        }
    }
}

impl std::error::Error for EditError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EditError::DecodeError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DecodeError> for EditError {
    fn from(err: DecodeError) -> Self {
        EditError::DecodeError(err)
    }
}
