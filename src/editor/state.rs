use crate::collab::ImageRecord;
use crate::editor::codec::{InlineImage, MaskImage};
use crate::editor::error::Operation;
use crate::editor::model::Tool;
use crate::editor::stroke::StrokeEngine;
use crate::editor::surface::CanvasSurface;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolMode {
    #[default]
    Paint,
    Select,
    /// Momentary: held while an auto-segment request is in flight.
    AutoSegmenting,
}

impl ToolMode {
    /// Stroke interpretation while this mode is active.
    pub fn input_tool(self) -> Tool {
        match self {
            ToolMode::Select => Tool::Select,
            ToolMode::Paint | ToolMode::AutoSegmenting => Tool::Paint,
        }
    }
}

impl From<Tool> for ToolMode {
    fn from(tool: Tool) -> Self {
        match tool {
            Tool::Paint => ToolMode::Paint,
            Tool::Select => ToolMode::Select,
        }
    }
}

pub fn can_transition(from: ToolMode, to: ToolMode) -> bool {
    matches!(
        (from, to),
        (ToolMode::Paint, ToolMode::Select)
            | (ToolMode::Select, ToolMode::Paint)
            | (ToolMode::Paint, ToolMode::AutoSegmenting)
            | (ToolMode::Select, ToolMode::AutoSegmenting)
            | (ToolMode::AutoSegmenting, ToolMode::Paint)
    ) || from == to
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingOperation {
    #[default]
    Idle,
    Segmenting,
    Generating,
}

impl PendingOperation {
    pub fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn operation(self) -> Option<Operation> {
        match self {
            PendingOperation::Idle => None,
            PendingOperation::Segmenting => Some(Operation::Segmentation),
            PendingOperation::Generating => Some(Operation::Generation),
        }
    }
}

/// A generated image awaiting discard, append or replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditResult {
    pub image: InlineImage,
    /// Instruction the image was generated from.
    pub instruction: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub tool: ToolMode,
    pub pending: PendingOperation,
    pub mask_visible: bool,
    /// Last segmentation (or persisted) mask; what "show mask" redraws.
    pub ai_mask: Option<MaskImage>,
    pub edit_result: Option<EditResult>,
    pub instruction: String,
}

impl SessionState {
    pub fn has_ai_mask(&self) -> bool {
        self.ai_mask.is_some()
    }
}

/// Everything the orchestrator reads and writes for one open image.
#[derive(Debug, Clone)]
pub struct EditContext {
    pub state: SessionState,
    pub surface: CanvasSurface,
    pub strokes: StrokeEngine,
    pub record: ImageRecord,
    /// Editable name and description; persisted only by an explicit save.
    pub name: String,
    pub description: String,
}

impl EditContext {
    pub fn new(record: ImageRecord, surface: CanvasSurface, strokes: StrokeEngine) -> Self {
        let name = record.name.clone().unwrap_or_default();
        let description = record.description.clone().unwrap_or_default();
        Self {
            state: SessionState::default(),
            surface,
            strokes,
            record,
            name,
            description,
        }
    }

    /// Take the name and description from a freshly loaded record.
    pub fn adopt_record(&mut self, record: ImageRecord) {
        self.name = record.name.clone().unwrap_or_default();
        self.description = record.description.clone().unwrap_or_default();
        self.record = record;
    }

    /// Folder uploads go under the folder, otherwise under the session.
    pub fn upload_prefix(&self) -> String {
        self.record
            .folder_id
            .clone()
            .or_else(|| self.session_prefix())
            .unwrap_or_else(|| "uploads".to_string())
    }

    /// `{session}/masks`, falling back to `uploads/masks`.
    pub fn mask_prefix(&self) -> String {
        format!(
            "{}/masks",
            self.session_prefix().unwrap_or_else(|| "uploads".to_string())
        )
    }

    fn session_prefix(&self) -> Option<String> {
        self.record
            .session_id
            .clone()
            .filter(|session| !session.trim().is_empty())
    }
}
