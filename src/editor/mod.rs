pub mod codec;
pub mod controller;
pub mod error;
pub mod messages;
pub mod model;
pub mod orchestrator;
pub mod render;
pub mod scan;
pub mod session;
pub mod state;
pub mod stroke;
pub mod surface;

pub use codec::{InlineImage, MaskBitmap, MaskImage};
pub use controller::AutoSegmentAffordance;
pub use error::{DecodeError, EditError, Operation};
pub use messages::{Notice, NoticeLevel, ResolveAction, ResolveOutcome};
pub use model::{BrushRadius, Point, Tool};
pub use orchestrator::EditOrchestrator;
pub use session::{EditorServices, EditorSession};
pub use state::{EditContext, EditResult, PendingOperation, SessionState, ToolMode};
pub use stroke::StrokeEngine;
pub use surface::CanvasSurface;
