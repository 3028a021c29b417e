pub mod collab;
pub mod editor;
pub mod logging;
pub mod settings;

pub use editor::{EditorServices, EditorSession};
