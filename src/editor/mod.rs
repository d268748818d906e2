pub mod commands;
pub mod session;
pub mod state;

pub use commands::EditorCommand;
pub use session::{EditorView, RecordEditor};
pub use state::{EditorState, SaveTicket};
