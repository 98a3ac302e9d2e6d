//! Projections of the show store. None of these own persisted state.

pub mod ai_tools;
pub mod album;
pub mod random_memory;
pub mod show_form;
pub mod timeline;

pub use ai_tools::{AiTools, Carousel, ToolError, ToolKind, ToolTask};
pub use album::{AlbumDraft, InviteOutcome};
pub use random_memory::{MemoryState, RandomMemory};
pub use show_form::{FormError, Intake, ShowForm};
pub use timeline::{Timeline, TimelineState};
