pub mod config;
pub mod credential;
pub mod error;
pub mod events;
pub mod forge;
pub mod git;
pub mod provision;
pub mod sync;

// Re-export commonly used types
pub use config::SyncConfig;
pub use credential::Token;
pub use error::{FailureKind, Stage, SyncError};
pub use events::{Event, EventSink, RecordingSink, TracingSink};
pub use git::{Engine, PushOutcome};
pub use sync::{run, SyncReport};
