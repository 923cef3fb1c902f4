pub mod log;
pub mod story;

pub use log::{GenerationRecord, LogEntry, LoggedLength, SessionLog, SESSION_LOG_CAPACITY};
pub use story::{GenerationRequest, Role, Turn};
