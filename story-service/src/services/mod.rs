pub mod generation;
pub mod metrics;
pub mod session_store;

pub use generation::{GeminiClient, GenerationClient, GenerationError, MockGenerationClient};
pub use metrics::{get_metrics, init_metrics};
pub use session_store::{InMemorySessionStore, SessionStore, SESSION_IDLE_TIMEOUT};
