pub mod log_recorder;
pub mod metrics;
pub mod session_key;

pub use log_recorder::record_generation;
pub use metrics::metrics_middleware;
pub use session_key::SessionKey;
