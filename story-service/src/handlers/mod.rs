pub mod health;
pub mod story;

pub use health::{health_check, index, metrics_endpoint, not_found, readiness_check};
pub use story::{generate_story, get_logs};
