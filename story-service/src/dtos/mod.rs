pub mod story;

pub use story::{GenerateStoryRequest, GenerateStoryResponse, MAX_OUTPUT_LENGTH};
