//! story-service: relays story prompts to Gemini and keeps a per-session
//! inference log.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
