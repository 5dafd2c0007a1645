pub mod client;
pub mod models;
pub mod prompts;
pub mod stream;
pub mod token;

pub use client::DevanaClient;
