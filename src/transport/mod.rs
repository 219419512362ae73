pub mod client;
pub mod parser;
pub mod response;
pub mod tls;

// Re-export common types
pub use client::HttpsClient;
pub use response::{Response, ResponseStatus};
