// URL identity and normalization
pub mod handler;

pub use handler::{strip_query, UrlHandler};
