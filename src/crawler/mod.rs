pub mod controller;
pub mod css;
pub mod html;
pub mod links;
pub mod scheduler;
pub mod task;

// Re-export common types
pub use controller::MirrorController;
