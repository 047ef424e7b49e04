pub mod library;
pub mod progress;
pub mod upload;
