pub mod public;
pub mod upload;
