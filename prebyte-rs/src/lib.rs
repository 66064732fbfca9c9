pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod profile;
pub mod rules;
pub mod script;
pub mod var;

pub use engine::Prebyte;
pub use error::{Error, Result};
