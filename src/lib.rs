pub mod cli;
pub mod core;
pub mod export;
pub mod features;
pub mod llm;
pub mod nlp;
pub mod scraping;
pub mod workflows;

pub use core::types;
pub use core::types::*;
pub use core::{AppConfig, AppState, SeoError, SeoResult};
pub use workflows::Mode;
