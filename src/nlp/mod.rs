//! Query analysis, keyword clustering and internal linking.

pub mod analyzer;
pub mod clustering;
pub mod internal_linker;

pub use analyzer::Analyzer;
pub use internal_linker::InternalLinker;
