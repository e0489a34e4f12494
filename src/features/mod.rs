pub mod file_selector;
pub mod knowledge_base;

pub use file_selector::FileSelector;
pub use knowledge_base::KnowledgeBase;
