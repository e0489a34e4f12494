use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::Prompter;
use crate::core::config::AppConfig;
use crate::core::error::SeoResult;
use crate::features::knowledge_base::KnowledgeBase;

/// Everything a workflow needs: the loaded config, where answers come from
/// and the run flags.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub prompter: Arc<dyn Prompter>,
    /// Limit every workflow to a handful of items.
    pub test_mode: bool,
    /// Knowledge-base project; asked for on first use when `None`.
    pub project_name: Option<String>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("test_mode", &self.test_mode)
            .field("project_name", &self.project_name)
            .field("models", &self.config.ai_models.models.len())
            .finish()
    }
}

impl AppState {
    pub fn new(config: AppConfig, prompter: Arc<dyn Prompter>) -> Self {
        let project_name = config.app.resolve_project_name();
        Self {
            config: Arc::new(config),
            prompter,
            test_mode: false,
            project_name,
        }
    }

    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    /// A non-blank name overrides the configured project.
    pub fn with_project_name(mut self, name: Option<String>) -> Self {
        if let Some(n) = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
            self.project_name = Some(n);
        }
        self
    }

    pub fn prompter(&self) -> &dyn Prompter {
        self.prompter.as_ref()
    }

    pub fn output_dir(&self) -> PathBuf {
        self.config.app.resolve_output_dir()
    }

    pub fn input_dir(&self) -> PathBuf {
        self.config.app.resolve_input_dir()
    }

    pub fn open_knowledge_base(&self, project_name: &str) -> SeoResult<KnowledgeBase> {
        KnowledgeBase::open(project_name, &self.config.app.resolve_knowledge_base_dir())
    }
}
