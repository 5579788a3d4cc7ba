use esptail_core::config::ModulesConfig;
use esptail_core::{EsptailError, LogEntry, Module, Result};
use esptail_modules::LevelLabelModule;
use tracing::{debug, info, warn};

/// Pipeline that runs each captured entry through the labeling modules
pub struct Pipeline {
    modules: Vec<Box<dyn Module>>,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    /// Create a pipeline from configuration
    pub fn from_config(config: &ModulesConfig) -> Self {
        let mut pipeline = Self::new();

        if config.level_labels.enabled {
            let module = LevelLabelModule::new(config.level_labels.clone());
            info!(module = module.name(), "Adding module to pipeline");
            pipeline.modules.push(Box::new(module));
        }

        pipeline
    }

    /// Process a log entry through all modules
    pub fn process(&self, mut entry: LogEntry) -> Result<LogEntry> {
        for module in &self.modules {
            if !module.is_enabled() {
                debug!(module = module.name(), "Skipping disabled module");
                continue;
            }

            entry = module.process(entry).map_err(|e| {
                warn!(module = module.name(), error = %e, "Module processing failed");
                match e {
                    EsptailError::Module { .. } => e,
                    other => EsptailError::Module {
                        module: module.name().to_string(),
                        message: other.to_string(),
                    },
                }
            })?;
        }

        Ok(entry)
    }

    /// Get the number of modules in the pipeline
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Get the names of all modules in the pipeline
    pub fn module_names(&self) -> Vec<&'static str> {
        self.modules.iter().map(|m| m.name()).collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
