use esptail_core::config::LevelLabelsConfig;
use esptail_core::{EsptailError, Level, LogEntry, Module, Result};
use tracing::debug;

/// Key of the label carrying the detected severity
pub const LEVEL_LABEL: &str = "level";

/// Detect the severity of a firmware log line
///
/// The ESP-IDF logger prefixes lines with `<tag> (<ticks>) `, where the tag is
/// one of `V`, `D`, `I`, `W`, `E`. Anything else carries no severity.
pub fn extract_level(line: &str) -> Option<Level> {
    match line.as_bytes() {
        [tag, b' ', b'(', ..] => Level::from_tag(*tag),
        _ => None,
    }
}

/// Level Label Module
///
/// Attaches `level=<severity>` to entries whose line starts with a firmware
/// severity prefix. Non-matching lines pass through unlabeled.
pub struct LevelLabelModule {
    config: LevelLabelsConfig,
}

impl LevelLabelModule {
    pub fn new(config: LevelLabelsConfig) -> Self {
        Self { config }
    }
}

impl Module for LevelLabelModule {
    fn name(&self) -> &'static str {
        "level_labels"
    }

    fn process(&self, mut entry: LogEntry) -> Result<LogEntry> {
        if let Some(level) = extract_level(entry.line()) {
            debug!(level = %level, "Detected log level");
            entry
                .labels
                .insert(LEVEL_LABEL, level.as_str())
                .map_err(|e| EsptailError::Module {
                    module: self.name().to_string(),
                    message: e.to_string(),
                })?;
        }
        Ok(entry)
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}
