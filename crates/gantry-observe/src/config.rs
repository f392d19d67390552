use std::io::IsTerminal;

use crate::format::LoggerFormat;

/// How a gantry binary wants its diagnostics emitted.
///
/// `level` accepts the full tracing env-filter syntax, so per-target
/// overrides like `info,gantry.kube=debug` work.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color: std::io::stdout().is_terminal(),
        }
    }
}
