use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("could not find executable '{program}'")]
    ToolNotFound { program: String },

    #[error("command '{program}' failed with {}: {stderr}", exit_label(*code))]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        /// The tool's own diagnostic output, verbatim.
        stderr: String,
    },

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error while running '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "termination by signal".to_string(),
    }
}

impl ExecError {
    /// Map a spawn failure, distinguishing a missing tool from other faults.
    pub(crate) fn from_spawn(program: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            ExecError::ToolNotFound {
                program: program.to_string(),
            }
        } else {
            ExecError::Spawn {
                program: program.to_string(),
                source,
            }
        }
    }
}
