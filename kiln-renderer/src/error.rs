//! Error types for kiln-renderer.

use std::path::PathBuf;

use thiserror::Error;

use kiln_core::ParseError;
use kiln_schema::SchemaError;

/// All errors that can arise from compiling and running a template.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The template failed to parse; nothing was generated.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The input value has a shape that cannot be declared in Go.
    #[error("schema derivation failed: {0}")]
    Schema(#[from] SchemaError),

    /// The program template failed to load or render.
    #[error("program template error: {0}")]
    Tera(#[from] tera::Error),

    /// The input value could not be encoded as JSON.
    #[error("input serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Writing or removing the generated program failed.
    #[error("artifact io error at {path}: {source}")]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The toolchain binary could not be started.
    #[error("failed to launch `{program}`: {source}")]
    ToolchainLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The generated program did not build, aborted, or timed out.
    ///
    /// `output` holds everything the toolchain printed. `artifact` is set
    /// when the program file was kept for inspection.
    #[error("generated program {}:\n{output}", describe_status(.status))]
    ExecutionFailure {
        status: Option<i32>,
        output: String,
        artifact: Option<PathBuf>,
    },
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exited with status {code}"),
        None => "was terminated before exiting".to_owned(),
    }
}

pub(crate) fn artifact_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::ArtifactIo {
        path: path.into(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_failure_reports_status_and_output() {
        let err = RenderError::ExecutionFailure {
            status: Some(1),
            output: "undefined: Nme".into(),
            artifact: None,
        };
        let msg = err.to_string();
        assert!(msg.contains("exited with status 1"), "{msg}");
        assert!(msg.contains("undefined: Nme"), "{msg}");

        let killed = RenderError::ExecutionFailure {
            status: None,
            output: String::new(),
            artifact: None,
        };
        assert!(killed.to_string().contains("terminated"));
    }

    #[test]
    fn schema_errors_are_labelled() {
        let err = RenderError::from(SchemaError::SelfReferential { name: "Node".into() });
        assert!(err.to_string().starts_with("schema derivation failed:"));
    }

    #[test]
    fn tera_errors_convert() {
        let err = RenderError::from(tera::Error::msg("missing variable"));
        assert!(matches!(err, RenderError::Tera(_)));
        assert!(err.to_string().contains("missing variable"));
    }
}
