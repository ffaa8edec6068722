// ============================================================================
// 错误分类 - Autofix Error Taxonomy
// ============================================================================
//
// Configuration errors fail fast, per-file pipeline errors are collected by
// the runner, write-phase errors carry the rollback outcome.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutofixError {
    /// Malformed `group:artifact:type:version` coordinate handed to a rule or intent.
    #[error("invalid GATV `{value}`: {reason}")]
    InvalidGatv { value: String, reason: &'static str },

    /// A dependency tree dump line that cannot be decoded.
    #[error("invalid dependency tree line {line}: `{text}`")]
    InvalidTreeLine { line: usize, text: String },

    #[error("failed to parse XML {path}: {message}")]
    XmlParse { path: PathBuf, message: String },

    #[error("failed to parse Java source {path}")]
    JavaParse { path: PathBuf },

    #[error("plan generation failed: {0}")]
    Plan(String),

    /// Patch mode needs UTF-8 input, the patch is all-or-nothing.
    #[error("cannot generate patch: {path} is not UTF-8 encoded")]
    NonUtf8Patch { path: PathBuf },

    /// A write failed and every file already rewritten was restored.
    #[error("unable to rewrite {path} ({source}); all changes were rolled back")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A write failed and restoring the earlier writes failed too.
    #[error(
        "unable to rewrite {path} ({source}) and unable to roll back {} file(s): {}",
        rollback_failures.len(),
        rollback_failures.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
    )]
    RollbackFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        rollback_failures: Vec<PathBuf>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// A recipe could not be set up (query compilation, parser language).
    #[error("recipe setup failed: {0:#}")]
    Recipe(anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type AutofixResult<T> = std::result::Result<T, AutofixError>;
