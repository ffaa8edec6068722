// ============================================================================
// JDK Migration Autofix Engine - Library Interface
// ============================================================================
//
// Plans consistent multi-module Maven POM edits for a JDK upgrade, rewrites
// the affected POMs and Java sources, and accounts for what got fixed.
// The binary (main.rs) is a thin CLI over `executor`.

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod gatv;
pub mod maven;
pub mod plan;
pub mod project;
pub mod recipe;
pub mod report;
pub mod rules;
pub mod version;
pub mod xml;

pub use config::AutofixConfig;
pub use error::{AutofixError, AutofixResult};
pub use executor::{AutofixExecutor, AutofixOutcome};
