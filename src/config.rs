// ============================================================================
// 配置 - AutofixConfig (YAML 文件 + CLI 覆盖)
// ============================================================================

use crate::error::{AutofixError, AutofixResult};
use crate::report::CheckResultContext;
use crate::rules::MigrationRules;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct AutofixConfig {
    /// Master switch.
    pub autofix: bool,
    /// Write a patch instead of rewriting files.
    pub autofix_generate_patch: bool,
    pub autofix_file: PathBuf,
    pub fixed_report_file: Option<PathBuf>,
    pub unfixed_report_file: Option<PathBuf>,
    pub from_version: u32,
    pub to_version: u32,
    /// `dependency:tree` dump; declared dependencies are used without one.
    pub dependency_tree_file: Option<PathBuf>,
    /// JSON array of findings.
    pub findings_file: Option<PathBuf>,
    pub force_update: bool,
    /// Overrides `JAVA_HOME` for the JDK internal jar exclusion.
    pub java_home: Option<PathBuf>,
}

impl Default for AutofixConfig {
    fn default() -> Self {
        AutofixConfig {
            autofix: true,
            autofix_generate_patch: false,
            autofix_file: PathBuf::from("autofix.patch"),
            fixed_report_file: None,
            unfixed_report_file: None,
            from_version: 8,
            to_version: 11,
            dependency_tree_file: None,
            findings_file: None,
            force_update: false,
            java_home: None,
        }
    }
}

impl AutofixConfig {
    pub fn from_yaml_str(text: &str) -> AutofixResult<Self> {
        let config: AutofixConfig =
            serde_yaml::from_str(text).map_err(|e| AutofixError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> AutofixResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AutofixError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> AutofixResult<()> {
        MigrationRules::new(self.from_version, self.to_version).map(|_| ())
    }

    /// Relative paths are taken from the project root.
    pub fn resolve(&self, root: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }

    pub fn load_findings(&self, root: &Path) -> AutofixResult<Vec<CheckResultContext>> {
        let Some(file) = &self.findings_file else {
            return Ok(Vec::new());
        };
        let path = self.resolve(root, file);
        let text = std::fs::read_to_string(&path)?;
        serde_json::from_str(&text)
            .map_err(|e| AutofixError::Config(format!("invalid findings file {}: {e}", path.display())))
    }

    pub fn load_dependency_tree(&self, root: &Path) -> AutofixResult<Option<String>> {
        match &self.dependency_tree_file {
            Some(file) => Ok(Some(std::fs::read_to_string(self.resolve(root, file))?)),
            None => Ok(None),
        }
    }
}
