//! CLI 模式处理器
//!
//! 默认输出人类可读格式，使用 --json 参数可输出 JSON 格式

use crate::config::AutofixConfig;
use crate::executor::{AutofixExecutor, AutofixOutcome};
use crate::version::Version;
use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// Config file picked up from the project root when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "autofix.yml";

/// CLI Commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// 🔧 执行自动修复 (改写文件或生成 patch)
    Fix {
        /// 项目路径
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// YAML 配置文件
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// 📋 输出修复计划 (不修改任何文件)
    Plan {
        /// 项目路径
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// YAML 配置文件
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// ⚖️ 比较两个版本号
    CompareVersions {
        /// 当前版本
        from: String,

        /// 目标版本
        to: String,
    },
}

/// Command-line values taking precedence over the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// 源 JDK 版本 (8/11/17)
    #[arg(long)]
    pub from_version: Option<u32>,

    /// 目标 JDK 版本 (11/17/21)
    #[arg(long)]
    pub to_version: Option<u32>,

    /// 生成 patch 而不是直接改写
    #[arg(long)]
    pub patch: bool,

    /// patch 输出路径
    #[arg(long)]
    pub patch_file: Option<PathBuf>,

    /// mvn dependency:tree 输出
    #[arg(long)]
    pub dependency_tree: Option<PathBuf>,

    /// 扫描结果 (JSON)
    #[arg(long)]
    pub findings: Option<PathBuf>,

    /// 允许降级
    #[arg(long)]
    pub force_update: bool,

    /// 覆盖 JAVA_HOME
    #[arg(long)]
    pub java_home: Option<PathBuf>,
}

impl Overrides {
    pub fn apply(&self, config: &mut AutofixConfig) {
        if let Some(v) = self.from_version {
            config.from_version = v;
        }
        if let Some(v) = self.to_version {
            config.to_version = v;
        }
        if self.patch {
            config.autofix_generate_patch = true;
        }
        if let Some(file) = &self.patch_file {
            config.autofix_file = file.clone();
        }
        if let Some(file) = &self.dependency_tree {
            config.dependency_tree_file = Some(file.clone());
        }
        if let Some(file) = &self.findings {
            config.findings_file = Some(file.clone());
        }
        if self.force_update {
            config.force_update = true;
        }
        if let Some(home) = &self.java_home {
            config.java_home = Some(home.clone());
        }
    }
}

/// `--config`, else `autofix.yml` in the project, else defaults; then overrides.
pub fn load_config(project: &Path, config: Option<&Path>, overrides: &Overrides) -> Result<AutofixConfig> {
    let default_file = project.join(DEFAULT_CONFIG_FILE);
    let mut loaded = match config {
        Some(file) => AutofixConfig::from_yaml_file(file)?,
        None if default_file.is_file() => AutofixConfig::from_yaml_file(&default_file)?,
        None => AutofixConfig::default(),
    };
    overrides.apply(&mut loaded);
    loaded.validate()?;
    Ok(loaded)
}

/// 处理 CLI 命令
///
/// json_output: 是否输出 JSON 格式（默认 false，输出人类可读格式）
pub fn handle_command(cmd: Command, json_output: bool) -> Result<()> {
    let result = match cmd {
        Command::Fix {
            path,
            config,
            overrides,
        } => run_fix(&path, config.as_deref(), &overrides, json_output),

        Command::Plan {
            path,
            config,
            overrides,
        } => run_plan(&path, config.as_deref(), &overrides),

        Command::CompareVersions { from, to } => Ok(compare_versions(&from, &to, json_output)),
    };

    // 输出结果
    match result {
        Ok(value) => {
            if json_output {
                let output = json!({
                    "success": true,
                    "data": value
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_value(&value);
            }
        }
        Err(e) => {
            if json_output {
                let output = json!({
                    "success": false,
                    "error": format!("{e:#}")
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(1);
        }
    }

    Ok(())
}

/// 打印 Value，字符串直接输出
fn print_value(value: &Value) {
    match value {
        Value::String(s) => println!("{}", s),
        _ => println!("{}", serde_json::to_string_pretty(value).unwrap_or_default()),
    }
}

fn run_fix(path: &Path, config: Option<&Path>, overrides: &Overrides, json_output: bool) -> Result<Value> {
    let config = load_config(path, config, overrides)?;
    let outcome = AutofixExecutor::new(path, config)?.execute()?;
    if json_output {
        Ok(serde_json::to_value(&outcome)?)
    } else {
        Ok(Value::String(render_outcome(&outcome)))
    }
}

fn run_plan(path: &Path, config: Option<&Path>, overrides: &Overrides) -> Result<Value> {
    let config = load_config(path, config, overrides)?;
    let summary = AutofixExecutor::new(path, config)?.preview()?;
    Ok(serde_json::to_value(&summary)?)
}

fn compare_versions(from: &str, to: &str, json_output: bool) -> Value {
    let (a, b) = (Version::parse(from), Version::parse(to));
    let update = a.should_update_to(&b);
    if json_output {
        json!({
            "from": { "numbers": a.numbers(), "tail": a.tail() },
            "to": { "numbers": b.numbers(), "tail": b.tail() },
            "shouldUpdate": update
        })
    } else {
        let verdict = if update { "update" } else { "keep" };
        Value::String(format!("{from} -> {to}: {verdict}"))
    }
}

/// Markdown summary of a run.
pub fn render_outcome(outcome: &AutofixOutcome) -> String {
    let mut out = String::new();
    if outcome.fixed_count() == 0 {
        out.push_str("## No issues were auto-fixed\n");
    } else {
        out.push_str(&format!("## Auto-fixed {} issue(s)\n\n", outcome.fixed_count()));
        for info in &outcome.fixed_infos {
            let params = if info.params.is_empty() {
                String::new()
            } else {
                format!(" `{}`", info.params.join(" → "))
            };
            out.push_str(&format!("- {}{} ×{}\n", info.fix_type, params, info.count));
            for file in info.files.iter().flatten() {
                out.push_str(&format!("  - {}\n", file.display()));
            }
        }
    }

    if !outcome.fixed.is_empty() || !outcome.unfixed.is_empty() {
        out.push_str(&format!(
            "\nFindings: {} fixed, {} unfixed\n",
            outcome.fixed.len(),
            outcome.unfixed.len()
        ));
        for finding in &outcome.unfixed {
            out.push_str(&format!("- [unfixed] {}\n", finding.feature));
        }
    }
    if !outcome.errors.is_empty() {
        out.push_str(&format!("\n{} file(s) skipped:\n", outcome.errors.len()));
        for error in &outcome.errors {
            out.push_str(&format!("- {} ({}): {}\n", error.path.display(), error.recipe, error.message));
        }
    }
    if let Some(patch) = &outcome.patch_file {
        out.push_str(&format!("\nPatch: {}\n", patch.display()));
    } else if !outcome.written.is_empty() {
        out.push_str(&format!("\n{} file(s) rewritten\n", outcome.written.len()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::FixedInfo;

    #[test]
    fn test_overrides_take_precedence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "fromVersion: 8\ntoVersion: 11\n").unwrap();
        let overrides = Overrides {
            to_version: Some(17),
            patch: true,
            ..Default::default()
        };
        let config = load_config(dir.path(), None, &overrides).unwrap();
        assert_eq!(config.to_version, 17);
        assert!(config.autofix_generate_patch);

        let bad = Overrides {
            to_version: Some(12),
            ..Default::default()
        };
        assert!(load_config(dir.path(), None, &bad).is_err());
    }

    #[test]
    fn test_render_outcome() {
        let empty = AutofixOutcome::default();
        assert!(render_outcome(&empty).contains("No issues were auto-fixed"));

        let outcome = AutofixOutcome {
            fixed_infos: vec![FixedInfo {
                fix_type: "dependency_update".to_string(),
                params: vec!["org.projectlombok:lombok".to_string(), "1.18.22".to_string()],
                count: 1,
                files: None,
            }],
            ..Default::default()
        };
        let text = render_outcome(&outcome);
        assert!(text.contains("Auto-fixed 1 issue(s)"));
        assert!(text.contains("dependency_update `org.projectlombok:lombok → 1.18.22` ×1"));
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(
            compare_versions("1.2.1", "1.2.3", false),
            Value::String("1.2.1 -> 1.2.3: update".to_string())
        );
        assert_eq!(compare_versions("1.2.3", "1.2.1", true)["shouldUpdate"], json!(false));
    }
}
