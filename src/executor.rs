// ============================================================================
// AutofixExecutor - 读取 → 计划 → 重写 → 输出
// ============================================================================
//
// Phases never interleave: every file is read before planning, the plan is
// complete before any recipe runs, and nothing is written until the whole
// batch of results is known.

use crate::config::AutofixConfig;
use crate::error::{AutofixError, AutofixResult};
use crate::maven::JdkInternalJarMatcher;
use crate::plan::{PlanSummary, PomUpdatePlan, PomUpdatePlanGenerator};
use crate::project::Project;
use crate::recipe::{
    AddJdkMigrationCommentRecipe, ChangedFile, Charset, FileError, OrderAnnotationProcessorPathsRecipe, Pipeline,
    PomUpdateRecipe, Recipe, SecurityManagerCheckRecipe, SourceFile, StreamCountRecipe, TernaryBoxingRecipe,
};
use crate::report::{finding, AutofixReport, CheckResultContext, FixIndex, FixedInfo};
use crate::rules::MigrationRules;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use similar::TextDiff;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutofixOutcome {
    pub fixed_infos: Vec<FixedInfo>,
    pub fixed: Vec<CheckResultContext>,
    pub unfixed: Vec<CheckResultContext>,
    /// Files dropped from the results because a recipe failed on them.
    pub errors: Vec<FileError>,
    /// `fromGATV -> toGATV`.
    pub update_map: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_file: Option<PathBuf>,
    pub written: Vec<PathBuf>,
}

impl AutofixOutcome {
    pub fn fixed_count(&self) -> usize {
        self.fixed_infos.iter().map(|i| i.count).sum()
    }
}

/// Everything known once planning is done.
struct Planned {
    project: Project,
    findings: Vec<CheckResultContext>,
    plan: PomUpdatePlan,
    report: AutofixReport,
}

pub struct AutofixExecutor {
    root: PathBuf,
    config: AutofixConfig,
}

impl AutofixExecutor {
    pub fn new(root: impl Into<PathBuf>, config: AutofixConfig) -> AutofixResult<Self> {
        config.validate()?;
        Ok(AutofixExecutor {
            root: root.into(),
            config,
        })
    }

    pub fn config(&self) -> &AutofixConfig {
        &self.config
    }

    fn jdk_jars(&self) -> Option<JdkInternalJarMatcher> {
        match &self.config.java_home {
            Some(home) => Some(JdkInternalJarMatcher::new(home)),
            None => JdkInternalJarMatcher::from_env(),
        }
    }

    fn plan(&self) -> AutofixResult<Planned> {
        let mut project = Project::load(&self.root)?;
        match self.config.load_dependency_tree(&self.root)? {
            Some(dump) => project.session.load_tree_dump(&dump)?,
            None => project.session.derive_declared_trees(),
        }
        let findings = self.config.load_findings(&self.root)?;
        let rules = MigrationRules::new(self.config.from_version, self.config.to_version)?;

        let mut report = AutofixReport::new();
        let plan = {
            let mut generator = PomUpdatePlanGenerator::new(&project.session);
            generator.set_force_update(self.config.force_update);
            rules.register(&mut generator, &findings, self.jdk_jars())?;
            generator.generate_plan(&mut report)?
        };
        info!(
            "plan ready: {} tag edits, {} modules with structural edits",
            plan.tag_edits.len(),
            plan.module_edits.len()
        );

        Ok(Planned {
            project,
            findings,
            plan,
            report,
        })
    }

    /// The plan of this project, without touching any file.
    pub fn preview(&self) -> AutofixResult<PlanSummary> {
        let planned = self.plan()?;
        Ok(planned.plan.summary(&planned.project.session))
    }

    fn pipeline(&self) -> AutofixResult<Pipeline> {
        let (from, to) = (self.config.from_version, self.config.to_version);
        let mut recipes: Vec<Box<dyn Recipe>> = vec![
            Box::new(PomUpdateRecipe),
            Box::new(OrderAnnotationProcessorPathsRecipe),
            Box::new(AddJdkMigrationCommentRecipe::new(to)),
        ];
        if from < 9 {
            recipes.push(Box::new(StreamCountRecipe::new().map_err(AutofixError::Recipe)?));
        }
        recipes.push(Box::new(TernaryBoxingRecipe::new().map_err(AutofixError::Recipe)?));
        if from < 11 {
            recipes.push(Box::new(SecurityManagerCheckRecipe::new().map_err(AutofixError::Recipe)?));
        }
        Ok(Pipeline::new(recipes))
    }

    pub fn execute(&self) -> AutofixResult<AutofixOutcome> {
        if !self.config.autofix {
            info!("autofix is disabled");
            let outcome = AutofixOutcome {
                unfixed: self.config.load_findings(&self.root)?,
                ..Default::default()
            };
            self.write_reports(&outcome)?;
            return Ok(outcome);
        }

        let Planned {
            project,
            findings,
            plan,
            mut report,
        } = self.plan()?;
        let pipeline = self.pipeline()?;
        let result = pipeline.run(project.sources, &plan, &mut report);
        for error in &result.errors {
            warn!("{} skipped: {}", error.path.display(), error.message);
        }

        let mut index = plan.fix_index();
        self.index_fixed_apis(&mut index, &pipeline, &result.touched);
        let (fixed, unfixed) = finding::partition(&findings, &index);

        let mut outcome = AutofixOutcome {
            fixed,
            unfixed,
            errors: result.errors,
            update_map: plan.update_map.clone(),
            ..Default::default()
        };
        if self.config.autofix_generate_patch {
            let patch = render_patch(&self.root, &result.changed)?;
            let path = self.config.resolve(&self.root, &self.config.autofix_file);
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            std::fs::write(&path, patch)?;
            info!("patch written to {}", path.display());
            outcome.patch_file = Some(path);
        } else {
            outcome.written = write_all(&result.changed)?;
        }

        outcome.fixed_infos = report.finish();
        if outcome.fixed_count() == 0 {
            info!("no issues were auto-fixed");
        } else {
            info!(
                "{} fixes applied, {} findings fixed, {} unfixed",
                outcome.fixed_count(),
                outcome.fixed.len(),
                outcome.unfixed.len()
            );
        }
        self.write_reports(&outcome)?;
        Ok(outcome)
    }

    /// Files rewritten per API, both as given and relative to the root.
    fn index_fixed_apis(&self, index: &mut FixIndex, pipeline: &Pipeline, touched: &BTreeMap<&'static str, Vec<PathBuf>>) {
        for recipe in pipeline.recipes() {
            let Some(files) = touched.get(recipe.name()) else {
                continue;
            };
            for api in recipe.fixed_apis() {
                let entry = index.fixed_apis.entry(api.to_string()).or_default();
                for file in files {
                    entry.insert(file.clone());
                    if let Ok(relative) = file.strip_prefix(&self.root) {
                        entry.insert(relative.to_path_buf());
                    }
                }
            }
        }
    }

    fn write_reports(&self, outcome: &AutofixOutcome) -> AutofixResult<()> {
        if let Some(file) = &self.config.fixed_report_file {
            write_json(&self.config.resolve(&self.root, file), &outcome.fixed_infos)?;
        }
        if let Some(file) = &self.config.unfixed_report_file {
            write_json(&self.config.resolve(&self.root, file), &outcome.unfixed)?;
        }
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> AutofixResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| AutofixError::Config(e.to_string()))?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, json)?;
    Ok(())
}

// ============================================================================
// 输出: patch / 直接写入 + 回滚
// ============================================================================

fn display_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Unified diffs of every changed file, separated by blank lines. Any
/// source that was not UTF-8 aborts the whole patch.
pub fn render_patch(root: &Path, changed: &[ChangedFile]) -> AutofixResult<String> {
    if let Some(file) = changed.iter().find(|c| c.before.charset() != Charset::Utf8) {
        return Err(AutofixError::NonUtf8Patch {
            path: file.before.path().to_path_buf(),
        });
    }
    let diffs: Vec<String> = changed
        .iter()
        .map(|file| {
            let name = display_path(root, file.before.path());
            let (before, after) = (file.before.print(), file.after.print());
            TextDiff::from_lines(&before, &after)
                .unified_diff()
                .context_radius(3)
                .header(&format!("a/{name}"), &format!("b/{name}"))
                .to_string()
        })
        .collect();
    Ok(diffs.join("\n"))
}

static XML_ENCODING: Lazy<Regex> = Lazy::new(|| {
    // 编译时常量，不会失败
    Regex::new(r#"^(\s*<\?xml\b[^?>]*?\bencoding\s*=\s*)(["'])[^"']*["']"#).unwrap()
});

/// Text written back in direct-write mode. A re-encoded XML file has its
/// declaration switched to UTF-8 along with the bytes.
fn utf8_output(file: &SourceFile) -> String {
    let text = file.print();
    match file {
        SourceFile::Xml(_) if file.charset() != Charset::Utf8 => {
            XML_ENCODING.replace(&text, "${1}${2}UTF-8${2}").into_owned()
        }
        _ => text,
    }
}

fn encode(text: &str, charset: Charset) -> Vec<u8> {
    match charset {
        Charset::Utf8 => text.as_bytes().to_vec(),
        Charset::Latin1 => text.chars().map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?')).collect(),
    }
}

fn restore(file: &ChangedFile) -> std::io::Result<()> {
    std::fs::write(file.before.path(), encode(&file.before.print(), file.before.charset()))
}

/// Rewrite every changed file as UTF-8. On the first failure, every file
/// written so far gets its original bytes back, the failing one too when it
/// is still a regular file.
pub fn write_all(changed: &[ChangedFile]) -> AutofixResult<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(changed.len());
    for (idx, file) in changed.iter().enumerate() {
        let path = file.after.path();
        if let Err(source) = std::fs::write(path, utf8_output(&file.after)) {
            warn!("unable to rewrite {}: {}, rolling back", path.display(), source);
            let rollback_failures: Vec<PathBuf> = changed[..=idx]
                .iter()
                .filter(|f| f.before.path() != path || path.is_file())
                .filter(|f| restore(f).is_err())
                .map(|f| f.before.path().to_path_buf())
                .collect();
            let path = path.to_path_buf();
            return Err(if rollback_failures.is_empty() {
                AutofixError::Write { path, source }
            } else {
                AutofixError::RollbackFailed {
                    path,
                    source,
                    rollback_failures,
                }
            });
        }
        written.push(path.to_path_buf());
    }
    info!("{} files rewritten", written.len());
    Ok(written)
}
