// ============================================================================
// 重写流水线 - Recipe trait, source files, ordered pipeline runner
// ============================================================================
//
// Every source file goes through every recipe in order. A recipe returns the
// file unchanged or a rewritten copy; a failing recipe drops that file from
// the results and the batch moves on.

pub mod add_dependency;
pub mod java;
pub mod migration_comment;
pub mod order_tag;
pub mod pom_update;

pub use add_dependency::{AddDependencyVisitor, ExcludeDependencyVisitor, RemoveDependencyVisitor};
pub use java::{SecurityManagerCheckRecipe, StreamCountRecipe, TernaryBoxingRecipe};
pub use migration_comment::AddJdkMigrationCommentRecipe;
pub use order_tag::{OrderAnnotationProcessorPathsRecipe, OrderTagVisitor};
pub use pom_update::PomUpdateRecipe;

use crate::maven::ModuleId;
use crate::plan::PomUpdatePlan;
use crate::report::{AutofixReport, Reporter, ReporterId};
use crate::xml::{visitor::run_visitor, XmlDocument, XmlVisitor};
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Encoding the file was read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    /// Not valid UTF-8, decoded byte-per-char.
    Latin1,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlSource {
    pub path: PathBuf,
    pub module: Option<ModuleId>,
    pub charset: Charset,
    pub document: XmlDocument,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JavaSource {
    pub path: PathBuf,
    pub module: Option<ModuleId>,
    pub charset: Charset,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceFile {
    Xml(XmlSource),
    Java(JavaSource),
}

impl SourceFile {
    pub fn path(&self) -> &Path {
        match self {
            SourceFile::Xml(x) => &x.path,
            SourceFile::Java(j) => &j.path,
        }
    }

    pub fn module(&self) -> Option<ModuleId> {
        match self {
            SourceFile::Xml(x) => x.module,
            SourceFile::Java(j) => j.module,
        }
    }

    pub fn charset(&self) -> Charset {
        match self {
            SourceFile::Xml(x) => x.charset,
            SourceFile::Java(j) => j.charset,
        }
    }

    pub fn print(&self) -> String {
        match self {
            SourceFile::Xml(x) => x.document.print(),
            SourceFile::Java(j) => j.text.clone(),
        }
    }
}

/// Per-visit state handed to a recipe.
pub struct RecipeContext<'a> {
    pub plan: &'a PomUpdatePlan,
    /// Reporters fired by the edits of this visit.
    pub fired: Vec<ReporterId>,
}

impl<'a> RecipeContext<'a> {
    pub fn new(plan: &'a PomUpdatePlan) -> Self {
        RecipeContext {
            plan,
            fired: Vec::new(),
        }
    }
}

pub trait Recipe {
    /// Stable key, used for reporter lookup.
    fn name(&self) -> &'static str;

    fn display_name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Reporter carried by the recipe itself.
    fn reporter(&self) -> Option<Reporter> {
        None
    }

    /// API names whose findings this recipe fixes.
    fn fixed_apis(&self) -> &'static [&'static str] {
        &[]
    }

    fn visit(&self, source: &SourceFile, ctx: &mut RecipeContext) -> Result<SourceFile>;
}

/// Run an XML visitor over a POM source; the source is returned unchanged
/// for other files.
pub(crate) fn visit_xml(
    source: &SourceFile,
    ctx: &mut RecipeContext,
    visitor: Box<dyn XmlVisitor>,
) -> Result<SourceFile> {
    let SourceFile::Xml(xml) = source else {
        return Ok(source.clone());
    };
    let outcome = run_visitor(xml.document.clone(), visitor, xml.module)?;
    ctx.fired.extend(outcome.fired);
    Ok(SourceFile::Xml(XmlSource {
        document: outcome.document,
        ..xml.clone()
    }))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileError {
    pub path: PathBuf,
    pub recipe: String,
    pub message: String,
}

/// A file whose final text differs from what was read.
#[derive(Debug, Clone)]
pub struct ChangedFile {
    pub before: SourceFile,
    pub after: SourceFile,
    pub recipes: Vec<&'static str>,
}

#[derive(Debug, Default)]
pub struct PipelineOutcome {
    pub changed: Vec<ChangedFile>,
    pub errors: Vec<FileError>,
    /// Recipe name -> files it rewrote.
    pub touched: BTreeMap<&'static str, Vec<PathBuf>>,
}

pub struct Pipeline {
    recipes: Vec<Box<dyn Recipe>>,
}

impl Pipeline {
    pub fn new(recipes: Vec<Box<dyn Recipe>>) -> Self {
        Pipeline { recipes }
    }

    pub fn recipes(&self) -> &[Box<dyn Recipe>] {
        &self.recipes
    }

    pub fn run(&self, sources: Vec<SourceFile>, plan: &PomUpdatePlan, report: &mut AutofixReport) -> PipelineOutcome {
        let mut outcome = PipelineOutcome::default();

        'files: for original in sources {
            let mut current = original.clone();
            let mut current_text = current.print();
            let mut recipes = Vec::new();

            for recipe in &self.recipes {
                let mut ctx = RecipeContext::new(plan);
                let next = match recipe.visit(&current, &mut ctx) {
                    Ok(next) => next,
                    Err(e) => {
                        warn!("{} failed on {}: {:#}", recipe.name(), original.path().display(), e);
                        outcome.errors.push(FileError {
                            path: original.path().to_path_buf(),
                            recipe: recipe.name().to_string(),
                            message: format!("{e:#}"),
                        });
                        continue 'files;
                    }
                };

                let next_text = next.print();
                if next_text == current_text {
                    continue;
                }
                debug!("{} changed {}", recipe.name(), original.path().display());

                let path = original.path();
                if ctx.fired.is_empty() {
                    if let Some(id) = report.reporter_for_recipe(recipe.as_ref()) {
                        report.report(id, Some(path));
                    }
                } else {
                    for id in ctx.fired {
                        report.report(id, Some(path));
                    }
                }
                outcome.touched.entry(recipe.name()).or_default().push(path.to_path_buf());
                recipes.push(recipe.name());
                current = next;
                current_text = next_text;
            }

            if current_text != original.print() {
                outcome.changed.push(ChangedFile {
                    before: original,
                    after: current,
                    recipes,
                });
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl Recipe for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }

        fn display_name(&self) -> &'static str {
            "Upper"
        }

        fn description(&self) -> &'static str {
            "uppercases Java sources"
        }

        fn reporter(&self) -> Option<Reporter> {
            Some(Reporter::new("upper", &[], crate::report::CountPolicy::DistinctFiles))
        }

        fn visit(&self, source: &SourceFile, _ctx: &mut RecipeContext) -> Result<SourceFile> {
            match source {
                SourceFile::Java(j) if j.text.contains("boom") => anyhow::bail!("cannot handle boom"),
                SourceFile::Java(j) => Ok(SourceFile::Java(JavaSource {
                    text: j.text.to_uppercase(),
                    ..j.clone()
                })),
                other => Ok(other.clone()),
            }
        }
    }

    fn java(path: &str, text: &str) -> SourceFile {
        SourceFile::Java(JavaSource {
            path: PathBuf::from(path),
            module: None,
            charset: Charset::Utf8,
            text: text.to_string(),
        })
    }

    #[test]
    fn test_pipeline_keeps_real_diffs_and_collects_errors() {
        let pipeline = Pipeline::new(vec![Box::new(Upper)]);
        let plan = PomUpdatePlan::default();
        let mut report = AutofixReport::new();
        let outcome = pipeline.run(
            vec![java("A.java", "class a {}"), java("B.java", "CLASS B {}"), java("C.java", "boom")],
            &plan,
            &mut report,
        );

        assert_eq!(outcome.changed.len(), 1);
        assert_eq!(outcome.changed[0].after.print(), "CLASS A {}");
        assert_eq!(outcome.changed[0].recipes, ["upper"]);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].path, PathBuf::from("C.java"));

        let infos = report.fixed_infos();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].count, 1);
    }
}
