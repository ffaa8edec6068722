// ============================================================================
// 修复统计 - Reporter policies + per-run AutofixReport ledger
// ============================================================================
//
// A reporter turns raw "this rule changed that file" events into one
// user-facing entry. The ledger owns every reporter of a run; recipes reach
// their reporter either directly (a recipe that carries one) or through a
// generator registered under the recipe name. Lookups are cached, misses
// included. `finish` drains the ledger at the end of the run.

pub mod finding;

pub use finding::{CheckResultContext, FindingKind, FixIndex};

use crate::recipe::Recipe;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ReporterId(pub usize);

/// How reported events turn into a fix count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountPolicy {
    /// Count 1 once fired, touched files listed.
    OnePerRecipe,
    /// Count 1 once fired, no file list.
    OnceNoFiles,
    /// Count = distinct files touched.
    DistinctFiles,
    /// The caller reports one logical fix; count 1.
    AlwaysOne,
    /// Covered by another entry, never reported.
    Suppressed,
}

#[derive(Debug, Clone)]
pub struct Reporter {
    fix_type: String,
    params: Vec<String>,
    policy: CountPolicy,
    files: BTreeSet<PathBuf>,
    fired: bool,
}

impl Reporter {
    pub fn new(fix_type: &str, params: &[&str], policy: CountPolicy) -> Self {
        Reporter {
            fix_type: fix_type.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            policy,
            files: BTreeSet::new(),
            fired: false,
        }
    }

    pub fn fix_type(&self) -> &str {
        &self.fix_type
    }

    pub fn policy(&self) -> CountPolicy {
        self.policy
    }

    pub fn report(&mut self, file: Option<&Path>) {
        self.fired = true;
        if let Some(file) = file {
            self.files.insert(file.to_path_buf());
        }
    }

    pub fn count(&self) -> usize {
        match self.policy {
            CountPolicy::Suppressed => 0,
            CountPolicy::DistinctFiles => self.files.len(),
            CountPolicy::OnePerRecipe | CountPolicy::OnceNoFiles | CountPolicy::AlwaysOne => {
                usize::from(self.fired)
            }
        }
    }

    pub fn fixed_info(&self) -> Option<FixedInfo> {
        let count = self.count();
        if count == 0 {
            return None;
        }
        let files = match self.policy {
            CountPolicy::OnceNoFiles => None,
            _ if self.files.is_empty() => None,
            _ => Some(self.files.iter().cloned().collect()),
        };
        Some(FixedInfo {
            fix_type: self.fix_type.clone(),
            params: self.params.clone(),
            count,
            files,
        })
    }
}

/// One rendered line of the "fixed" report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedInfo {
    pub fix_type: String,
    pub params: Vec<String>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<PathBuf>>,
}

type ReporterFactory = Box<dyn Fn() -> Reporter + Send + Sync>;

#[derive(Default)]
pub struct AutofixReport {
    reporters: Vec<Reporter>,
    generators: HashMap<String, ReporterFactory>,
    recipe_cache: HashMap<String, Option<ReporterId>>,
    ga_reporters: HashMap<String, ReporterId>,
}

impl AutofixReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, reporter: Reporter) -> ReporterId {
        let id = ReporterId(self.reporters.len());
        debug!("reporter {:?} registered: {}", id, reporter.fix_type);
        self.reporters.push(reporter);
        id
    }

    /// Fallback reporter for recipes that do not carry one.
    pub fn register_generator<F>(&mut self, recipe_name: &str, factory: F)
    where
        F: Fn() -> Reporter + Send + Sync + 'static,
    {
        self.generators.insert(recipe_name.to_string(), Box::new(factory));
    }

    pub fn reporter(&self, id: ReporterId) -> &Reporter {
        &self.reporters[id.0]
    }

    /// Reporter attributed to `recipe`: its own, else a registered generator.
    pub fn reporter_for_recipe(&mut self, recipe: &dyn Recipe) -> Option<ReporterId> {
        if let Some(cached) = self.recipe_cache.get(recipe.name()) {
            return *cached;
        }
        let reporter = recipe
            .reporter()
            .or_else(|| self.generators.get(recipe.name()).map(|factory| factory()));
        let id = reporter.map(|r| self.register(r));
        self.recipe_cache.insert(recipe.name().to_string(), id);
        id
    }

    /// One reporter per GA, created on first use.
    pub fn reporter_for_ga<F>(&mut self, key: &str, make: F) -> ReporterId
    where
        F: FnOnce() -> Reporter,
    {
        if let Some(id) = self.ga_reporters.get(key) {
            return *id;
        }
        let id = self.register(make());
        self.ga_reporters.insert(key.to_string(), id);
        id
    }

    pub fn report(&mut self, id: ReporterId, file: Option<&Path>) {
        if let Some(reporter) = self.reporters.get_mut(id.0) {
            reporter.report(file);
        }
    }

    /// Nonzero entries sorted by fix type, then params.
    pub fn fixed_infos(&self) -> Vec<FixedInfo> {
        let mut infos: Vec<FixedInfo> = self.reporters.iter().filter_map(Reporter::fixed_info).collect();
        infos.sort_by(|a, b| a.fix_type.cmp(&b.fix_type).then_with(|| a.params.cmp(&b.params)));
        infos
    }

    pub fn reset(&mut self) {
        self.reporters.clear();
        self.generators.clear();
        self.recipe_cache.clear();
        self.ga_reporters.clear();
    }

    /// Final entries of the run; the ledger is empty afterwards.
    pub fn finish(&mut self) -> Vec<FixedInfo> {
        let infos = self.fixed_infos();
        self.reset();
        infos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{Recipe, RecipeContext, SourceFile};

    #[test]
    fn test_distinct_files_policy() {
        let mut reporter = Reporter::new("stream_count", &[], CountPolicy::DistinctFiles);
        reporter.report(Some(Path::new("A.java")));
        reporter.report(Some(Path::new("A.java")));
        assert_eq!(reporter.count(), 1);
        reporter.report(Some(Path::new("B.java")));
        assert_eq!(reporter.count(), 2);
    }

    #[test]
    fn test_one_per_recipe_policy() {
        let mut reporter = Reporter::new("order", &[], CountPolicy::OnePerRecipe);
        assert_eq!(reporter.count(), 0);
        reporter.report(Some(Path::new("a/pom.xml")));
        reporter.report(Some(Path::new("b/pom.xml")));
        assert_eq!(reporter.count(), 1);
        assert_eq!(reporter.fixed_info().unwrap().files.unwrap().len(), 2);
    }

    #[test]
    fn test_once_no_files_and_suppressed() {
        let mut once = Reporter::new("x", &[], CountPolicy::OnceNoFiles);
        once.report(Some(Path::new("a")));
        let info = once.fixed_info().unwrap();
        assert_eq!(info.count, 1);
        assert!(info.files.is_none());

        let mut quiet = Reporter::new("y", &[], CountPolicy::Suppressed);
        quiet.report(Some(Path::new("a")));
        assert!(quiet.fixed_info().is_none());
    }

    #[test]
    fn test_fixed_infos_sorted_and_reset() {
        let mut report = AutofixReport::new();
        let b = report.register(Reporter::new("update", &["b:b", "2"], CountPolicy::AlwaysOne));
        let a = report.register(Reporter::new("update", &["a:a", "1"], CountPolicy::AlwaysOne));
        let z = report.register(Reporter::new("add", &["z:z"], CountPolicy::AlwaysOne));
        report.register(Reporter::new("never", &[], CountPolicy::AlwaysOne));
        for id in [b, a, z] {
            report.report(id, None);
        }
        let infos = report.finish();
        let keys: Vec<(&str, &str)> = infos
            .iter()
            .map(|i| (i.fix_type.as_str(), i.params[0].as_str()))
            .collect();
        assert_eq!(keys, [("add", "z:z"), ("update", "a:a"), ("update", "b:b")]);
        assert!(report.fixed_infos().is_empty());
    }

    #[test]
    fn test_reporter_for_ga_is_shared() {
        let mut report = AutofixReport::new();
        let first = report.reporter_for_ga("g:a", || Reporter::new("update", &["g:a"], CountPolicy::AlwaysOne));
        let second = report.reporter_for_ga("g:a", || Reporter::new("other", &[], CountPolicy::AlwaysOne));
        assert_eq!(first, second);
        assert_eq!(report.reporter(first).fix_type(), "update");
    }

    struct Plain(&'static str);

    impl Recipe for Plain {
        fn name(&self) -> &'static str {
            self.0
        }

        fn display_name(&self) -> &'static str {
            "plain"
        }

        fn description(&self) -> &'static str {
            "no reporter of its own"
        }

        fn visit(&self, source: &SourceFile, _ctx: &mut RecipeContext) -> anyhow::Result<SourceFile> {
            Ok(source.clone())
        }
    }

    #[test]
    fn test_recipe_lookup_uses_generators_and_caches_misses() {
        let mut report = AutofixReport::new();
        report.register_generator("with-generator", || {
            Reporter::new("generated", &[], CountPolicy::DistinctFiles)
        });

        let found = report.reporter_for_recipe(&Plain("with-generator")).unwrap();
        assert_eq!(report.reporter_for_recipe(&Plain("with-generator")), Some(found));
        assert_eq!(report.reporter(found).fix_type(), "generated");

        assert_eq!(report.reporter_for_recipe(&Plain("unknown")), None);
        report.register_generator("unknown", || Reporter::new("late", &[], CountPolicy::AlwaysOne));
        // negative entry is cached for the run
        assert_eq!(report.reporter_for_recipe(&Plain("unknown")), None);
    }
}
