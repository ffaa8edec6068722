// ============================================================================
// PomUpdatePlanGenerator - 计算跨模块一致的 POM 编辑计划
// ============================================================================
//
// Intents are recorded through the builder methods, then `generate_plan`
// runs the passes in a fixed order:
//
//   1. version / coordinate updates (explicit, rule-derived, add bumps)
//   2. scoped singleton tags (BOM imports, parent, module version, plugins)
//   3. additions at the root of each ownership chain
//   4. removals and exclusions
//
// The generator never mutates its inputs, so generating twice over the same
// session yields the same plan.

use super::{PomUpdatePlan, StructuralEdit, TagEditKind};
use crate::error::{AutofixError, AutofixResult};
use crate::gatv::Gatv;
use crate::maven::{
    DependencyEntry, DependencyUpdateRule, DtNode, DtNodeMatcher, JdkInternalJarMatcher, MavenSession, ModuleId,
    ResolvePolicy, TagRef,
};
use crate::report::{AutofixReport, CountPolicy, Reporter};
use crate::version::should_update;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

const PER_DEPENDENCY: ResolvePolicy = ResolvePolicy {
    same_module_only: false,
    per_dependency_version: true,
};

/// What the exclusion pass removes.
#[derive(Debug, Clone)]
pub enum ExclusionTarget {
    Node(DtNodeMatcher),
    JdkInternal(JdkInternalJarMatcher),
}

impl ExclusionTarget {
    fn matches_node(&self, node: &DtNode) -> bool {
        match self {
            ExclusionTarget::Node(matcher) => matcher.matches(node),
            ExclusionTarget::JdkInternal(matcher) => matcher.matches(node),
        }
    }

    fn matches_entry(&self, entry: &DependencyEntry) -> bool {
        match self {
            ExclusionTarget::Node(_) => false,
            ExclusionTarget::JdkInternal(matcher) => {
                entry.scope.as_deref() == Some("system")
                    && entry
                        .system_path
                        .as_deref()
                        .is_some_and(|p| matcher.matches_system_path(p))
            }
        }
    }
}

#[derive(Debug, Clone)]
struct AddIntent {
    gatv: Gatv,
    scope: Option<String>,
}

pub struct PomUpdatePlanGenerator<'a> {
    session: &'a MavenSession,
    force_update: bool,
    updates: Vec<(Gatv, Gatv)>,
    rules: Vec<DependencyUpdateRule>,
    adds: Vec<AddIntent>,
    import_updates: Vec<Gatv>,
    parent_updates: Vec<Gatv>,
    self_updates: Vec<Gatv>,
    plugin_updates: Vec<Gatv>,
    exclusions: Vec<ExclusionTarget>,
    /// GATV -> modules whose own tree pulls it in.
    gatv_index: BTreeMap<String, BTreeSet<ModuleId>>,
    /// GA -> modules that see it anywhere in their tree.
    ga_index: BTreeMap<String, BTreeSet<ModuleId>>,
}

impl<'a> PomUpdatePlanGenerator<'a> {
    pub fn new(session: &'a MavenSession) -> Self {
        let mut gatv_index: BTreeMap<String, BTreeSet<ModuleId>> = BTreeMap::new();
        let mut ga_index: BTreeMap<String, BTreeSet<ModuleId>> = BTreeMap::new();
        let tree = session.tree();

        for (node_id, module) in session.visit_all() {
            let node = tree.node(node_id);
            if node.parent().is_none() {
                continue;
            }
            ga_index.entry(node.ga()).or_default().insert(module);

            if session.is_session_module(&node.ga()) {
                continue;
            }
            // nodes pulled in through another session module are fixed there
            let ups = tree.ancestors(node_id);
            let through_module = ups
                .iter()
                .take(ups.len().saturating_sub(1))
                .any(|id| session.is_session_module(&tree.node(*id).ga()));
            if !through_module {
                gatv_index.entry(node.to_gatv().to_string()).or_default().insert(module);
            }
        }

        PomUpdatePlanGenerator {
            session,
            force_update: false,
            updates: Vec::new(),
            rules: Vec::new(),
            adds: Vec::new(),
            import_updates: Vec::new(),
            parent_updates: Vec::new(),
            self_updates: Vec::new(),
            plugin_updates: Vec::new(),
            exclusions: Vec::new(),
            gatv_index,
            ga_index,
        }
    }

    pub fn session(&self) -> &MavenSession {
        self.session
    }

    /// Allow edits that do not move a version forward.
    pub fn set_force_update(&mut self, force: bool) {
        self.force_update = force;
    }

    pub fn update_dependency(&mut self, from: &str, to: &str) -> AutofixResult<()> {
        self.updates.push((Gatv::parse(from)?, Gatv::parse(to)?));
        Ok(())
    }

    pub fn update_by_rule(&mut self, rule: DependencyUpdateRule) {
        self.rules.push(rule);
    }

    pub fn add_dependency(&mut self, gatv: &str, scope: Option<&str>) -> AutofixResult<()> {
        self.adds.push(AddIntent {
            gatv: Gatv::parse(gatv)?,
            scope: scope.map(str::to_string),
        });
        Ok(())
    }

    pub fn update_import_dependency(&mut self, gatv: &str) -> AutofixResult<()> {
        self.import_updates.push(Gatv::parse(gatv)?);
        Ok(())
    }

    pub fn update_parent_dependency(&mut self, gatv: &str) -> AutofixResult<()> {
        self.parent_updates.push(Gatv::parse(gatv)?);
        Ok(())
    }

    pub fn update_module_self_dependency(&mut self, gatv: &str) -> AutofixResult<()> {
        self.self_updates.push(Gatv::parse(gatv)?);
        Ok(())
    }

    pub fn update_plugin(&mut self, gatv: &str) -> AutofixResult<()> {
        self.plugin_updates.push(Gatv::parse(gatv)?);
        Ok(())
    }

    pub fn exclude_dependency(&mut self, target: ExclusionTarget) {
        self.exclusions.push(target);
    }

    /// `true` when some module's tree holds a node matching `pred`.
    pub fn any_node<F>(&self, pred: F) -> bool
    where
        F: Fn(&DtNode) -> bool,
    {
        self.session
            .visit_all()
            .into_iter()
            .map(|(id, _)| self.session.node(id))
            .any(|node| node.parent().is_some() && pred(node))
    }

    pub fn generate_plan(&self, report: &mut AutofixReport) -> AutofixResult<PomUpdatePlan> {
        let mut plan = PomUpdatePlan::default();

        for (from, to) in self.collect_updates()? {
            self.plan_update(&mut plan, report, &from, &to);
        }
        self.plan_scoped(&mut plan, report);
        self.plan_adds(&mut plan, report);
        self.plan_exclusions(&mut plan, report);

        debug!(
            "plan: {} tag edits, {} modules with structural edits",
            plan.tag_edits.len(),
            plan.module_edits.len()
        );
        Ok(plan)
    }

    // ------------------------------------------------------------------------
    // 1. 版本 / 坐标更新
    // ------------------------------------------------------------------------

    fn collect_updates(&self) -> AutofixResult<BTreeMap<Gatv, Gatv>> {
        let mut out: BTreeMap<Gatv, Gatv> = BTreeMap::new();
        for (from, to) in &self.updates {
            match out.get(from) {
                Some(existing) if existing != to => {
                    return Err(AutofixError::Plan(format!(
                        "conflicting updates for {from}: {existing} and {to}"
                    )));
                }
                _ => {
                    out.insert(from.clone(), to.clone());
                }
            }
        }

        for (node_id, _) in self.session.visit_all() {
            let node = self.session.node(node_id);
            if node.parent().is_none() {
                continue;
            }
            if let Some(rule) = self.rules.iter().find(|r| r.matches(node)) {
                out.entry(node.to_gatv()).or_insert_with(|| rule.target(node));
            }
            // an add intent also bumps older copies of the same GA
            for add in &self.adds {
                if node.ga() == add.gatv.ga() && should_update(&node.version, &add.gatv.version) {
                    out.entry(node.to_gatv())
                        .or_insert_with(|| node.to_gatv().with_version(&add.gatv.version));
                }
            }
        }

        out.retain(|from, _| !self.session.is_session_module(&from.ga()));
        Ok(out)
    }

    fn plan_update(&self, plan: &mut PomUpdatePlan, report: &mut AutofixReport, from: &Gatv, to: &Gatv) {
        let Some(modules) = self.gatv_index.get(&from.to_string()) else {
            debug!("{} not found in any dependency tree", from);
            return;
        };
        let key = format!("update:{}", from.ga());
        let from_ga = from.ga();
        let to_ga = to.ga();
        let make = || {
            if from.same_ga(to) {
                Reporter::new("dependency_update", &[&from_ga, &to.version], CountPolicy::OnePerRecipe)
            } else {
                Reporter::new("dependency_replace", &[&from_ga, &to_ga, &to.version], CountPolicy::OnePerRecipe)
            }
        };

        let mut landed = false;
        for &module in modules {
            match self.version_site(module, from) {
                Some((origin, raw)) => {
                    landed |= self.save_resolved(plan, report, origin, &raw, &to.version, &key, &make);
                }
                None => {
                    landed = true;
                    let root = self.session.root_module(module);
                    let reporter = report.reporter_for_ga(&key, &make);
                    push_unique(
                        plan,
                        root,
                        StructuralEdit::AddManagedDependency {
                            group: to.group.clone(),
                            artifact: to.artifact.clone(),
                            type_: to.type_.clone(),
                            version: to.version.clone(),
                            reporter,
                        },
                    );
                }
            }

            if !from.same_ga(to) {
                landed |= self.plan_ga_change(plan, report, module, from, to, &key, &make);
            }
        }

        // only edits that land count as fixes
        if landed {
            plan.update_map.insert(from.to_string(), to.to_string());
        } else {
            debug!("{} -> {}: nothing to edit", from, to);
        }
    }

    /// Where the version of `from` is written for `module`: a direct
    /// dependency, then a managed entry up the chain, then a direct
    /// dependency of an ancestor.
    fn version_site(&self, module: ModuleId, from: &Gatv) -> Option<(TagRef, String)> {
        let key = from.ga();
        let site = |m: ModuleId, entry: &DependencyEntry| -> Option<(TagRef, String)> {
            Some((TagRef::new(m, entry.version_tag?), entry.version.clone()?))
        };
        let res = |m: ModuleId| &self.session.module(m).resolution;

        let direct = res(module)
            .dependencies_with_ga(&key)
            .filter(|d| d.type_ == from.type_)
            .find_map(|d| site(module, d));
        direct
            .or_else(|| {
                self.session.chain(module).into_iter().find_map(|m| {
                    res(m)
                        .managed_with_ga(&key)
                        .filter(|d| !d.is_import() && d.type_ == from.type_)
                        .find_map(|d| site(m, d))
                })
            })
            .or_else(|| {
                self.session.ancestors(module).into_iter().find_map(|m| {
                    res(m)
                        .dependencies_with_ga(&key)
                        .filter(|d| d.type_ == from.type_)
                        .find_map(|d| site(m, d))
                })
            })
    }

    #[allow(clippy::too_many_arguments)]
    fn plan_ga_change<F>(
        &self,
        plan: &mut PomUpdatePlan,
        report: &mut AutofixReport,
        module: ModuleId,
        from: &Gatv,
        to: &Gatv,
        key: &str,
        make: &F,
    ) -> bool
    where
        F: Fn() -> Reporter,
    {
        let mut landed = false;
        let (from_ga, to_ga) = (from.ga(), to.ga());
        for m in self.session.chain(module) {
            let res = &self.session.module(m).resolution;
            for list in [&res.dependencies, &res.managed_dependencies] {
                let has_new = list.iter().any(|d| d.ga() == to_ga);
                for entry in list.iter().filter(|d| d.ga() == from_ga) {
                    let kind = if has_new {
                        TagEditKind::Remove
                    } else {
                        TagEditKind::ChangeGa {
                            group: to.group.clone(),
                            artifact: to.artifact.clone(),
                        }
                    };
                    landed |= self.save_tag_update_plan(plan, report, TagRef::new(m, entry.tag), "", kind, key, make);
                }
            }
        }
        landed
    }

    // ------------------------------------------------------------------------
    // 2. 单例标签: import / parent / 模块自身版本 / 插件
    // ------------------------------------------------------------------------

    fn plan_scoped(&self, plan: &mut PomUpdatePlan, report: &mut AutofixReport) {
        for target in &self.import_updates {
            let key = format!("import:{}", target.ga());
            let make = || Reporter::new("import_update", &[&target.ga(), &target.version], CountPolicy::AlwaysOne);
            for module in self.session.modules() {
                let imports = module
                    .resolution
                    .managed_dependencies
                    .iter()
                    .filter(|d| d.is_import() && d.ga() == target.ga());
                for entry in imports {
                    if let (Some(tag), Some(raw)) = (entry.version_tag, entry.version.as_deref()) {
                        self.save_resolved(plan, report, TagRef::new(module.id, tag), raw, &target.version, &key, &make);
                    }
                }
            }
        }

        for target in &self.parent_updates {
            let key = format!("parent:{}", target.ga());
            let make = || Reporter::new("parent_update", &[&target.ga(), &target.version], CountPolicy::AlwaysOne);
            for module in self.session.modules() {
                let Some(parent) = module.resolution.parent.as_ref().filter(|p| p.ga() == target.ga()) else {
                    continue;
                };
                if let Some(tag) = parent.version_tag {
                    let kind = TagEditKind::SetValue {
                        value: target.version.clone(),
                    };
                    self.save_tag_update_plan(plan, report, TagRef::new(module.id, tag), &parent.version, kind, &key, &make);
                }
            }
        }

        for target in &self.self_updates {
            let key = format!("self:{}", target.ga());
            let make = || Reporter::new("module_version_update", &[&target.ga(), &target.version], CountPolicy::AlwaysOne);
            for module in self.session.modules().iter().filter(|m| m.ga() == target.ga()) {
                let project = &module.resolution.project;
                if let (Some(tag), Some(raw)) = (project.version_tag, project.version.as_deref()) {
                    self.save_resolved(plan, report, TagRef::new(module.id, tag), raw, &target.version, &key, &make);
                }
            }
        }

        for target in &self.plugin_updates {
            let key = format!("plugin:{}", target.ga());
            let make = || Reporter::new("plugin_update", &[&target.ga(), &target.version], CountPolicy::AlwaysOne);
            for module in self.session.modules() {
                for plugin in module.resolution.plugins.iter().filter(|p| p.ga() == target.ga()) {
                    if let (Some(tag), Some(raw)) = (plugin.version_tag, plugin.version.as_deref()) {
                        self.save_resolved(plan, report, TagRef::new(module.id, tag), raw, &target.version, &key, &make);
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // 3. 新增依赖
    // ------------------------------------------------------------------------

    fn plan_adds(&self, plan: &mut PomUpdatePlan, report: &mut AutofixReport) {
        let mut seen = BTreeSet::new();
        for add in &self.adds {
            let key = add.gatv.ga();
            if !seen.insert(key.clone()) {
                continue;
            }

            let mut roots = BTreeSet::new();
            let mut satisfied = false;
            for module in self.session.modules() {
                let in_tree = self.ga_index.get(&key).is_some_and(|ms| ms.contains(&module.id));
                if in_tree || module.resolution.dependencies_with_ga(&key).next().is_some() {
                    satisfied = true;
                    continue;
                }
                let root = self.session.root_module(module.id);
                if !self.session.has_sources(root) {
                    debug!("{}: no Java sources, {} not added", self.session.module(root).ga(), key);
                    continue;
                }
                roots.insert(root);
            }

            if satisfied || !roots.is_empty() {
                plan.ensured.insert(key.clone());
            }
            if roots.is_empty() {
                continue;
            }

            let reporter = report.reporter_for_ga(&format!("add:{key}"), || {
                Reporter::new("dependency_add", &[&key, &add.gatv.version], CountPolicy::AlwaysOne)
            });
            for root in roots {
                push_unique(
                    plan,
                    root,
                    StructuralEdit::AddDependency {
                        group: add.gatv.group.clone(),
                        artifact: add.gatv.artifact.clone(),
                        type_: add.gatv.type_.clone(),
                        version: add.gatv.version.clone(),
                        scope: add.scope.clone(),
                        reporter,
                    },
                );
            }
            plan.newly_added.insert(add.gatv.to_string());
        }
    }

    // ------------------------------------------------------------------------
    // 4. 移除 / 排除
    // ------------------------------------------------------------------------

    fn plan_exclusions(&self, plan: &mut PomUpdatePlan, report: &mut AutofixReport) {
        if self.exclusions.is_empty() {
            return;
        }
        let tree = self.session.tree();

        for (node_id, module) in self.session.visit_all() {
            let node = tree.node(node_id);
            let Some(parent) = node.parent() else {
                continue;
            };
            if !self.exclusions.iter().any(|e| e.matches_node(node)) {
                continue;
            }
            let excluded = node.ga();
            let make = || Reporter::new("dependency_exclude", &[&excluded], CountPolicy::OnePerRecipe);
            let key = format!("exclude:{excluded}");

            if tree.node(parent).parent().is_none() {
                if let Some(owner) = self.declaring_module(module, &excluded) {
                    let reporter = report.reporter_for_ga(&key, make);
                    push_unique(plan, owner, StructuralEdit::RemoveDependency { ga: excluded.clone(), reporter });
                    plan.removed.insert(excluded);
                }
                continue;
            }

            // climb to the direct dependency; another session module owns the fix
            let ups = tree.ancestors(node_id);
            let path = &ups[..ups.len().saturating_sub(1)];
            if path.iter().any(|id| self.session.is_session_module(&tree.node(*id).ga())) {
                continue;
            }
            let Some(&top) = path.last() else {
                continue;
            };
            let on = tree.node(top).ga();
            let Some(owner) = self.declaring_module(module, &on) else {
                debug!("{} is not declared in the chain of {}", on, self.session.module(module).ga());
                continue;
            };
            let already = self
                .session
                .module(owner)
                .resolution
                .dependencies_with_ga(&on)
                .any(|d| d.exclusions.contains(&excluded));
            if !already {
                let reporter = report.reporter_for_ga(&key, make);
                push_unique(
                    plan,
                    owner,
                    StructuralEdit::ExcludeDependency {
                        on,
                        exclude: excluded.clone(),
                        reporter,
                    },
                );
            }
            plan.removed.insert(excluded);
        }

        // system-scoped declarations that point into the JDK itself
        for module in self.session.modules() {
            for entry in &module.resolution.dependencies {
                if !self.exclusions.iter().any(|e| e.matches_entry(entry)) {
                    continue;
                }
                let key = entry.ga();
                let reporter = report.reporter_for_ga(&format!("exclude:{key}"), || {
                    Reporter::new("dependency_exclude", &[&key], CountPolicy::OnePerRecipe)
                });
                push_unique(plan, module.id, StructuralEdit::RemoveDependency { ga: key.clone(), reporter });
                plan.removed.insert(key);
            }
        }
    }

    fn declaring_module(&self, module: ModuleId, key: &str) -> Option<ModuleId> {
        self.session
            .chain(module)
            .into_iter()
            .find(|m| self.session.module(*m).resolution.dependencies_with_ga(key).next().is_some())
    }

    // ------------------------------------------------------------------------
    // 保存
    // ------------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn save_resolved<F>(
        &self,
        plan: &mut PomUpdatePlan,
        report: &mut AutofixReport,
        origin: TagRef,
        raw: &str,
        version: &str,
        key: &str,
        make: &F,
    ) -> bool
    where
        F: Fn() -> Reporter,
    {
        let (at, current) = match self.session.resolve_value_source(origin, raw, PER_DEPENDENCY) {
            Some(source) => (source.at, source.value),
            None => {
                debug!("{} cannot be resolved, rewriting it in place", raw);
                (origin, raw.to_string())
            }
        };
        let kind = TagEditKind::SetValue {
            value: version.to_string(),
        };
        self.save_tag_update_plan(plan, report, at, &current, kind, key, make)
    }

    /// First writer wins. Value edits are skipped when nothing changes or
    /// when the current version is not older (unless forced). Returns true
    /// when the tag ends up carrying `kind`, including an identical edit
    /// saved earlier by another module of the same update.
    #[allow(clippy::too_many_arguments)]
    fn save_tag_update_plan<F>(
        &self,
        plan: &mut PomUpdatePlan,
        report: &mut AutofixReport,
        at: TagRef,
        current: &str,
        kind: TagEditKind,
        key: &str,
        make: &F,
    ) -> bool
    where
        F: Fn() -> Reporter,
    {
        if let Some(existing) = plan.tag_edits.get(&at) {
            return existing.kind == kind;
        }
        if let TagEditKind::SetValue { value } = &kind {
            let effective = if current.contains("${") {
                self.session.expand(at.module, current).unwrap_or_else(|| current.to_string())
            } else {
                current.to_string()
            };
            if effective == *value || current == value {
                return false;
            }
            if !self.force_update && !should_update(&effective, value) {
                debug!("{} is not older than {}, left alone", effective, value);
                return false;
            }
        }
        let reporter = report.reporter_for_ga(key, make);
        plan.tag_edits.insert(at, super::TagEdit { kind, reporter });
        true
    }
}

fn push_unique(plan: &mut PomUpdatePlan, module: ModuleId, edit: StructuralEdit) {
    let edits = plan.module_edits.entry(module).or_default();
    if !edits.contains(&edit) {
        edits.push(edit);
    }
}
