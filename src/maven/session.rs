// ============================================================================
// MavenSession - 多模块会话: 模块链 / 依赖树 / 属性解析
// ============================================================================
//
// Created once per run from the scanned POMs, then completed with source
// counts and dependency trees before planning starts. Read-only afterwards.

use super::dependency_tree::{DependencyTree, DtNode, DtNodeId};
use super::resolution::{PomResolution, TagRef};
use crate::error::AutofixResult;
use crate::gatv::ga;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ModuleId(pub usize);

#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub packaging: String,
    /// Ownership parent, only when the parent POM is part of the session.
    pub parent: Option<ModuleId>,
    pub pom_path: PathBuf,
    pub resolution: PomResolution,
    pub java_source_count: usize,
    pub dependency_root: Option<DtNodeId>,
}

impl Module {
    pub fn ga(&self) -> String {
        ga(&self.group_id, &self.artifact_id)
    }

    pub fn dir(&self) -> &Path {
        self.pom_path.parent().unwrap_or_else(|| Path::new(""))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvePolicy {
    /// Only look at properties defined in the module itself.
    pub same_module_only: bool,
    /// Stop at placeholders whose property is shared between several GAs.
    pub per_dependency_version: bool,
}

/// Tag holding the literal a value ultimately comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSource {
    pub at: TagRef,
    pub value: String,
}

#[derive(Debug, Default)]
pub struct MavenSession {
    modules: Vec<Module>,
    tree: DependencyTree,
    shared_properties: BTreeSet<String>,
}

impl MavenSession {
    pub fn new(poms: Vec<(PathBuf, PomResolution)>) -> Self {
        let mut modules: Vec<Module> = poms
            .into_iter()
            .enumerate()
            .map(|(idx, (pom_path, resolution))| {
                let group_id = resolution.group_id().unwrap_or_default().to_string();
                let version = resolution.version().unwrap_or_default().to_string();
                if group_id.is_empty() || version.is_empty() {
                    warn!("{} has no resolvable groupId/version", pom_path.display());
                }
                Module {
                    id: ModuleId(idx),
                    group_id,
                    artifact_id: resolution.project.artifact.clone(),
                    version,
                    packaging: resolution.packaging().to_string(),
                    parent: None,
                    pom_path,
                    resolution,
                    java_source_count: 0,
                    dependency_root: None,
                }
            })
            .collect();

        let by_ga: BTreeMap<String, ModuleId> = modules.iter().map(|m| (m.ga(), m.id)).collect();
        for module in &mut modules {
            module.parent = module
                .resolution
                .parent
                .as_ref()
                .and_then(|p| by_ga.get(&p.ga()).copied())
                .filter(|parent| *parent != module.id);
        }

        let shared_properties = compute_shared_properties(&modules);
        debug!("shared version properties: {:?}", shared_properties);

        MavenSession {
            modules,
            tree: DependencyTree::new(),
            shared_properties,
        }
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0]
    }

    pub fn tree(&self) -> &DependencyTree {
        &self.tree
    }

    pub fn shared_properties(&self) -> &BTreeSet<String> {
        &self.shared_properties
    }

    pub fn find_module_by_ga(&self, key: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.ga() == key)
    }

    pub fn find_module_by_pom(&self, path: &Path) -> Option<&Module> {
        self.modules.iter().find(|m| m.pom_path == path)
    }

    /// `true` when `key` names one of the session's own modules.
    pub fn is_session_module(&self, key: &str) -> bool {
        self.find_module_by_ga(key).is_some()
    }

    /// The module followed by its ancestors, nearest first.
    pub fn chain(&self, id: ModuleId) -> Vec<ModuleId> {
        let mut out = vec![id];
        let mut current = self.module(id).parent;
        while let Some(parent) = current {
            if out.contains(&parent) {
                break;
            }
            out.push(parent);
            current = self.module(parent).parent;
        }
        out
    }

    pub fn ancestors(&self, id: ModuleId) -> Vec<ModuleId> {
        self.chain(id).into_iter().skip(1).collect()
    }

    /// Topmost module of the ownership chain.
    pub fn root_module(&self, id: ModuleId) -> ModuleId {
        self.chain(id).last().copied().unwrap_or(id)
    }

    pub fn children(&self, id: ModuleId) -> impl Iterator<Item = ModuleId> + '_ {
        self.modules
            .iter()
            .filter(move |m| m.parent == Some(id))
            .map(|m| m.id)
    }

    /// The module or one of its descendants owns Java sources.
    pub fn has_sources(&self, id: ModuleId) -> bool {
        self.modules
            .iter()
            .any(|m| m.java_source_count > 0 && self.chain(m.id).contains(&id))
    }

    /// Every dependency node of every module, pre-order per module.
    pub fn visit_all(&self) -> Vec<(DtNodeId, ModuleId)> {
        self.modules
            .iter()
            .filter_map(|m| m.dependency_root.map(|root| (root, m.id)))
            .flat_map(|(root, module)| self.tree.walk(root).into_iter().map(move |n| (n, module)))
            .collect()
    }

    pub fn node(&self, id: DtNodeId) -> &DtNode {
        self.tree.node(id)
    }

    // ------------------------------------------------------------------------
    // 源码归属
    // ------------------------------------------------------------------------

    /// Module whose directory is the longest prefix of `path`.
    pub fn owner_of(&self, path: &Path) -> Option<ModuleId> {
        self.modules
            .iter()
            .filter(|m| path.starts_with(m.dir()))
            .max_by_key(|m| m.dir().components().count())
            .map(|m| m.id)
    }

    /// Count Java sources per module.
    pub fn assign_sources<'a, I>(&mut self, sources: I)
    where
        I: IntoIterator<Item = &'a Path>,
    {
        for path in sources {
            if let Some(owner) = self.owner_of(path) {
                self.modules[owner.0].java_source_count += 1;
            }
        }
    }

    // ------------------------------------------------------------------------
    // 依赖树
    // ------------------------------------------------------------------------

    /// Attach the trees of a `dependency:tree` dump to their modules.
    pub fn load_tree_dump(&mut self, text: &str) -> AutofixResult<()> {
        let roots = self.tree.parse_dump(text)?;
        for root in roots {
            let key = self.tree.node(root).ga();
            let Some(module) = self.find_module_by_ga(&key).map(|m| m.id) else {
                warn!("dependency tree root {} does not belong to any module, skipped", key);
                continue;
            };
            let slot = &mut self.modules[module.0].dependency_root;
            if slot.is_some() {
                warn!("duplicate dependency tree for {}, keeping the first", key);
                continue;
            }
            *slot = Some(root);
        }
        Ok(())
    }

    /// Shallow trees built from declared dependencies when no dump is available.
    pub fn derive_declared_trees(&mut self) {
        for idx in 0..self.modules.len() {
            let id = ModuleId(idx);
            if self.modules[idx].dependency_root.is_some() {
                continue;
            }
            let module = &self.modules[idx];
            let root = DtNode::new(
                &module.group_id,
                &module.artifact_id,
                &module.packaging,
                &module.version,
                None,
            );

            let mut seen = HashSet::new();
            let mut children = Vec::new();
            for owner in self.chain(id) {
                for dep in &self.module(owner).resolution.dependencies {
                    if !seen.insert(dep.ga()) {
                        continue;
                    }
                    let Some(version) = self.declared_version(id, &dep.ga(), dep.version.as_deref()) else {
                        debug!("{}: version of {} not resolvable", self.module(id).ga(), dep.ga());
                        continue;
                    };
                    let mut node = DtNode::new(
                        &dep.group,
                        &dep.artifact,
                        &dep.type_,
                        &version,
                        Some(dep.scope.as_deref().unwrap_or("compile")),
                    );
                    node.classifier = dep.classifier.clone();
                    children.push(node);
                }
            }

            let root = self.tree.add_root(root);
            for child in children {
                self.tree.add_child(root, child);
            }
            self.modules[idx].dependency_root = Some(root);
        }
    }

    fn declared_version(&self, module: ModuleId, key: &str, explicit: Option<&str>) -> Option<String> {
        if let Some(version) = explicit {
            return self.expand(module, version);
        }
        self.chain(module).into_iter().find_map(|owner| {
            self.module(owner)
                .resolution
                .managed_with_ga(key)
                .filter(|d| !d.is_import())
                .find_map(|d| d.version.as_deref())
                .and_then(|v| self.expand(module, v))
        })
    }

    // ------------------------------------------------------------------------
    // 属性解析
    // ------------------------------------------------------------------------

    /// Follow `${...}` indirection from `origin` to the tag defining the literal.
    ///
    /// Returns `origin` itself for literals, and for placeholders naming a
    /// shared property when `per_dependency_version` is set. `None` when the
    /// chain leaves the session, loops, or ends in a composite value.
    pub fn resolve_value_source(&self, origin: TagRef, value: &str, policy: ResolvePolicy) -> Option<ValueSource> {
        let base = origin.module;
        let mut visited = HashSet::new();
        let mut at = origin;
        let mut value = value.trim().to_string();

        loop {
            if !value.contains("${") {
                return Some(ValueSource { at, value });
            }
            let name = placeholder_name(&value)?;
            if policy.per_dependency_version && self.shared_properties.contains(name) {
                return Some(ValueSource { at, value });
            }
            if !visited.insert(name.to_string()) {
                warn!("property cycle through ${{{}}}", name);
                return None;
            }
            let (next_at, next_value) = self.property_definition(base, name, policy.same_module_only)?;
            at = next_at;
            value = next_value.trim().to_string();
        }
    }

    fn property_definition(&self, base: ModuleId, name: &str, same_module_only: bool) -> Option<(TagRef, String)> {
        let module = self.module(base);
        match name {
            "project.version" | "pom.version" | "version" => {
                let project = &module.resolution.project;
                if let (Some(tag), Some(version)) = (project.version_tag, project.version.as_ref()) {
                    return Some((TagRef::new(base, tag), version.clone()));
                }
                // inherited from <parent>
                let parent = module.resolution.parent.as_ref()?;
                return Some((TagRef::new(base, parent.version_tag?), parent.version.clone()));
            }
            "project.parent.version" | "parent.version" => {
                let parent = module.resolution.parent.as_ref()?;
                return Some((TagRef::new(base, parent.version_tag?), parent.version.clone()));
            }
            _ => {}
        }

        let chain = if same_module_only { vec![base] } else { self.chain(base) };
        chain.into_iter().find_map(|owner| {
            self.module(owner)
                .resolution
                .property(name)
                .map(|p| (TagRef::new(owner, p.tag), p.value.clone()))
        })
    }

    /// Expand every placeholder in `value` to its literal, as seen from `module`.
    pub fn expand(&self, module: ModuleId, value: &str) -> Option<String> {
        let mut out = value.to_string();
        for _ in 0..16 {
            if !out.contains("${") {
                return Some(out);
            }
            let mut expanded = String::with_capacity(out.len());
            let mut last = 0;
            for caps in PLACEHOLDER.captures_iter(&out) {
                let (whole, name) = (caps.get(0)?, caps.get(1)?);
                let (_, literal) = self.property_definition(module, name.as_str(), false)?;
                expanded.push_str(&out[last..whole.start()]);
                expanded.push_str(&literal);
                last = whole.end();
            }
            if last == 0 {
                return None;
            }
            expanded.push_str(&out[last..]);
            out = expanded;
        }
        None
    }
}

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    // 编译时常量，不会失败
    Regex::new(r"\$\{([^${}]+)\}").unwrap()
});

/// `name` for a value that is exactly `${name}`.
fn placeholder_name(value: &str) -> Option<&str> {
    let caps = PLACEHOLDER.captures(value)?;
    let whole = caps.get(0)?;
    if whole.start() != 0 || whole.end() != value.len() {
        return None;
    }
    caps.get(1).map(|m| m.as_str())
}

/// Property names used as the version of more than one distinct GA.
fn compute_shared_properties(modules: &[Module]) -> BTreeSet<String> {
    let mut users: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    for module in modules {
        let res = &module.resolution;
        let versions = res
            .dependencies
            .iter()
            .chain(&res.managed_dependencies)
            .map(|d| (d.ga(), d.version.as_deref()))
            .chain(res.plugins.iter().map(|p| (p.ga(), p.version.as_deref())));
        for (key, version) in versions {
            if let Some(name) = version.and_then(placeholder_name) {
                users.entry(name).or_default().insert(key);
            }
        }
    }
    users
        .into_iter()
        .filter(|(_, gas)| gas.len() > 1)
        .map(|(name, _)| name.to_string())
        .collect()
}
