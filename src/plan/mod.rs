// ============================================================================
// PomUpdatePlan - 计划: 标签级编辑 + 模块级结构编辑
// ============================================================================
//
// Tag edits are keyed by (module, tag id) of the snapshot the plan was
// computed from; each tag carries at most one edit. Structural edits
// (additions, exclusions, removals) are listed per module and run after the
// tag edits of that POM.

pub mod generator;

pub use generator::{ExclusionTarget, PomUpdatePlanGenerator};

use crate::gatv::truncate_to_ga;
use crate::maven::{MavenSession, ModuleId, TagRef};
use crate::report::{FixIndex, ReporterId};
use crate::xml::TagId;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TagEditKind {
    /// Replace the text of a leaf tag.
    SetValue { value: String },
    /// Rewrite the groupId/artifactId children of a dependency tag.
    ChangeGa { group: String, artifact: String },
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagEdit {
    #[serde(flatten)]
    pub kind: TagEditKind,
    pub reporter: ReporterId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StructuralEdit {
    /// `<dependency>` under `project/dependencies`.
    AddDependency {
        group: String,
        artifact: String,
        #[serde(rename = "type")]
        type_: String,
        version: String,
        scope: Option<String>,
        reporter: ReporterId,
    },
    /// `<dependency>` under `project/dependencyManagement/dependencies`.
    AddManagedDependency {
        group: String,
        artifact: String,
        #[serde(rename = "type")]
        type_: String,
        version: String,
        reporter: ReporterId,
    },
    /// `<exclusion>` of `exclude` on the direct dependency `on` (both GAs).
    ExcludeDependency {
        on: String,
        exclude: String,
        reporter: ReporterId,
    },
    /// Drop the direct dependency with this GA.
    RemoveDependency { ga: String, reporter: ReporterId },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PomUpdatePlan {
    pub tag_edits: BTreeMap<TagRef, TagEdit>,
    pub module_edits: BTreeMap<ModuleId, Vec<StructuralEdit>>,
    /// `fromGATV -> toGATV` for every planned update.
    pub update_map: BTreeMap<String, String>,
    /// GATVs added for the migration, bracketed by migration comments.
    pub newly_added: BTreeSet<String>,
    /// GAs of add intents that are satisfied after the run.
    pub ensured: BTreeSet<String>,
    /// GAs removed or excluded.
    pub removed: BTreeSet<String>,
}

impl PomUpdatePlan {
    pub fn is_empty(&self) -> bool {
        self.tag_edits.is_empty() && self.module_edits.values().all(Vec::is_empty)
    }

    pub fn edit_for(&self, at: TagRef) -> Option<&TagEdit> {
        self.tag_edits.get(&at)
    }

    /// Tag edits of one module, keyed by tag id.
    pub fn tag_edits_for(&self, module: ModuleId) -> BTreeMap<TagId, TagEdit> {
        self.tag_edits
            .range(TagRef::new(module, TagId(0))..=TagRef::new(module, TagId(u32::MAX)))
            .map(|(at, edit)| (at.tag, edit.clone()))
            .collect()
    }

    pub fn structural_edits_for(&self, module: ModuleId) -> &[StructuralEdit] {
        self.module_edits.get(&module).map_or(&[], Vec::as_slice)
    }

    /// GAs of the migration dependencies this plan adds to `module`.
    pub fn added_gas_for(&self, module: ModuleId) -> BTreeSet<String> {
        let newly_added: BTreeSet<&str> = self.newly_added.iter().map(|k| truncate_to_ga(k)).collect();
        self.structural_edits_for(module)
            .iter()
            .filter_map(|edit| match edit {
                StructuralEdit::AddDependency { group, artifact, .. } => Some(format!("{group}:{artifact}")),
                _ => None,
            })
            .filter(|ga| newly_added.contains(ga.as_str()))
            .collect()
    }

    pub fn fix_index(&self) -> FixIndex {
        FixIndex {
            update_map: self.update_map.clone(),
            ensured: self.ensured.clone(),
            removed: self.removed.clone(),
            fixed_apis: BTreeMap::new(),
        }
    }

    /// JSON-friendly view, tag edits addressed by POM path.
    pub fn summary(&self, session: &MavenSession) -> PlanSummary {
        PlanSummary {
            tag_edits: self
                .tag_edits
                .iter()
                .map(|(at, edit)| TagEditSummary {
                    pom: session.module(at.module).pom_path.clone(),
                    tag: at.tag.0,
                    edit: edit.clone(),
                })
                .collect(),
            module_edits: self
                .module_edits
                .iter()
                .map(|(module, edits)| ModuleEditSummary {
                    pom: session.module(*module).pom_path.clone(),
                    edits: edits.clone(),
                })
                .collect(),
            update_map: self.update_map.clone(),
            newly_added: self.newly_added.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub tag_edits: Vec<TagEditSummary>,
    pub module_edits: Vec<ModuleEditSummary>,
    pub update_map: BTreeMap<String, String>,
    pub newly_added: BTreeSet<String>,
}

#[derive(Debug, Serialize)]
pub struct TagEditSummary {
    pub pom: PathBuf,
    pub tag: u32,
    pub edit: TagEdit,
}

#[derive(Debug, Serialize)]
pub struct ModuleEditSummary {
    pub pom: PathBuf,
    pub edits: Vec<StructuralEdit>,
}
