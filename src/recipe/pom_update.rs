// ============================================================================
// PomUpdateRecipe - 按计划改写 POM
// ============================================================================
//
// One forward pass applies the tag edits of the module (looked up by tag
// id), then the module's structural edits run as scheduled follow-up visits.

use super::add_dependency::{AddDependencyVisitor, ExcludeDependencyVisitor, RemoveDependencyVisitor};
use super::{visit_xml, Recipe, RecipeContext, SourceFile};
use crate::plan::{StructuralEdit, TagEdit, TagEditKind};
use crate::xml::{Cursor, Tag, TagId, TagTemplate, XmlDocument, XmlVisitor};
use anyhow::Result;
use std::collections::BTreeMap;

pub struct PomUpdateRecipe;

impl Recipe for PomUpdateRecipe {
    fn name(&self) -> &'static str {
        "pom-update"
    }

    fn display_name(&self) -> &'static str {
        "Update POM dependencies"
    }

    fn description(&self) -> &'static str {
        "Applies the computed dependency update plan to each module POM."
    }

    fn visit(&self, source: &SourceFile, ctx: &mut RecipeContext) -> Result<SourceFile> {
        let Some(module) = source.module() else {
            return Ok(source.clone());
        };
        let tag_edits = ctx.plan.tag_edits_for(module);
        let structural = ctx.plan.structural_edits_for(module).to_vec();
        if tag_edits.is_empty() && structural.is_empty() {
            return Ok(source.clone());
        }
        visit_xml(source, ctx, Box::new(PomUpdateVisitor { tag_edits, structural }))
    }
}

struct PomUpdateVisitor {
    tag_edits: BTreeMap<TagId, TagEdit>,
    structural: Vec<StructuralEdit>,
}

impl XmlVisitor for PomUpdateVisitor {
    fn name(&self) -> &'static str {
        "pom-update"
    }

    fn enter_document(&self, _doc: &XmlDocument, cursor: &mut Cursor) -> Result<()> {
        for edit in &self.structural {
            cursor.schedule(structural_visitor(edit));
        }
        Ok(())
    }

    fn visit_tag(&self, tag: Tag, cursor: &mut Cursor) -> Result<Option<Tag>> {
        let Some(edit) = self.tag_edits.get(&tag.id()) else {
            return Ok(Some(tag));
        };
        match &edit.kind {
            TagEditKind::SetValue { value } => {
                if tag.value().as_deref() == Some(value.as_str()) {
                    return Ok(Some(tag));
                }
                cursor.report(edit.reporter);
                Ok(Some(tag.with_value(value)))
            }
            TagEditKind::ChangeGa { group, artifact } => {
                let updated = tag
                    .with_child_value("groupId", group)
                    .with_child_value("artifactId", artifact);
                if updated != tag {
                    cursor.report(edit.reporter);
                }
                Ok(Some(updated))
            }
            TagEditKind::Remove => {
                cursor.report(edit.reporter);
                Ok(None)
            }
        }
    }
}

fn structural_visitor(edit: &StructuralEdit) -> Box<dyn XmlVisitor> {
    match edit {
        StructuralEdit::AddDependency {
            group,
            artifact,
            type_,
            version,
            scope,
            reporter,
        } => Box::new(AddDependencyVisitor::direct(
            TagTemplate::dependency(group, artifact, Some(version), Some(type_), scope.as_deref()),
            *reporter,
        )),
        StructuralEdit::AddManagedDependency {
            group,
            artifact,
            type_,
            version,
            reporter,
        } => Box::new(AddDependencyVisitor::managed(
            TagTemplate::dependency(group, artifact, Some(version), Some(type_), None),
            *reporter,
        )),
        StructuralEdit::ExcludeDependency { on, exclude, reporter } => {
            Box::new(ExcludeDependencyVisitor::new(on, exclude, *reporter))
        }
        StructuralEdit::RemoveDependency { ga, reporter } => Box::new(RemoveDependencyVisitor::new(ga, *reporter)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maven::{ModuleId, TagRef};
    use crate::plan::PomUpdatePlan;
    use crate::recipe::{Charset, XmlSource};
    use crate::report::ReporterId;
    use std::path::{Path, PathBuf};

    const POM: &str = r#"<project>
    <artifactId>app</artifactId>
    <dependencies>
        <dependency>
            <groupId>javassist</groupId>
            <artifactId>javassist</artifactId>
            <version>3.12.1.GA</version>
        </dependency>
        <dependency>
            <groupId>junit</groupId>
            <artifactId>junit</artifactId>
        </dependency>
    </dependencies>
</project>
"#;

    fn source() -> SourceFile {
        SourceFile::Xml(XmlSource {
            path: PathBuf::from("pom.xml"),
            module: Some(ModuleId(0)),
            charset: Charset::Utf8,
            document: XmlDocument::parse(Path::new("pom.xml"), POM).unwrap(),
        })
    }

    #[test]
    fn test_applies_tag_edits_by_id() {
        let src = source();
        let SourceFile::Xml(xml) = &src else { unreachable!() };
        let dep = xml.document.root().find("dependencies/dependency").unwrap();
        let version = dep.child("version").unwrap().id();

        let mut plan = PomUpdatePlan::default();
        plan.tag_edits.insert(
            TagRef::new(ModuleId(0), dep.id()),
            TagEdit {
                kind: TagEditKind::ChangeGa {
                    group: "org.javassist".to_string(),
                    artifact: "javassist".to_string(),
                },
                reporter: ReporterId(0),
            },
        );
        plan.tag_edits.insert(
            TagRef::new(ModuleId(0), version),
            TagEdit {
                kind: TagEditKind::SetValue {
                    value: "3.28.0-GA".to_string(),
                },
                reporter: ReporterId(0),
            },
        );

        let mut ctx = RecipeContext::new(&plan);
        let out = PomUpdateRecipe.visit(&src, &mut ctx).unwrap();
        let expected = POM
            .replacen("<groupId>javassist</groupId>", "<groupId>org.javassist</groupId>", 1)
            .replace("3.12.1.GA", "3.28.0-GA");
        assert_eq!(out.print(), expected);
        assert_eq!(ctx.fired, [ReporterId(0), ReporterId(0)]);

        // applying the same plan to the result changes nothing
        let mut ctx = RecipeContext::new(&plan);
        let again = PomUpdateRecipe.visit(&out, &mut ctx).unwrap();
        assert_eq!(again.print(), expected);
        assert!(ctx.fired.is_empty());
    }

    #[test]
    fn test_structural_edits_run_after_tag_edits() {
        let mut plan = PomUpdatePlan::default();
        plan.module_edits.insert(
            ModuleId(0),
            vec![
                StructuralEdit::RemoveDependency {
                    ga: "junit:junit".to_string(),
                    reporter: ReporterId(1),
                },
                StructuralEdit::AddManagedDependency {
                    group: "net.bytebuddy".to_string(),
                    artifact: "byte-buddy".to_string(),
                    type_: "jar".to_string(),
                    version: "1.12.10".to_string(),
                    reporter: ReporterId(2),
                },
            ],
        );
        let mut ctx = RecipeContext::new(&plan);
        let out = PomUpdateRecipe.visit(&source(), &mut ctx).unwrap().print();
        assert!(!out.contains("junit"));
        assert!(out.contains(
            "    </dependencies>\n    <dependencyManagement>\n        <dependencies>\n            <dependency>\n                <groupId>net.bytebuddy</groupId>\n                <artifactId>byte-buddy</artifactId>\n                <version>1.12.10</version>\n            </dependency>\n        </dependencies>\n    </dependencyManagement>\n</project>"
        ));
        assert_eq!(ctx.fired, [ReporterId(1), ReporterId(2)]);
    }
}
