// ============================================================================
// 依赖结构编辑 - add / exclude / remove <dependency>
// ============================================================================

use crate::gatv::ga;
use crate::report::ReporterId;
use crate::xml::{Cursor, Tag, TagTemplate, XmlVisitor};
use anyhow::Result;

const ADDED: &str = "dependency-added";
const DUPLICATE: &str = "dependency-present";

fn dependency_ga(tag: &Tag) -> Option<String> {
    let group = tag.child_value("groupId")?;
    let artifact = tag.child_value("artifactId")?;
    Some(ga(&group, &artifact))
}

/// Adds one `<dependency>` to `project/dependencies` or to
/// `project/dependencyManagement/dependencies`, creating missing containers.
/// Nothing happens when a dependency with the same GA is already listed.
pub struct AddDependencyVisitor {
    template: TagTemplate,
    ga: String,
    managed: bool,
    reporter: ReporterId,
}

impl AddDependencyVisitor {
    pub fn direct(template: TagTemplate, reporter: ReporterId) -> Self {
        Self::new(template, false, reporter)
    }

    pub fn managed(template: TagTemplate, reporter: ReporterId) -> Self {
        Self::new(template, true, reporter)
    }

    fn new(template: TagTemplate, managed: bool, reporter: ReporterId) -> Self {
        let value = |name: &str| {
            template
                .children
                .iter()
                .find(|c| c.name == name)
                .and_then(|c| c.value.clone())
                .unwrap_or_default()
        };
        let ga = ga(&value("groupId"), &value("artifactId"));
        AddDependencyVisitor {
            template,
            ga,
            managed,
            reporter,
        }
    }

    fn container_path(&self) -> &'static [&'static str] {
        if self.managed {
            &["project", "dependencyManagement"]
        } else {
            &["project"]
        }
    }

    fn done(&self, cursor: &Cursor) -> bool {
        cursor.has_message(ADDED) || cursor.has_message(DUPLICATE)
    }

    fn append(&self, parent: Tag, template: &TagTemplate, cursor: &mut Cursor) -> Tag {
        let child = cursor.build(template);
        let unit = cursor.indent_unit().to_string();
        cursor.put_message(ADDED);
        cursor.report(self.reporter);
        parent.append_child(child, &unit)
    }
}

impl XmlVisitor for AddDependencyVisitor {
    fn name(&self) -> &'static str {
        "add-dependency"
    }

    fn visit_tag(&self, tag: Tag, cursor: &mut Cursor) -> Result<Option<Tag>> {
        if tag.name() != "dependencies" || !cursor.in_path(self.container_path()) || self.done(cursor) {
            return Ok(Some(tag));
        }
        let present = tag
            .children_named("dependency")
            .any(|d| dependency_ga(d).as_deref() == Some(self.ga.as_str()));
        if present {
            cursor.put_message(DUPLICATE);
            return Ok(Some(tag));
        }
        Ok(Some(self.append(tag, &self.template, cursor)))
    }

    fn leave_tag(&self, tag: Tag, cursor: &mut Cursor) -> Result<Tag> {
        if self.done(cursor) {
            return Ok(tag);
        }
        let wrapped = TagTemplate::element("dependencies", vec![self.template.clone()]);
        // dependencyManagement without a dependencies list
        if self.managed && tag.name() == "dependencyManagement" && cursor.in_path(&["project"]) {
            return Ok(self.append(tag, &wrapped, cursor));
        }
        if tag.name() == "project" && cursor.ancestors().is_empty() {
            let container = if self.managed {
                TagTemplate::element("dependencyManagement", vec![wrapped])
            } else {
                wrapped
            };
            return Ok(self.append(tag, &container, cursor));
        }
        Ok(tag)
    }
}

/// Adds `<exclusion>` of `exclude` to the direct dependency `on`.
pub struct ExcludeDependencyVisitor {
    on: String,
    exclude: String,
    reporter: ReporterId,
}

impl ExcludeDependencyVisitor {
    pub fn new(on: &str, exclude: &str, reporter: ReporterId) -> Self {
        ExcludeDependencyVisitor {
            on: on.to_string(),
            exclude: exclude.to_string(),
            reporter,
        }
    }

    fn already_excluded(&self, dependency: &Tag) -> bool {
        dependency
            .find("exclusions")
            .into_iter()
            .flat_map(|e| e.children_named("exclusion"))
            .filter_map(dependency_ga)
            .any(|g| g == self.exclude || g == "*:*")
    }

    fn exclusion(&self) -> TagTemplate {
        let (group, artifact) = self.exclude.split_once(':').unwrap_or((self.exclude.as_str(), ""));
        TagTemplate::element(
            "exclusion",
            vec![TagTemplate::leaf("groupId", group), TagTemplate::leaf("artifactId", artifact)],
        )
    }
}

impl XmlVisitor for ExcludeDependencyVisitor {
    fn name(&self) -> &'static str {
        "exclude-dependency"
    }

    fn visit_tag(&self, tag: Tag, cursor: &mut Cursor) -> Result<Option<Tag>> {
        if tag.name() != "dependency"
            || !cursor.in_path(&["project", "dependencies"])
            || dependency_ga(&tag).as_deref() != Some(self.on.as_str())
            || self.already_excluded(&tag)
        {
            return Ok(Some(tag));
        }

        let unit = cursor.indent_unit().to_string();
        let updated = if tag.child("exclusions").is_some() {
            let exclusion = cursor.build(&self.exclusion());
            let mut exclusion = Some(exclusion);
            tag.map_children(|child| match (child.name() == "exclusions", exclusion.take()) {
                (true, Some(e)) => child.append_child(e, &unit),
                (_, e) => {
                    exclusion = e;
                    child
                }
            })
        } else {
            let exclusions = cursor.build(&TagTemplate::element("exclusions", vec![self.exclusion()]));
            tag.append_child(exclusions, &unit)
        };
        cursor.report(self.reporter);
        Ok(Some(updated))
    }
}

/// Drops the direct dependency with the given GA.
pub struct RemoveDependencyVisitor {
    ga: String,
    reporter: ReporterId,
}

impl RemoveDependencyVisitor {
    pub fn new(ga: &str, reporter: ReporterId) -> Self {
        RemoveDependencyVisitor {
            ga: ga.to_string(),
            reporter,
        }
    }
}

impl XmlVisitor for RemoveDependencyVisitor {
    fn name(&self) -> &'static str {
        "remove-dependency"
    }

    fn visit_tag(&self, tag: Tag, cursor: &mut Cursor) -> Result<Option<Tag>> {
        if tag.name() == "dependency"
            && cursor.in_path(&["project", "dependencies"])
            && dependency_ga(&tag).as_deref() == Some(self.ga.as_str())
        {
            cursor.report(self.reporter);
            return Ok(None);
        }
        Ok(Some(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::visitor::run_visitor;
    use crate::xml::XmlDocument;
    use std::path::Path;

    const POM: &str = "<project>
    <artifactId>app</artifactId>
    <dependencies>
        <dependency>
            <groupId>org.springframework</groupId>
            <artifactId>spring-core</artifactId>
        </dependency>
        <dependency>
            <groupId>com.sun</groupId>
            <artifactId>tools</artifactId>
            <scope>system</scope>
        </dependency>
    </dependencies>
</project>
";

    fn run(text: &str, visitor: Box<dyn XmlVisitor>) -> (String, usize) {
        let doc = XmlDocument::parse(Path::new("pom.xml"), text).unwrap();
        let outcome = run_visitor(doc, visitor, None).unwrap();
        (outcome.document.print(), outcome.fired.len())
    }

    fn jaxb() -> TagTemplate {
        TagTemplate::dependency("javax.xml.bind", "jaxb-api", Some("2.3.1"), None, None)
    }

    #[test]
    fn test_add_direct_dependency_once() {
        let (out, fired) = run(POM, Box::new(AddDependencyVisitor::direct(jaxb(), ReporterId(0))));
        assert_eq!(fired, 1);
        assert!(out.contains(
            "        </dependency>\n        <dependency>\n            <groupId>javax.xml.bind</groupId>\n            <artifactId>jaxb-api</artifactId>\n            <version>2.3.1</version>\n        </dependency>\n    </dependencies>"
        ));

        let (again, fired) = run(&out, Box::new(AddDependencyVisitor::direct(jaxb(), ReporterId(0))));
        assert_eq!(fired, 0);
        assert_eq!(again, out);
    }

    #[test]
    fn test_add_creates_missing_dependencies_list() {
        let (out, fired) = run(
            "<project>\n  <artifactId>app</artifactId>\n</project>",
            Box::new(AddDependencyVisitor::direct(jaxb(), ReporterId(0))),
        );
        assert_eq!(fired, 1);
        assert_eq!(
            out,
            "<project>\n  <artifactId>app</artifactId>\n  <dependencies>\n    <dependency>\n      <groupId>javax.xml.bind</groupId>\n      <artifactId>jaxb-api</artifactId>\n      <version>2.3.1</version>\n    </dependency>\n  </dependencies>\n</project>"
        );
    }

    #[test]
    fn test_managed_add_ignores_direct_list() {
        let template = TagTemplate::dependency("org.springframework", "spring-core", Some("5.3.39"), None, None);
        let (out, fired) = run(POM, Box::new(AddDependencyVisitor::managed(template, ReporterId(0))));
        assert_eq!(fired, 1);
        assert!(out.contains("<dependencyManagement>\n        <dependencies>\n            <dependency>"));
        assert!(out.contains("<version>5.3.39</version>"));
    }

    #[test]
    fn test_exclude_dependency() {
        let visitor = ExcludeDependencyVisitor::new("org.springframework:spring-core", "commons-logging:commons-logging", ReporterId(0));
        let (out, fired) = run(POM, Box::new(visitor));
        assert_eq!(fired, 1);
        assert!(out.contains(
            "            <artifactId>spring-core</artifactId>\n            <exclusions>\n                <exclusion>\n                    <groupId>commons-logging</groupId>\n                    <artifactId>commons-logging</artifactId>\n                </exclusion>\n            </exclusions>\n        </dependency>"
        ));

        let visitor = ExcludeDependencyVisitor::new("org.springframework:spring-core", "commons-logging:commons-logging", ReporterId(0));
        let (again, fired) = run(&out, Box::new(visitor));
        assert_eq!(fired, 0);
        assert_eq!(again, out);

        let visitor = ExcludeDependencyVisitor::new("org.springframework:spring-core", "org.slf4j:jcl", ReporterId(0));
        let (more, fired) = run(&out, Box::new(visitor));
        assert_eq!(fired, 1);
        assert!(more.contains(
            "                </exclusion>\n                <exclusion>\n                    <groupId>org.slf4j</groupId>"
        ));
    }

    #[test]
    fn test_remove_dependency() {
        let (out, fired) = run(POM, Box::new(RemoveDependencyVisitor::new("com.sun:tools", ReporterId(0))));
        assert_eq!(fired, 1);
        assert!(!out.contains("tools"));
        assert!(out.contains("        </dependency>\n    </dependencies>\n</project>"));
    }
}
