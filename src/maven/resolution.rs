// ============================================================================
// PomResolution - 单个 POM 的结构索引
// ============================================================================
//
// Built by one scan over a parsed POM. Entries address tags by `TagId`, so the
// index stays valid for the snapshot it was taken from and for edits that
// keep tag ids.

use super::session::ModuleId;
use crate::gatv::{ga, Gatv};
use crate::xml::{Tag, TagId, XmlDocument};
use serde::Serialize;

/// A tag in a specific module's POM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TagRef {
    pub module: ModuleId,
    pub tag: TagId,
}

impl TagRef {
    pub fn new(module: ModuleId, tag: TagId) -> Self {
        TagRef { module, tag }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyEntry {
    pub tag: TagId,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEntry {
    pub tag: TagId,
    pub group: String,
    pub artifact: String,
    pub type_: String,
    pub classifier: Option<String>,
    pub version: Option<String>,
    pub version_tag: Option<TagId>,
    pub scope: Option<String>,
    pub system_path: Option<String>,
    /// `group:artifact` of each `<exclusion>`.
    pub exclusions: Vec<String>,
}

impl DependencyEntry {
    pub fn ga(&self) -> String {
        ga(&self.group, &self.artifact)
    }

    pub fn is_import(&self) -> bool {
        self.scope.as_deref() == Some("import")
    }

    fn from_tag(tag: &Tag) -> Option<Self> {
        let group = tag.child_value("groupId")?;
        let artifact = tag.child_value("artifactId")?;
        let version_tag = tag.child("version");
        let exclusions = tag
            .find("exclusions")
            .map(|ex| {
                ex.children_named("exclusion")
                    .filter_map(|e| Some(ga(&e.child_value("groupId")?, &e.child_value("artifactId")?)))
                    .collect()
            })
            .unwrap_or_default();
        Some(DependencyEntry {
            tag: tag.id(),
            group,
            artifact,
            type_: tag.child_value("type").unwrap_or_else(|| "jar".to_string()),
            classifier: tag.child_value("classifier"),
            version: version_tag.and_then(Tag::value),
            version_tag: version_tag.map(Tag::id),
            scope: tag.child_value("scope"),
            system_path: tag.child_value("systemPath"),
            exclusions,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginEntry {
    pub tag: TagId,
    pub group: String,
    pub artifact: String,
    pub version: Option<String>,
    pub version_tag: Option<TagId>,
}

impl PluginEntry {
    pub fn ga(&self) -> String {
        ga(&self.group, &self.artifact)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentEntry {
    pub tag: TagId,
    pub group: String,
    pub artifact: String,
    pub version: String,
    pub version_tag: Option<TagId>,
}

impl ParentEntry {
    pub fn ga(&self) -> String {
        ga(&self.group, &self.artifact)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectEntry {
    pub tag: Option<TagId>,
    pub group: Option<String>,
    pub artifact: String,
    pub version: Option<String>,
    pub version_tag: Option<TagId>,
    pub packaging: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PomResolution {
    pub project: ProjectEntry,
    pub parent: Option<ParentEntry>,
    pub properties: Vec<PropertyEntry>,
    pub dependencies: Vec<DependencyEntry>,
    pub managed_dependencies: Vec<DependencyEntry>,
    pub plugins: Vec<PluginEntry>,
    pub dependencies_tag: Option<TagId>,
    pub dependency_management_tag: Option<TagId>,
    /// `<modules>` entries, relative directories.
    pub modules: Vec<String>,
}

impl PomResolution {
    /// Own groupId, else the parent's.
    pub fn group_id(&self) -> Option<&str> {
        self.project
            .group
            .as_deref()
            .or_else(|| self.parent.as_ref().map(|p| p.group.as_str()))
    }

    pub fn version(&self) -> Option<&str> {
        self.project
            .version
            .as_deref()
            .or_else(|| self.parent.as_ref().map(|p| p.version.as_str()))
    }

    pub fn packaging(&self) -> &str {
        self.project.packaging.as_deref().unwrap_or("jar")
    }

    pub fn ga(&self) -> Option<String> {
        Some(ga(self.group_id()?, &self.project.artifact))
    }

    pub fn gatv(&self) -> Option<Gatv> {
        Some(Gatv::new(
            self.group_id()?,
            &self.project.artifact,
            self.packaging(),
            self.version()?,
        ))
    }

    pub fn property(&self, name: &str) -> Option<&PropertyEntry> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn dependencies_with_ga<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a DependencyEntry> {
        self.dependencies.iter().filter(move |d| d.ga() == key)
    }

    pub fn managed_with_ga<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a DependencyEntry> {
        self.managed_dependencies.iter().filter(move |d| d.ga() == key)
    }

    /// Value of any indexed version/property tag.
    pub fn value_of(&self, tag: TagId) -> Option<&str> {
        let from_deps = self
            .dependencies
            .iter()
            .chain(&self.managed_dependencies)
            .find(|d| d.version_tag == Some(tag))
            .and_then(|d| d.version.as_deref());
        from_deps
            .or_else(|| self.properties.iter().find(|p| p.tag == tag).map(|p| p.value.as_str()))
            .or_else(|| {
                self.plugins
                    .iter()
                    .find(|p| p.version_tag == Some(tag))
                    .and_then(|p| p.version.as_deref())
            })
            .or_else(|| {
                self.parent
                    .as_ref()
                    .filter(|p| p.version_tag == Some(tag))
                    .map(|p| p.version.as_str())
            })
            .or_else(|| {
                self.project
                    .version
                    .as_deref()
                    .filter(|_| self.project.version_tag == Some(tag))
            })
    }
}

/// Single read-only pass that builds a [`PomResolution`].
pub struct PomScanRecipe;

impl PomScanRecipe {
    pub fn scan(doc: &XmlDocument) -> PomResolution {
        let project = doc.root();
        let mut resolution = PomResolution {
            project: ProjectEntry {
                tag: Some(project.id()),
                group: project.child_value("groupId"),
                artifact: project.child_value("artifactId").unwrap_or_default(),
                version: project.child_value("version"),
                version_tag: project.child("version").map(Tag::id),
                packaging: project.child_value("packaging"),
            },
            ..Default::default()
        };

        resolution.parent = project.child("parent").and_then(|p| {
            Some(ParentEntry {
                tag: p.id(),
                group: p.child_value("groupId")?,
                artifact: p.child_value("artifactId")?,
                version: p.child_value("version").unwrap_or_default(),
                version_tag: p.child("version").map(Tag::id),
            })
        });

        if let Some(props) = project.child("properties") {
            resolution.properties = props
                .children()
                .map(|p| PropertyEntry {
                    tag: p.id(),
                    name: p.name().to_string(),
                    value: p.value().unwrap_or_default(),
                })
                .collect();
        }

        if let Some(deps) = project.child("dependencies") {
            resolution.dependencies_tag = Some(deps.id());
            resolution.dependencies = deps
                .children_named("dependency")
                .filter_map(DependencyEntry::from_tag)
                .collect();
        }

        if let Some(dm) = project.child("dependencyManagement") {
            resolution.dependency_management_tag = Some(dm.id());
            if let Some(deps) = dm.child("dependencies") {
                resolution.managed_dependencies = deps
                    .children_named("dependency")
                    .filter_map(DependencyEntry::from_tag)
                    .collect();
            }
        }

        for path in ["build/plugins", "build/pluginManagement/plugins"] {
            if let Some(plugins) = project.find(path) {
                resolution.plugins.extend(plugins.children_named("plugin").filter_map(|p| {
                    Some(PluginEntry {
                        tag: p.id(),
                        group: p
                            .child_value("groupId")
                            .unwrap_or_else(|| "org.apache.maven.plugins".to_string()),
                        artifact: p.child_value("artifactId")?,
                        version: p.child_value("version"),
                        version_tag: p.child("version").map(Tag::id),
                    })
                }));
            }
        }

        if let Some(modules) = project.child("modules") {
            resolution.modules = modules.children_named("module").filter_map(Tag::value).collect();
        }

        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const POM: &str = r#"<project>
    <parent>
        <groupId>com.example</groupId>
        <artifactId>parent</artifactId>
        <version>1.0</version>
    </parent>
    <artifactId>app</artifactId>
    <properties>
        <lombok.version>1.18.10</lombok.version>
    </properties>
    <dependencyManagement>
        <dependencies>
            <dependency>
                <groupId>org.springframework.boot</groupId>
                <artifactId>spring-boot-dependencies</artifactId>
                <version>2.1.0.RELEASE</version>
                <type>pom</type>
                <scope>import</scope>
            </dependency>
        </dependencies>
    </dependencyManagement>
    <dependencies>
        <dependency>
            <groupId>org.projectlombok</groupId>
            <artifactId>lombok</artifactId>
            <version>${lombok.version}</version>
            <exclusions>
                <exclusion>
                    <groupId>x</groupId>
                    <artifactId>y</artifactId>
                </exclusion>
            </exclusions>
        </dependency>
        <dependency>
            <groupId>junit</groupId>
            <artifactId>junit</artifactId>
        </dependency>
    </dependencies>
    <build>
        <plugins>
            <plugin>
                <artifactId>maven-compiler-plugin</artifactId>
                <version>3.1</version>
            </plugin>
        </plugins>
    </build>
</project>"#;

    #[test]
    fn test_scan_indexes_pom() {
        let doc = XmlDocument::parse(Path::new("pom.xml"), POM).unwrap();
        let res = PomScanRecipe::scan(&doc);

        assert_eq!(res.ga().as_deref(), Some("com.example:app"));
        assert_eq!(res.version(), Some("1.0"));
        assert_eq!(res.parent.as_ref().unwrap().ga(), "com.example:parent");
        assert_eq!(res.property("lombok.version").unwrap().value, "1.18.10");

        assert_eq!(res.dependencies.len(), 2);
        let lombok = &res.dependencies[0];
        assert_eq!(lombok.version.as_deref(), Some("${lombok.version}"));
        assert_eq!(lombok.exclusions, ["x:y"]);
        assert!(res.dependencies[1].version_tag.is_none());

        assert!(res.managed_dependencies[0].is_import());
        assert_eq!(res.managed_dependencies[0].type_, "pom");
        assert_eq!(res.plugins[0].ga(), "org.apache.maven.plugins:maven-compiler-plugin");

        let version_tag = lombok.version_tag.unwrap();
        assert_eq!(res.value_of(version_tag), Some("${lombok.version}"));
    }
}
