// ============================================================================
// DTNode 匹配器 + JDK 内部 jar 目录
// ============================================================================

use super::dependency_tree::DtNode;
use std::path::{Component, Path, PathBuf};
use tracing::info;

/// Field-wise match on a dependency node; `None` or `"*"` matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DtNodeMatcher {
    pub group: Option<String>,
    pub artifact: Option<String>,
    pub type_: Option<String>,
    pub version: Option<String>,
    pub scope: Option<String>,
}

impl DtNodeMatcher {
    pub fn new(group: &str, artifact: &str) -> Self {
        DtNodeMatcher {
            group: Some(group.to_string()),
            artifact: Some(artifact.to_string()),
            ..Default::default()
        }
    }

    /// `group:artifact[:type[:version[:scope]]]`, missing trailing fields are wildcards.
    pub fn parse(pattern: &str) -> Self {
        let mut fields = pattern.split(':').map(|f| Some(f.to_string()).filter(|f| !f.is_empty()));
        DtNodeMatcher {
            group: fields.next().flatten(),
            artifact: fields.next().flatten(),
            type_: fields.next().flatten(),
            version: fields.next().flatten(),
            scope: fields.next().flatten(),
        }
    }

    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    pub fn matches(&self, node: &DtNode) -> bool {
        field_matches(&self.group, &node.group)
            && field_matches(&self.artifact, &node.artifact)
            && field_matches(&self.type_, &node.type_)
            && field_matches(&self.version, &node.version)
            && field_matches(&self.scope, node.scope.as_deref().unwrap_or(""))
    }
}

fn field_matches(pattern: &Option<String>, value: &str) -> bool {
    match pattern.as_deref() {
        None | Some("*") => true,
        Some(p) => p == value,
    }
}

// ============================================================================
// JdkInternalJarMatcher
// ============================================================================

/// Tool jars shipped inside JDK 8 and gone from later JDKs, relative to JAVA_HOME.
const INTERNAL_JARS: &[&str] = &[
    "lib/tools.jar",
    "lib/jconsole.jar",
    "lib/sa-jdi.jar",
    "lib/dt.jar",
    "lib/ant-javafx.jar",
    "jre/lib/ext/jfxrt.jar",
    "jre/lib/ext/nashorn.jar",
    "jre/lib/jfxswt.jar",
];

/// Coordinates commonly used to declare those jars with `system` scope.
const INTERNAL_GAS: &[(&str, &str)] = &[
    ("com.sun", "tools"),
    ("jdk.tools", "jdk.tools"),
    ("com.sun", "jconsole"),
    ("sun.jdk", "jconsole"),
    ("com.sun", "sa-jdi"),
    ("sun.jdk", "sa-jdi"),
    ("com.oracle", "javafx"),
    ("javafx", "jfxrt"),
    ("com.sun.javafx", "jfxrt"),
    ("jdk.nashorn", "nashorn"),
];

#[derive(Debug, Clone)]
pub struct JdkInternalJarMatcher {
    java_home: PathBuf,
    matchers: Vec<DtNodeMatcher>,
}

impl JdkInternalJarMatcher {
    pub fn new(java_home: impl Into<PathBuf>) -> Self {
        JdkInternalJarMatcher {
            java_home: java_home.into(),
            matchers: INTERNAL_GAS
                .iter()
                .map(|(g, a)| DtNodeMatcher::new(g, a).with_scope("system"))
                .collect(),
        }
    }

    /// `None` (and an info notice) when JAVA_HOME is not set.
    pub fn from_env() -> Option<Self> {
        match std::env::var_os("JAVA_HOME") {
            Some(home) if !home.is_empty() => Some(Self::new(home)),
            _ => {
                info!("JAVA_HOME is not set, JDK internal jar exclusion disabled");
                None
            }
        }
    }

    pub fn jar_paths(&self) -> Vec<PathBuf> {
        INTERNAL_JARS.iter().map(|jar| self.java_home.join(jar)).collect()
    }

    pub fn matches(&self, node: &DtNode) -> bool {
        self.matchers.iter().any(|m| m.matches(node))
    }

    /// `<systemPath>` pointing at one of the catalog jars.
    pub fn matches_system_path(&self, system_path: &str) -> bool {
        let expanded = system_path
            .replace("${java.home}", &self.java_home.join("jre").to_string_lossy())
            .replace("${env.JAVA_HOME}", &self.java_home.to_string_lossy());
        let expanded = normalize(Path::new(&expanded));
        self.jar_paths().iter().any(|jar| normalize(jar) == expanded)
    }
}

/// Lexical normalization, `..` pops a component.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}
