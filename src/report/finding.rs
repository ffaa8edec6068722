// ============================================================================
// Findings - 外部扫描器的检查结果 + "是否已自动修复" 判定
// ============================================================================

use crate::rules::removed_module_replacements;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResultContext {
    pub feature: String,
    #[serde(flatten)]
    pub kind: FindingKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FindingKind {
    /// An incompatible dependency, `group:artifact:type:version`.
    Dependency { gatv: String },
    /// Code relying on a JDK module removed in the target release.
    RemovedModule { module: String },
    /// Use of a removed or changed API.
    Api { name: String },
}

/// What the run actually fixed, in the shape findings are checked against.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixIndex {
    /// `fromGATV -> toGATV`.
    pub update_map: BTreeMap<String, String>,
    /// GAs present after the run because an add intent was satisfied.
    pub ensured: BTreeSet<String>,
    /// GAs removed or excluded.
    pub removed: BTreeSet<String>,
    /// API name -> files a code recipe rewrote.
    pub fixed_apis: BTreeMap<String, BTreeSet<PathBuf>>,
}

impl CheckResultContext {
    pub fn can_be_autofixed(&self, index: &FixIndex) -> bool {
        match &self.kind {
            FindingKind::Dependency { gatv } => {
                index.update_map.contains_key(gatv)
                    || index.removed.contains(crate::gatv::truncate_to_ga(gatv))
            }
            FindingKind::RemovedModule { module } => removed_module_replacements(module)
                .is_some_and(|gatvs| {
                    gatvs
                        .iter()
                        .all(|g| index.ensured.contains(crate::gatv::truncate_to_ga(g)))
                }),
            FindingKind::Api { name } => match (index.fixed_apis.get(name), &self.file) {
                (Some(files), Some(file)) => files.contains(file),
                (Some(files), None) => !files.is_empty(),
                (None, _) => false,
            },
        }
    }
}

/// Split findings into (fixed, unfixed).
pub fn partition(
    findings: &[CheckResultContext],
    index: &FixIndex,
) -> (Vec<CheckResultContext>, Vec<CheckResultContext>) {
    findings.iter().cloned().partition(|f| f.can_be_autofixed(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> FixIndex {
        let mut index = FixIndex::default();
        index.update_map.insert(
            "org.projectlombok:lombok:jar:1.16.20".to_string(),
            "org.projectlombok:lombok:jar:1.18.22".to_string(),
        );
        index.ensured.insert("javax.xml.bind:jaxb-api".to_string());
        index.ensured.insert("org.glassfish.jaxb:jaxb-runtime".to_string());
        index.removed.insert("com.sun:tools".to_string());
        index
            .fixed_apis
            .entry("java.util.stream.Stream.count".to_string())
            .or_default()
            .insert(PathBuf::from("src/A.java"));
        index
    }

    #[test]
    fn test_findings_json_shape() {
        let json = r#"[
            {"feature": "dep", "kind": "dependency", "gatv": "org.projectlombok:lombok:jar:1.16.20"},
            {"feature": "jaxb", "kind": "removedModule", "module": "java.xml.bind"},
            {"feature": "api", "kind": "api", "name": "java.util.stream.Stream.count", "file": "src/A.java"}
        ]"#;
        let findings: Vec<CheckResultContext> = serde_json::from_str(json).unwrap();
        assert_eq!(findings.len(), 3);
        assert_eq!(
            findings[1].kind,
            FindingKind::RemovedModule {
                module: "java.xml.bind".to_string()
            }
        );
        let (fixed, unfixed) = partition(&findings, &index());
        assert_eq!(fixed.len(), 3);
        assert!(unfixed.is_empty());
    }

    #[test]
    fn test_unfixed_findings() {
        let index = index();
        let other_version = CheckResultContext {
            feature: "dep".to_string(),
            kind: FindingKind::Dependency {
                gatv: "org.projectlombok:lombok:jar:1.10.0".to_string(),
            },
            file: None,
        };
        assert!(!other_version.can_be_autofixed(&index));

        let removed_jar = CheckResultContext {
            feature: "dep".to_string(),
            kind: FindingKind::Dependency {
                gatv: "com.sun:tools:jar:1.8".to_string(),
            },
            file: None,
        };
        assert!(removed_jar.can_be_autofixed(&index));

        let corba = CheckResultContext {
            feature: "corba".to_string(),
            kind: FindingKind::RemovedModule {
                module: "java.corba".to_string(),
            },
            file: None,
        };
        assert!(!corba.can_be_autofixed(&index));

        let other_file = CheckResultContext {
            feature: "api".to_string(),
            kind: FindingKind::Api {
                name: "java.util.stream.Stream.count".to_string(),
            },
            file: Some(PathBuf::from("src/B.java")),
        };
        assert!(!other_file.can_be_autofixed(&index));
    }
}
