// ============================================================================
// DependencyUpdateRule - 依赖升级规则
// ============================================================================
//
// Matching is plain tuple comparison plus `Version::should_update_to`; a type
// of `*` accepts any type.

use super::dependency_tree::DtNode;
use crate::error::{AutofixError, AutofixResult};
use crate::gatv::{ga, Gatv};
use crate::version::should_update;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyUpdateRule {
    /// Same coordinate, newer version.
    SameGa {
        group: String,
        artifact: String,
        type_: Option<String>,
        to_version: String,
    },
    /// Old coordinate replaced by a new one.
    ChangeGa {
        old_group: String,
        old_artifact: String,
        old_type: Option<String>,
        to: Gatv,
    },
    /// Like `SameGa`, only for versions carrying `marker`.
    Marked {
        group: String,
        artifact: String,
        type_: Option<String>,
        to_version: String,
        marker: String,
    },
}

fn type_filter(type_: &str) -> Option<String> {
    (type_ != "*").then(|| type_.to_string())
}

impl DependencyUpdateRule {
    pub fn same_ga(to: &str) -> AutofixResult<Self> {
        let to = Gatv::parse(to)?;
        Ok(DependencyUpdateRule::SameGa {
            type_: type_filter(&to.type_),
            group: to.group,
            artifact: to.artifact,
            to_version: to.version,
        })
    }

    /// `from` is `group:artifact:type`.
    pub fn change_ga(from: &str, to: &str) -> AutofixResult<Self> {
        let fields: Vec<&str> = from.split(':').collect();
        let [group, artifact, type_] = fields.as_slice() else {
            return Err(AutofixError::InvalidGatv {
                value: from.to_string(),
                reason: "expected group:artifact:type",
            });
        };
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(AutofixError::InvalidGatv {
                value: from.to_string(),
                reason: "empty coordinate field",
            });
        }
        Ok(DependencyUpdateRule::ChangeGa {
            old_group: group.to_string(),
            old_artifact: artifact.to_string(),
            old_type: type_filter(type_),
            to: Gatv::parse(to)?,
        })
    }

    pub fn marked(to: &str, marker: &str) -> AutofixResult<Self> {
        let to = Gatv::parse(to)?;
        Ok(DependencyUpdateRule::Marked {
            type_: type_filter(&to.type_),
            group: to.group,
            artifact: to.artifact,
            to_version: to.version,
            marker: marker.to_string(),
        })
    }

    /// GA the rule reacts to.
    pub fn source_ga(&self) -> String {
        match self {
            DependencyUpdateRule::SameGa { group, artifact, .. }
            | DependencyUpdateRule::Marked { group, artifact, .. } => ga(group, artifact),
            DependencyUpdateRule::ChangeGa {
                old_group,
                old_artifact,
                ..
            } => ga(old_group, old_artifact),
        }
    }

    pub fn matches(&self, node: &DtNode) -> bool {
        let type_ok = |t: &Option<String>| t.as_deref().map_or(true, |t| t == node.type_);
        match self {
            DependencyUpdateRule::SameGa {
                group,
                artifact,
                type_,
                to_version,
            } => {
                node.group == *group
                    && node.artifact == *artifact
                    && type_ok(type_)
                    && should_update(&node.version, to_version)
            }
            DependencyUpdateRule::ChangeGa {
                old_group,
                old_artifact,
                old_type,
                ..
            } => node.group == *old_group && node.artifact == *old_artifact && type_ok(old_type),
            DependencyUpdateRule::Marked {
                group,
                artifact,
                type_,
                to_version,
                marker,
            } => {
                node.group == *group
                    && node.artifact == *artifact
                    && type_ok(type_)
                    && node.version.contains(marker.as_str())
                    && should_update(&node.version, to_version)
            }
        }
    }

    /// Coordinate `node` should become. Only meaningful when `matches(node)`.
    pub fn target(&self, node: &DtNode) -> Gatv {
        match self {
            DependencyUpdateRule::SameGa { to_version, .. } | DependencyUpdateRule::Marked { to_version, .. } => {
                node.to_gatv().with_version(to_version)
            }
            DependencyUpdateRule::ChangeGa { to, .. } => {
                if to.type_ == "*" {
                    Gatv::new(&to.group, &to.artifact, &node.type_, &to.version)
                } else {
                    to.clone()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(gatv: &str) -> DtNode {
        let g = Gatv::parse(gatv).unwrap();
        DtNode::new(&g.group, &g.artifact, &g.type_, &g.version, Some("compile"))
    }

    #[test]
    fn test_same_ga_rule() {
        let rule = DependencyUpdateRule::same_ga("org.projectlombok:lombok:*:1.18.22").unwrap();
        assert!(rule.matches(&node("org.projectlombok:lombok:jar:1.16.20")));
        assert!(!rule.matches(&node("org.projectlombok:lombok:jar:1.18.22")));
        assert!(!rule.matches(&node("org.projectlombok:lombok:jar:1.18.24")));
        assert_eq!(
            rule.target(&node("org.projectlombok:lombok:jar:1.16.20")).to_string(),
            "org.projectlombok:lombok:jar:1.18.22"
        );

        let typed = DependencyUpdateRule::same_ga("org.ow2.asm:asm:jar:9.2").unwrap();
        assert!(!typed.matches(&node("org.ow2.asm:asm:pom:5.0")));
    }

    #[test]
    fn test_change_ga_rule() {
        let rule =
            DependencyUpdateRule::change_ga("javassist:javassist:*", "org.javassist:javassist:jar:3.28.0-GA").unwrap();
        assert_eq!(rule.source_ga(), "javassist:javassist");
        assert!(rule.matches(&node("javassist:javassist:jar:3.12.1.GA")));
        assert_eq!(
            rule.target(&node("javassist:javassist:jar:3.12.1.GA")).to_string(),
            "org.javassist:javassist:jar:3.28.0-GA"
        );
    }

    #[test]
    fn test_marked_rule() {
        let rule = DependencyUpdateRule::marked("org.javassist:javassist:jar:3.28.0-GA", "-GA").unwrap();
        assert!(rule.matches(&node("org.javassist:javassist:jar:3.20.0-GA")));
        assert!(!rule.matches(&node("org.javassist:javassist:jar:3.20.0-vendor")));
    }

    #[test]
    fn test_malformed_rules_fail_fast() {
        assert!(DependencyUpdateRule::same_ga("org.projectlombok:lombok:1.18.22").is_err());
        assert!(DependencyUpdateRule::change_ga("javassist:javassist", "a:b:jar:1").is_err());
        assert!(DependencyUpdateRule::change_ga("a:b:jar", "a:b:1").is_err());
        assert!(DependencyUpdateRule::marked("a:b:jar:", "-GA").is_err());
    }
}
