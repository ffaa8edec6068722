// ============================================================================
// JDK 迁移规则表 - 按 fromVersion / toVersion 选取
// ============================================================================
//
// Each supported hop (8→11, 11→17, 17→21) carries a fixed table. A run over
// several hops merges the tables; a later hop overrides the target of the
// same coordinate, so every GA ends up with exactly one rule.

use crate::error::{AutofixError, AutofixResult};
use crate::gatv::truncate_to_ga;
use crate::maven::{DependencyUpdateRule, JdkInternalJarMatcher};
use crate::plan::{ExclusionTarget, PomUpdatePlanGenerator};
use crate::report::{CheckResultContext, FindingKind};
use crate::version::should_update;
use std::collections::BTreeMap;
use tracing::{debug, info};

pub const SUPPORTED_VERSIONS: [u32; 4] = [8, 11, 17, 21];

const LOMBOK: &str = "org.projectlombok:lombok";
/// lombok releases before this one need the binding next to mapstruct.
const LOMBOK_MAPSTRUCT_BINDING_SINCE: &str = "1.18.16";
const LOMBOK_MAPSTRUCT_BINDING: &str = "org.projectlombok:lombok-mapstruct-binding:jar:0.2.0";

struct StepRules {
    from: u32,
    to: u32,
    /// Same GA, newer version.
    updates: &'static [&'static str],
    /// `group:artifact:type` -> new GATV.
    renames: &'static [(&'static str, &'static str)],
    /// Versions carrying the marker only.
    marked: &'static [(&'static str, &'static str)],
    parents: &'static [&'static str],
    imports: &'static [&'static str],
    plugins: &'static [&'static str],
}

const STEPS: &[StepRules] = &[
    StepRules {
        from: 8,
        to: 11,
        updates: &[
            "org.projectlombok:lombok:*:1.18.22",
            "org.ow2.asm:asm:*:9.2",
            "org.ow2.asm:asm-commons:*:9.2",
            "org.ow2.asm:asm-tree:*:9.2",
            "net.bytebuddy:byte-buddy:*:1.12.10",
            "net.bytebuddy:byte-buddy-agent:*:1.12.10",
            "org.mockito:mockito-core:*:3.12.4",
            "cglib:cglib:*:3.3.0",
        ],
        renames: &[("javassist:javassist:*", "org.javassist:javassist:jar:3.28.0-GA")],
        marked: &[("org.javassist:javassist:*:3.28.0-GA", "-GA")],
        parents: &[],
        imports: &[],
        plugins: &["org.apache.maven.plugins:maven-compiler-plugin:maven-plugin:3.8.1"],
    },
    StepRules {
        from: 11,
        to: 17,
        updates: &[
            "org.projectlombok:lombok:*:1.18.22",
            "org.ow2.asm:asm:*:9.2",
            "org.ow2.asm:asm-commons:*:9.2",
            "org.ow2.asm:asm-tree:*:9.2",
            "net.bytebuddy:byte-buddy:*:1.12.10",
            "net.bytebuddy:byte-buddy-agent:*:1.12.10",
            "org.mockito:mockito-core:*:3.12.4",
        ],
        renames: &[],
        marked: &[],
        parents: &["org.springframework.boot:spring-boot-starter-parent:pom:2.5.14"],
        imports: &["org.springframework.boot:spring-boot-dependencies:pom:2.5.14"],
        plugins: &["org.apache.maven.plugins:maven-compiler-plugin:maven-plugin:3.8.1"],
    },
    StepRules {
        from: 17,
        to: 21,
        updates: &[
            "org.projectlombok:lombok:*:1.18.30",
            "org.ow2.asm:asm:*:9.5",
            "org.ow2.asm:asm-commons:*:9.5",
            "org.ow2.asm:asm-tree:*:9.5",
            "net.bytebuddy:byte-buddy:*:1.14.9",
            "net.bytebuddy:byte-buddy-agent:*:1.14.9",
            "org.mockito:mockito-core:*:5.6.0",
        ],
        renames: &[],
        marked: &[],
        parents: &["org.springframework.boot:spring-boot-starter-parent:pom:2.7.18"],
        imports: &["org.springframework.boot:spring-boot-dependencies:pom:2.7.18"],
        plugins: &["org.apache.maven.plugins:maven-compiler-plugin:maven-plugin:3.11.0"],
    },
];

/// Artifacts restoring a JDK module removed in JDK 11.
const REMOVED_MODULES: &[(&str, &[&str])] = &[
    (
        "java.xml.bind",
        &["javax.xml.bind:jaxb-api:jar:2.3.1", "org.glassfish.jaxb:jaxb-runtime:jar:2.3.1"],
    ),
    ("java.activation", &["javax.activation:javax.activation-api:jar:1.2.0"]),
    ("java.xml.ws.annotation", &["javax.annotation:javax.annotation-api:jar:1.3.2"]),
    (
        "java.xml.ws",
        &["javax.xml.ws:jaxws-api:jar:2.3.1", "com.sun.xml.ws:jaxws-rt:jar:2.3.2"],
    ),
    ("java.transaction", &["javax.transaction:javax.transaction-api:jar:1.3"]),
    ("java.corba", &["org.glassfish.corba:glassfish-corba-omgapi:jar:4.2.1"]),
];

pub fn removed_module_replacements(module: &str) -> Option<&'static [&'static str]> {
    REMOVED_MODULES.iter().find(|(m, _)| *m == module).map(|(_, gatvs)| *gatvs)
}

// ============================================================================
// MigrationRules
// ============================================================================

/// The merged rule set of every hop between two JDK releases.
#[derive(Debug, Clone, Default)]
pub struct MigrationRules {
    from: u32,
    to: u32,
    /// GA -> same-GA target.
    updates: BTreeMap<String, &'static str>,
    renames: BTreeMap<&'static str, &'static str>,
    marked: BTreeMap<String, (&'static str, &'static str)>,
    parents: BTreeMap<String, &'static str>,
    imports: BTreeMap<String, &'static str>,
    plugins: BTreeMap<String, &'static str>,
}

fn check_version(version: u32) -> AutofixResult<()> {
    if SUPPORTED_VERSIONS.contains(&version) {
        Ok(())
    } else {
        Err(AutofixError::Config(format!(
            "unsupported JDK version {version}, expected one of {SUPPORTED_VERSIONS:?}"
        )))
    }
}

fn by_ga(map: &mut BTreeMap<String, &'static str>, gatvs: &[&'static str]) {
    for gatv in gatvs {
        map.insert(truncate_to_ga(gatv).to_string(), gatv);
    }
}

impl MigrationRules {
    pub fn new(from: u32, to: u32) -> AutofixResult<Self> {
        check_version(from)?;
        check_version(to)?;
        if from >= to {
            return Err(AutofixError::Config(format!(
                "toVersion {to} must be newer than fromVersion {from}"
            )));
        }

        let mut rules = MigrationRules {
            from,
            to,
            ..Default::default()
        };
        for step in STEPS.iter().filter(|s| s.from >= from && s.to <= to) {
            debug!("rules for JDK {} -> {}", step.from, step.to);
            by_ga(&mut rules.updates, step.updates);
            by_ga(&mut rules.parents, step.parents);
            by_ga(&mut rules.imports, step.imports);
            by_ga(&mut rules.plugins, step.plugins);
            rules.renames.extend(step.renames.iter().copied());
            for (to, marker) in step.marked {
                rules.marked.insert(truncate_to_ga(to).to_string(), (*to, *marker));
            }
        }
        Ok(rules)
    }

    pub fn from_version(&self) -> u32 {
        self.from
    }

    pub fn to_version(&self) -> u32 {
        self.to
    }

    /// Same-GA target version for `ga`, if any hop bumps it.
    pub fn target_version(&self, ga: &str) -> Option<&str> {
        self.updates
            .get(ga)
            .and_then(|gatv| gatv.rsplit(':').next())
    }

    fn crosses(&self, release: u32) -> bool {
        self.from < release && release <= self.to
    }

    /// Record every intent of this rule set on `generator`.
    pub fn register(
        &self,
        generator: &mut PomUpdatePlanGenerator,
        findings: &[CheckResultContext],
        jdk_jars: Option<JdkInternalJarMatcher>,
    ) -> AutofixResult<()> {
        for to in self.updates.values() {
            generator.update_by_rule(DependencyUpdateRule::same_ga(to)?);
        }
        for (from, to) in &self.renames {
            generator.update_by_rule(DependencyUpdateRule::change_ga(from, to)?);
        }
        for (to, marker) in self.marked.values() {
            generator.update_by_rule(DependencyUpdateRule::marked(to, marker)?);
        }
        for gatv in self.parents.values() {
            generator.update_parent_dependency(gatv)?;
        }
        for gatv in self.imports.values() {
            generator.update_import_dependency(gatv)?;
        }
        for gatv in self.plugins.values() {
            generator.update_plugin(gatv)?;
        }

        let lombok_bumped = self
            .target_version(LOMBOK)
            .is_some_and(|v| !should_update(v, LOMBOK_MAPSTRUCT_BINDING_SINCE));
        if lombok_bumped
            && generator.any_node(|n| n.ga() == LOMBOK && should_update(&n.version, LOMBOK_MAPSTRUCT_BINDING_SINCE))
        {
            generator.add_dependency(LOMBOK_MAPSTRUCT_BINDING, None)?;
        }

        if self.crosses(11) {
            for finding in findings {
                let FindingKind::RemovedModule { module } = &finding.kind else {
                    continue;
                };
                match removed_module_replacements(module) {
                    Some(gatvs) => {
                        for gatv in gatvs {
                            generator.add_dependency(gatv, None)?;
                        }
                    }
                    None => debug!("no replacement known for removed module {}", module),
                }
            }
        }

        if self.crosses(9) {
            match jdk_jars {
                Some(matcher) => generator.exclude_dependency(ExclusionTarget::JdkInternal(matcher)),
                None => info!("JDK internal jar exclusion skipped"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maven::session::tests::{session_from, APP, PARENT};
    use crate::maven::MavenSession;
    use crate::report::AutofixReport;
    use std::path::PathBuf;

    fn session() -> MavenSession {
        let mut session = session_from(&[("/p/pom.xml", PARENT), ("/p/app/pom.xml", APP)]);
        session.derive_declared_trees();
        let sources = [PathBuf::from("/p/app/src/main/java/A.java")];
        session.assign_sources(sources.iter().map(PathBuf::as_path));
        session
    }

    #[test]
    fn test_version_validation() {
        assert!(MigrationRules::new(8, 11).is_ok());
        assert!(MigrationRules::new(8, 21).is_ok());
        assert!(matches!(MigrationRules::new(9, 11), Err(AutofixError::Config(_))));
        assert!(matches!(MigrationRules::new(17, 11), Err(AutofixError::Config(_))));
        assert!(matches!(MigrationRules::new(11, 11), Err(AutofixError::Config(_))));
    }

    #[test]
    fn test_later_hop_wins() {
        let rules = MigrationRules::new(8, 21).unwrap();
        assert_eq!(rules.target_version(LOMBOK), Some("1.18.30"));
        assert_eq!(rules.target_version("org.ow2.asm:asm"), Some("9.5"));
        // only the first hop renames javassist
        assert_eq!(rules.renames.len(), 1);

        let rules = MigrationRules::new(11, 17).unwrap();
        assert_eq!(rules.target_version(LOMBOK), Some("1.18.22"));
        assert!(rules.renames.is_empty());
        assert!(rules.target_version("cglib:cglib").is_none());
    }

    #[test]
    fn test_removed_module_catalog() {
        assert_eq!(removed_module_replacements("java.xml.bind").map(|g| g.len()), Some(2));
        assert_eq!(
            removed_module_replacements("java.activation"),
            Some(&["javax.activation:javax.activation-api:jar:1.2.0"][..])
        );
        assert!(removed_module_replacements("java.base").is_none());
    }

    #[test]
    fn test_old_lombok_adds_mapstruct_binding() {
        let session = session();
        let mut generator = PomUpdatePlanGenerator::new(&session);
        MigrationRules::new(8, 11)
            .unwrap()
            .register(&mut generator, &[], None)
            .unwrap();
        let plan = generator.generate_plan(&mut AutofixReport::new()).unwrap();

        assert_eq!(
            plan.update_map.get("org.projectlombok:lombok:jar:1.18.10").map(String::as_str),
            Some("org.projectlombok:lombok:jar:1.18.22")
        );
        assert!(plan.newly_added.contains(LOMBOK_MAPSTRUCT_BINDING));
    }

    #[test]
    fn test_removed_module_findings_become_additions() {
        let session = session();
        let findings = vec![CheckResultContext {
            feature: "jaxb".to_string(),
            kind: FindingKind::RemovedModule {
                module: "java.xml.bind".to_string(),
            },
            file: None,
        }];

        let mut generator = PomUpdatePlanGenerator::new(&session);
        MigrationRules::new(8, 11)
            .unwrap()
            .register(&mut generator, &findings, None)
            .unwrap();
        let plan = generator.generate_plan(&mut AutofixReport::new()).unwrap();
        assert!(plan.ensured.contains("javax.xml.bind:jaxb-api"));
        assert!(plan.ensured.contains("org.glassfish.jaxb:jaxb-runtime"));

        // modules were already gone before 11
        let mut generator = PomUpdatePlanGenerator::new(&session);
        MigrationRules::new(11, 17)
            .unwrap()
            .register(&mut generator, &findings, None)
            .unwrap();
        let plan = generator.generate_plan(&mut AutofixReport::new()).unwrap();
        assert!(!plan.ensured.contains("javax.xml.bind:jaxb-api"));
        assert!(!plan.ensured.contains("org.glassfish.jaxb:jaxb-runtime"));
        // the old lombok still pulls in the binding on this hop
        assert!(plan.ensured.contains("org.projectlombok:lombok-mapstruct-binding"));
    }
}
