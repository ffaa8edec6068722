// ============================================================================
// Maven 模型 - modules, POM index, dependency trees, matchers, rules
// ============================================================================

pub mod dependency_tree;
pub mod matcher;
pub mod resolution;
pub mod rule;
pub mod session;

pub use dependency_tree::{DependencyTree, DtNode, DtNodeId};
pub use matcher::{DtNodeMatcher, JdkInternalJarMatcher};
pub use resolution::{DependencyEntry, PomResolution, PomScanRecipe, PropertyEntry, TagRef};
pub use rule::DependencyUpdateRule;
pub use session::{MavenSession, Module, ModuleId, ResolvePolicy, ValueSource};
