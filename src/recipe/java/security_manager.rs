// ============================================================================
// SecurityManagerCheckRecipe - JDK 11 删除的 SecurityManager.check* 方法
// ============================================================================

use super::{base_type, compile_query, rewrite_java, DeclarationQuery, Declarations, JavaFile, TextEdit};
use crate::recipe::{Recipe, RecipeContext, SourceFile};
use crate::report::{CountPolicy, Reporter};
use anyhow::Result;
use tree_sitter::{Node, Query};

// Statement position only: checkTopLevelWindow returned boolean, the
// replacement is void.
const CHECK_CALL: &str = r#"
(expression_statement
    (method_invocation
        object: (_) @receiver
        name: (identifier) @name) @call)
"#;

/// Removed method -> replacement call.
const REPLACEMENTS: &[(&str, &str)] = &[
    ("checkAwtEventQueueAccess", "checkPermission(new java.security.AllPermission())"),
    ("checkSystemClipboardAccess", "checkPermission(new java.security.AllPermission())"),
    ("checkTopLevelWindow", "checkPermission(new java.security.AllPermission())"),
    ("checkMemberAccess", "checkPermission(new RuntimePermission(\"accessDeclaredMembers\"))"),
];

pub struct SecurityManagerCheckRecipe {
    query: Query,
    declarations: DeclarationQuery,
}

impl SecurityManagerCheckRecipe {
    pub fn new() -> Result<Self> {
        Ok(SecurityManagerCheckRecipe {
            query: compile_query(CHECK_CALL)?,
            declarations: DeclarationQuery::new()?,
        })
    }

    fn edits(&self, file: &JavaFile) -> Vec<TextEdit> {
        let decls = self.declarations.collect(file);
        file.hits(&self.query)
            .into_iter()
            .filter_map(|hit| {
                let receiver = hit.get(&self.query, "receiver")?;
                let name = hit.get(&self.query, "name")?;
                let call = hit.get(&self.query, "call")?;
                let method = file.text_of(name);
                let (_, replacement) = REPLACEMENTS.iter().find(|(m, _)| *m == method)?;
                if !is_security_manager(file, &decls, receiver) {
                    return None;
                }
                Some(TextEdit {
                    start: name.start_byte(),
                    end: call.end_byte(),
                    replacement: replacement.to_string(),
                })
            })
            .collect()
    }
}

fn is_security_manager(file: &JavaFile, decls: &Declarations, node: Node) -> bool {
    match node.kind() {
        "identifier" => decls
            .variable_type(file.text_of(node))
            .is_some_and(|ty| base_type(ty) == "SecurityManager"),
        "method_invocation" => {
            let name = node.child_by_field_name("name").map(|n| file.text_of(n));
            let object = node.child_by_field_name("object").map(|n| base_type(file.text_of(n)));
            name == Some("getSecurityManager") && object == Some("System")
        }
        "parenthesized_expression" => node
            .named_child(0)
            .is_some_and(|inner| is_security_manager(file, decls, inner)),
        _ => false,
    }
}

impl Recipe for SecurityManagerCheckRecipe {
    fn name(&self) -> &'static str {
        "security-manager-check"
    }

    fn display_name(&self) -> &'static str {
        "Replace removed SecurityManager checks"
    }

    fn description(&self) -> &'static str {
        "Rewrites SecurityManager check methods removed in JDK 11 to checkPermission calls."
    }

    fn reporter(&self) -> Option<Reporter> {
        Some(Reporter::new("security_manager_check", &[], CountPolicy::DistinctFiles))
    }

    fn fixed_apis(&self) -> &'static [&'static str] {
        &[
            "java.lang.SecurityManager.checkAwtEventQueueAccess",
            "java.lang.SecurityManager.checkSystemClipboardAccess",
            "java.lang.SecurityManager.checkTopLevelWindow",
            "java.lang.SecurityManager.checkMemberAccess",
        ]
    }

    fn visit(&self, source: &SourceFile, _ctx: &mut RecipeContext) -> Result<SourceFile> {
        rewrite_java(source, |file| self.edits(file))
    }
}
