// ============================================================================
// TernaryBoxingRecipe - 三元表达式中的自动拆箱
// ============================================================================
//
// `c ? map.get(k) : 0` unboxes the call result and throws on null. Boxing
// the primitive branch keeps the whole expression a reference.

use super::{base_type, compile_query, rewrite_java, type_arguments, DeclarationQuery, Declarations, JavaFile, TextEdit};
use crate::recipe::{Recipe, RecipeContext, SourceFile};
use crate::report::{CountPolicy, Reporter};
use anyhow::Result;
use tree_sitter::{Node, Query};

const TERNARY: &str = r#"
(ternary_expression
    consequence: (_) @then
    alternative: (_) @else) @ternary
"#;

/// Wrapper class -> primitive.
const WRAPPERS: &[(&str, &str)] = &[
    ("Boolean", "boolean"),
    ("Byte", "byte"),
    ("Short", "short"),
    ("Character", "char"),
    ("Integer", "int"),
    ("Long", "long"),
    ("Float", "float"),
    ("Double", "double"),
];

fn unboxed(wrapper: &str) -> Option<&'static str> {
    WRAPPERS.iter().find(|(w, _)| *w == wrapper).map(|(_, p)| *p)
}

fn wrapper_name(ty: &str) -> Option<&'static str> {
    let base = base_type(ty);
    WRAPPERS.iter().find(|(w, _)| *w == base).map(|(w, _)| *w)
}

fn primitive_name(ty: &str) -> Option<&'static str> {
    WRAPPERS.iter().map(|(_, p)| *p).find(|p| *p == ty.trim())
}

/// Primitive widening allowed in a method argument position.
fn widens(from: &str, to: &str) -> bool {
    if from == to {
        return true;
    }
    let targets: &[&str] = match from {
        "byte" => &["short", "int", "long", "float", "double"],
        "short" | "char" => &["int", "long", "float", "double"],
        "int" => &["long", "float", "double"],
        "long" => &["float", "double"],
        "float" => &["double"],
        _ => &[],
    };
    targets.contains(&to)
}

pub struct TernaryBoxingRecipe {
    query: Query,
    declarations: DeclarationQuery,
}

impl TernaryBoxingRecipe {
    pub fn new() -> Result<Self> {
        Ok(TernaryBoxingRecipe {
            query: compile_query(TERNARY)?,
            declarations: DeclarationQuery::new()?,
        })
    }

    fn edits(&self, file: &JavaFile) -> Vec<TextEdit> {
        let decls = self.declarations.collect(file);
        let mut edits = Vec::new();

        for hit in file.hits(&self.query) {
            let (Some(then), Some(otherwise)) = (hit.get(&self.query, "then"), hit.get(&self.query, "else")) else {
                continue;
            };
            let branches = [(then, otherwise), (otherwise, then)];
            for (boxed, primitive) in branches {
                let Some(wrapper) = boxed_call_type(file, &decls, boxed) else {
                    continue;
                };
                let Some(prim) = primitive_type(file, &decls, primitive) else {
                    continue;
                };
                if unboxed(wrapper).is_some_and(|target| widens(prim, target)) {
                    edits.push(TextEdit::replace(
                        primitive,
                        format!("{wrapper}.valueOf({})", file.text_of(primitive)),
                    ));
                    break;
                }
            }
        }
        edits
    }
}

/// Wrapper class returned by a call branch, when the file tells us.
fn boxed_call_type(file: &JavaFile, decls: &Declarations, node: Node) -> Option<&'static str> {
    if node.kind() != "method_invocation" {
        return None;
    }
    let name = file.text_of(node.child_by_field_name("name")?);
    match node.child_by_field_name("object") {
        None => wrapper_name(decls.method_type(name)?),
        Some(object) if object.kind() == "this" => wrapper_name(decls.method_type(name)?),
        Some(object) if name == "get" && object.kind() == "identifier" => {
            let declared = decls.variable_type(file.text_of(object))?;
            let base = base_type(declared);
            let args = type_arguments(declared);
            let element = if base.ends_with("Map") {
                args.last()
            } else if base.ends_with("List") {
                args.first()
            } else {
                None
            };
            wrapper_name(element?)
        }
        Some(_) => None,
    }
}

fn primitive_type(file: &JavaFile, decls: &Declarations, node: Node) -> Option<&'static str> {
    let text = file.text_of(node);
    match node.kind() {
        "decimal_integer_literal" | "hex_integer_literal" | "octal_integer_literal" | "binary_integer_literal" => {
            Some(if text.ends_with(&['l', 'L'][..]) { "long" } else { "int" })
        }
        "decimal_floating_point_literal" | "hex_floating_point_literal" => {
            Some(if text.ends_with(&['f', 'F'][..]) { "float" } else { "double" })
        }
        "character_literal" => Some("char"),
        "true" | "false" => Some("boolean"),
        "identifier" => primitive_name(decls.variable_type(text)?),
        "cast_expression" => primitive_name(file.text_of(node.child_by_field_name("type")?)),
        "parenthesized_expression" | "unary_expression" => {
            let inner = node.named_child(node.named_child_count().checked_sub(1)?)?;
            primitive_type(file, decls, inner)
        }
        _ => None,
    }
}

impl Recipe for TernaryBoxingRecipe {
    fn name(&self) -> &'static str {
        "ternary-boxing"
    }

    fn display_name(&self) -> &'static str {
        "Box primitive ternary branches"
    }

    fn description(&self) -> &'static str {
        "Wraps the primitive branch of a ternary whose other branch returns a boxed value, avoiding unboxing of null."
    }

    fn reporter(&self) -> Option<Reporter> {
        Some(Reporter::new("ternary_boxing", &[], CountPolicy::DistinctFiles))
    }

    fn fixed_apis(&self) -> &'static [&'static str] {
        &["conditional-expression-unboxing"]
    }

    fn visit(&self, source: &SourceFile, _ctx: &mut RecipeContext) -> Result<SourceFile> {
        rewrite_java(source, |file| self.edits(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PomUpdatePlan;
    use crate::recipe::java::tests::java;

    const SOURCE: &str = r#"import java.util.List;
import java.util.Map;

class Lookup {
    Integer cached(String k) { return null; }

    Long total(Map<String, Integer> counts, List<Long> totals, String k, boolean c, long n, int i) {
        Integer a = c ? counts.get(k) : 0;
        Integer b = c ? 0 : cached(k);
        Long d = c ? totals.get(0) : i;
        Integer e = c ? Integer.valueOf(1) : 0;
        Integer g = c ? counts.get(k) : null;
        Integer h = c ? counts.get(k) : 5L;
        Integer j = c ? cached(k) : (-1);
        return d;
    }
}
"#;

    fn run(text: &str) -> String {
        let recipe = TernaryBoxingRecipe::new().unwrap();
        let plan = PomUpdatePlan::default();
        recipe.visit(&java(text), &mut RecipeContext::new(&plan)).unwrap().print()
    }

    #[test]
    fn test_primitive_branch_boxed() {
        let out = run(SOURCE);
        assert!(out.contains("Integer a = c ? counts.get(k) : Integer.valueOf(0);"));
        assert!(out.contains("Integer b = c ? Integer.valueOf(0) : cached(k);"));
        assert!(out.contains("Long d = c ? totals.get(0) : Long.valueOf(i);"));
        assert!(out.contains("Integer j = c ? cached(k) : Integer.valueOf((-1));"));
    }

    #[test]
    fn test_mismatched_shapes_untouched() {
        let out = run(SOURCE);
        // call of unknown return type, null branch, narrowing
        assert!(out.contains("Integer e = c ? Integer.valueOf(1) : 0;"));
        assert!(out.contains("Integer g = c ? counts.get(k) : null;"));
        assert!(out.contains("Integer h = c ? counts.get(k) : 5L;"));
        assert_eq!(run(&out), out);
    }
}
