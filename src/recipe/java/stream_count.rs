// ============================================================================
// StreamCountRecipe - peek(...).count() 改写为求和
// ============================================================================
//
// Since JDK 9 `count()` may skip the pipeline when the size is known up
// front, so side effects placed in `peek` stop running. Counting through a
// map-and-sum keeps every element flowing through the pipeline.

use super::{base_type, compile_query, rewrite_java, DeclarationQuery, Declarations, JavaFile, TextEdit};
use crate::recipe::{Recipe, RecipeContext, SourceFile};
use crate::report::{CountPolicy, Reporter};
use anyhow::Result;
use tree_sitter::{Node, Query};

const COUNT_CALL: &str = r#"
(method_invocation
    object: (_) @receiver
    name: (identifier) @name
    arguments: (argument_list) @args
    (#eq? @name "count")) @call
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamKind {
    Object,
    Int,
    Long,
    Double,
}

impl StreamKind {
    fn from_type(name: &str) -> Option<Self> {
        match name {
            "Stream" => Some(StreamKind::Object),
            "IntStream" => Some(StreamKind::Int),
            "LongStream" => Some(StreamKind::Long),
            "DoubleStream" => Some(StreamKind::Double),
            _ => None,
        }
    }
}

/// Intermediate operations that keep the stream kind.
const KIND_PRESERVING: &[&str] = &[
    "peek", "filter", "map", "flatMap", "sorted", "distinct", "limit", "skip", "parallel", "sequential",
    "unordered", "onClose", "takeWhile", "dropWhile",
];

pub struct StreamCountRecipe {
    query: Query,
    declarations: DeclarationQuery,
}

impl StreamCountRecipe {
    pub fn new() -> Result<Self> {
        Ok(StreamCountRecipe {
            query: compile_query(COUNT_CALL)?,
            declarations: DeclarationQuery::new()?,
        })
    }

    fn edits(&self, file: &JavaFile) -> Vec<TextEdit> {
        let decls = self.declarations.collect(file);
        let mut param = None;
        let mut edits = Vec::new();

        for hit in file.hits(&self.query) {
            let (Some(receiver), Some(name), Some(args), Some(call)) = (
                hit.get(&self.query, "receiver"),
                hit.get(&self.query, "name"),
                hit.get(&self.query, "args"),
                hit.get(&self.query, "call"),
            ) else {
                continue;
            };
            if args.named_child_count() > 0 || !chain_has(file, receiver, "peek") {
                continue;
            }
            let Some(kind) = stream_kind(file, &decls, receiver) else {
                continue;
            };

            let x = param.get_or_insert_with(|| file.fresh_identifier("x"));
            let replacement = match kind {
                StreamKind::Long => format!("map({x}->1).sum()"),
                StreamKind::Int | StreamKind::Double | StreamKind::Object => format!("mapToLong({x}->1).sum()"),
            };
            edits.push(TextEdit {
                start: name.start_byte(),
                end: call.end_byte(),
                replacement,
            });
        }
        edits
    }
}

/// Whether `method` is called anywhere along the receiver chain.
fn chain_has(file: &JavaFile, mut node: Node, method: &str) -> bool {
    while node.kind() == "method_invocation" {
        if node.child_by_field_name("name").map(|n| file.text_of(n)) == Some(method) {
            return true;
        }
        match node.child_by_field_name("object") {
            Some(object) => node = object,
            None => return false,
        }
    }
    false
}

fn stream_kind(file: &JavaFile, decls: &Declarations, node: Node) -> Option<StreamKind> {
    match node.kind() {
        "parenthesized_expression" => stream_kind(file, decls, node.named_child(0)?),
        "identifier" => StreamKind::from_type(base_type(decls.variable_type(file.text_of(node))?)),
        "method_invocation" => {
            let name = file.text_of(node.child_by_field_name("name")?);
            let object = node.child_by_field_name("object");

            // IntStream.range(..), Stream.of(..)
            if let Some(kind) = object
                .filter(|o| o.kind() == "identifier")
                .and_then(|o| StreamKind::from_type(file.text_of(o)))
            {
                return Some(kind);
            }

            match name {
                "mapToInt" | "flatMapToInt" | "chars" | "codePoints" => Some(StreamKind::Int),
                "mapToLong" | "flatMapToLong" | "asLongStream" => Some(StreamKind::Long),
                "mapToDouble" | "flatMapToDouble" | "asDoubleStream" => Some(StreamKind::Double),
                "mapToObj" | "boxed" => Some(StreamKind::Object),
                // Arrays.stream(..) depends on the array type
                "stream" | "parallelStream" => match object {
                    Some(o) if base_type(file.text_of(o)) == "Arrays" => None,
                    Some(_) => Some(StreamKind::Object),
                    None => None,
                },
                n if KIND_PRESERVING.contains(&n) => stream_kind(file, decls, object?),
                _ => None,
            }
        }
        _ => None,
    }
}

impl Recipe for StreamCountRecipe {
    fn name(&self) -> &'static str {
        "stream-count"
    }

    fn display_name(&self) -> &'static str {
        "Replace count() after peek()"
    }

    fn description(&self) -> &'static str {
        "Rewrites stream count() calls whose pipeline relies on peek() side effects into a map-and-sum."
    }

    fn reporter(&self) -> Option<Reporter> {
        Some(Reporter::new("stream_count", &[], CountPolicy::DistinctFiles))
    }

    fn fixed_apis(&self) -> &'static [&'static str] {
        &[
            "java.util.stream.Stream.count",
            "java.util.stream.IntStream.count",
            "java.util.stream.LongStream.count",
            "java.util.stream.DoubleStream.count",
        ]
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
import java.util.stream.*;

class Counter {
    long count(List<String> names, IntStream ints, DoubleStream ds) {
        long a = names.stream().peek(System.out::println).count();
        long b = ints.peek(i -> log(i)).count();
        long c = LongStream.range(0, 10).peek(i -> log(i)).count();
        long d = names.stream().mapToInt(String::length).filter(n -> n > 2).peek(n -> log(n)).count();
        long e = ds.peek(v -> log(v)).count();
        long f = names.stream().filter(s -> s.isEmpty()).count();
        long g = java.util.Arrays.stream(new int[0]).peek(i -> log(i)).count();
        return a + b + c + d + e + f + g;
    }

    void log(Object o) {}
}
"#;

    fn run(text: &str) -> String {
        let recipe = StreamCountRecipe::new().unwrap();
        let plan = PomUpdatePlan::default();
        recipe.visit(&java(text), &mut RecipeContext::new(&plan)).unwrap().print()
    }

    #[test]
    fn test_count_rewritten_by_stream_kind() {
        let out = run(SOURCE);
        assert!(out.contains("names.stream().peek(System.out::println).mapToLong(x->1).sum();"));
        assert!(out.contains("ints.peek(i -> log(i)).mapToLong(x->1).sum();"));
        assert!(out.contains("LongStream.range(0, 10).peek(i -> log(i)).map(x->1).sum();"));
        assert!(out.contains(".peek(n -> log(n)).mapToLong(x->1).sum();"));
        assert!(out.contains("ds.peek(v -> log(v)).mapToLong(x->1).sum();"));
        // no peek, and an array stream of unknown kind
        assert!(out.contains("names.stream().filter(s -> s.isEmpty()).count();"));
        assert!(out.contains("java.util.Arrays.stream(new int[0]).peek(i -> log(i)).count();"));
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let once = run(SOURCE);
        assert_eq!(run(&once), once);
    }

    #[test]
    fn test_lambda_parameter_avoids_existing_names() {
        let out = run("class A { long f(java.util.List<String> x) { return x.stream().peek(s -> {}).count(); } }");
        assert!(out.contains("x.stream().peek(s -> {}).mapToLong(x0->1).sum();"));
    }
}
