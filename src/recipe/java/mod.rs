// ============================================================================
// Java 源码重写 - tree-sitter 解析 + 文本替换
// ============================================================================
//
// Code recipes match narrow call shapes with precompiled queries and emit
// byte-range replacements against the original text. Type information is
// limited to what the file itself declares.

pub mod security_manager;
pub mod stream_count;
pub mod ternary_boxing;

pub use security_manager::SecurityManagerCheckRecipe;
pub use stream_count::StreamCountRecipe;
pub use ternary_boxing::TernaryBoxingRecipe;

use super::{JavaSource, SourceFile};
use crate::error::AutofixError;
use anyhow::{anyhow, Result};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tree_sitter::{Node, Parser, Query, QueryCursor, Tree};

// ============================================================================
// thread_local Parser 复用
// ============================================================================

thread_local! {
    static JAVA_PARSER: RefCell<Option<Parser>> = const { RefCell::new(None) };
}

fn with_parser<F, R>(f: F) -> Result<R>
where
    F: FnOnce(&mut Parser) -> Result<R>,
{
    JAVA_PARSER.with(|cell| {
        let mut parser_opt = cell.borrow_mut();

        if parser_opt.is_none() {
            let mut parser = Parser::new();
            parser
                .set_language(&tree_sitter_java::language())
                .map_err(|e| anyhow!("Failed to set language: {e}"))?;
            *parser_opt = Some(parser);
        }

        let parser = parser_opt.as_mut().ok_or_else(|| anyhow!("Java parser unavailable"))?;
        f(parser)
    })
}

pub(crate) fn compile_query(source: &str) -> Result<Query> {
    Query::new(&tree_sitter_java::language(), source).map_err(|e| anyhow!("Failed to compile query: {e}"))
}

// ============================================================================
// JavaFile
// ============================================================================

pub struct JavaFile<'s> {
    text: &'s str,
    tree: Tree,
}

/// One query match: capture index -> node.
pub struct Hit<'t> {
    captures: Vec<(u32, Node<'t>)>,
}

impl<'t> Hit<'t> {
    pub fn get(&self, query: &Query, name: &str) -> Option<Node<'t>> {
        let index = query.capture_index_for_name(name)?;
        self.captures.iter().find(|(i, _)| *i == index).map(|(_, n)| *n)
    }
}

impl<'s> JavaFile<'s> {
    pub fn parse(path: &Path, text: &'s str) -> Result<Self> {
        let tree = with_parser(|parser| {
            parser
                .parse(text, None)
                .ok_or_else(|| anyhow!("parser returned no tree"))
        })?;
        if tree.root_node().has_error() {
            return Err(AutofixError::JavaParse {
                path: path.to_path_buf(),
            }
            .into());
        }
        Ok(JavaFile { text, tree })
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn text_of(&self, node: Node) -> &'s str {
        node.utf8_text(self.text.as_bytes()).unwrap_or("")
    }

    pub fn hits(&self, query: &Query) -> Vec<Hit<'_>> {
        let mut cursor = QueryCursor::new();
        cursor
            .matches(query, self.root(), self.text.as_bytes())
            .map(|m| Hit {
                captures: m.captures.iter().map(|c| (c.index, c.node)).collect(),
            })
            .collect()
    }

    fn identifiers(&self) -> HashSet<&'s str> {
        let mut names = HashSet::new();
        let mut stack = vec![self.root()];
        while let Some(node) = stack.pop() {
            if node.kind() == "identifier" {
                names.insert(self.text_of(node));
            }
            let mut cursor = node.walk();
            stack.extend(node.children(&mut cursor));
        }
        names
    }

    /// `base`, or `base0`, `base1`... when the file already uses the name.
    pub fn fresh_identifier(&self, base: &str) -> String {
        let taken = self.identifiers();
        if !taken.contains(base) {
            return base.to_string();
        }
        (0..)
            .map(|i| format!("{base}{i}"))
            .find(|name| !taken.contains(name.as_str()))
            .unwrap_or_else(|| base.to_string())
    }
}

// ============================================================================
// 声明索引 - 变量类型 / 方法返回类型
// ============================================================================

const DECLARATIONS: &str = r#"
(local_variable_declaration type: (_) @var_type declarator: (variable_declarator name: (identifier) @var_name))
(field_declaration type: (_) @var_type declarator: (variable_declarator name: (identifier) @var_name))
(formal_parameter type: (_) @var_type name: (identifier) @var_name)
(enhanced_for_statement type: (_) @var_type name: (identifier) @var_name)
(method_declaration type: (_) @method_type name: (identifier) @method_name)
"#;

/// Declared variable types and method return types of one file, by simple
/// name. Scopes are not tracked; the last declaration wins.
#[derive(Debug, Default)]
pub struct Declarations {
    pub variables: HashMap<String, String>,
    pub methods: HashMap<String, String>,
}

impl Declarations {
    pub fn variable_type(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn method_type(&self, name: &str) -> Option<&str> {
        self.methods.get(name).map(String::as_str)
    }
}

pub struct DeclarationQuery {
    query: Query,
}

impl DeclarationQuery {
    pub fn new() -> Result<Self> {
        Ok(DeclarationQuery {
            query: compile_query(DECLARATIONS)?,
        })
    }

    pub fn collect(&self, file: &JavaFile) -> Declarations {
        let mut decls = Declarations::default();
        for hit in file.hits(&self.query) {
            if let (Some(ty), Some(name)) = (hit.get(&self.query, "var_type"), hit.get(&self.query, "var_name")) {
                decls
                    .variables
                    .insert(file.text_of(name).to_string(), file.text_of(ty).to_string());
            }
            if let (Some(ty), Some(name)) = (hit.get(&self.query, "method_type"), hit.get(&self.query, "method_name")) {
                decls
                    .methods
                    .insert(file.text_of(name).to_string(), file.text_of(ty).to_string());
            }
        }
        decls
    }
}

/// `java.util.Map<K, V>` -> `Map`.
pub fn base_type(ty: &str) -> &str {
    let raw = ty.split('<').next().unwrap_or(ty).trim();
    raw.rsplit('.').next().unwrap_or(raw)
}

/// Top-level type arguments: `Map<String, List<Integer>>` -> `[String, List<Integer>]`.
pub fn type_arguments(ty: &str) -> Vec<&str> {
    let (Some(open), Some(close)) = (ty.find('<'), ty.rfind('>')) else {
        return Vec::new();
    };
    if close <= open {
        return Vec::new();
    }
    let inner = &ty[open + 1..close];
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in inner.char_indices() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                args.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    args.push(inner[start..].trim());
    args
}

// ============================================================================
// 文本编辑
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

impl TextEdit {
    pub fn replace(node: Node, replacement: String) -> Self {
        TextEdit {
            start: node.start_byte(),
            end: node.end_byte(),
            replacement,
        }
    }
}

/// Apply non-overlapping edits; an edit overlapping an earlier one is dropped.
pub fn apply_edits(text: &str, mut edits: Vec<TextEdit>) -> String {
    edits.sort_by_key(|e| (e.start, e.end));
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    for edit in edits {
        if edit.start < pos || edit.end > text.len() {
            continue;
        }
        out.push_str(&text[pos..edit.start]);
        out.push_str(&edit.replacement);
        pos = edit.end;
    }
    out.push_str(&text[pos..]);
    out
}

/// Parse a Java source, collect edits, return the rewritten copy. Other
/// files pass through.
pub(crate) fn rewrite_java<F>(source: &SourceFile, collect: F) -> Result<SourceFile>
where
    F: FnOnce(&JavaFile) -> Vec<TextEdit>,
{
    let SourceFile::Java(java) = source else {
        return Ok(source.clone());
    };
    let file = JavaFile::parse(&java.path, &java.text)?;
    let edits = collect(&file);
    if edits.is_empty() {
        return Ok(source.clone());
    }
    Ok(SourceFile::Java(JavaSource {
        text: apply_edits(&java.text, edits),
        ..java.clone()
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::recipe::Charset;
    use std::path::PathBuf;

    pub(crate) fn java(text: &str) -> SourceFile {
        SourceFile::Java(JavaSource {
            path: PathBuf::from("src/main/java/A.java"),
            module: None,
            charset: Charset::Utf8,
            text: text.to_string(),
        })
    }

    #[test]
    fn test_type_helpers() {
        assert_eq!(base_type("java.util.Map<String, Integer>"), "Map");
        assert_eq!(base_type("IntStream"), "IntStream");
        assert_eq!(type_arguments("Map<String, List<Integer>>"), ["String", "List<Integer>"]);
        assert!(type_arguments("long").is_empty());
    }

    #[test]
    fn test_apply_edits_skips_overlaps() {
        let text = "abcdef";
        let edits = vec![
            TextEdit { start: 4, end: 6, replacement: "EF".to_string() },
            TextEdit { start: 0, end: 2, replacement: "AB".to_string() },
            TextEdit { start: 1, end: 3, replacement: "??".to_string() },
        ];
        assert_eq!(apply_edits(text, edits), "ABcdEF");
    }

    #[test]
    fn test_declarations_and_parse_errors() {
        let text = "class A { Integer total(java.util.Map<String, Integer> m) { long n = 1; return 0; } }";
        let file = JavaFile::parse(Path::new("A.java"), text).unwrap();
        let decls = DeclarationQuery::new().unwrap().collect(&file);
        assert_eq!(decls.variable_type("m"), Some("java.util.Map<String, Integer>"));
        assert_eq!(decls.variable_type("n"), Some("long"));
        assert_eq!(decls.method_type("total"), Some("Integer"));
        assert_eq!(file.fresh_identifier("n"), "n0");
        assert_eq!(file.fresh_identifier("x"), "x");

        assert!(JavaFile::parse(Path::new("B.java"), "class B { void f( }").is_err());
    }
}
