// ============================================================================
// 无损 XML 树 - Lossless, immutable XML tree for build descriptors
// ============================================================================
//
// Every node keeps the whitespace in front of it (`prefix`) so printing the
// tree reproduces the input byte for byte. Tags carry a `TagId` assigned at
// parse time; edits keep the id of the tag they rewrite and new tags get
// fresh ids from the document counter. Plans address tags by these ids, never
// by position or by reference.

pub mod matcher;
pub mod parser;
pub mod visitor;

use quick_xml::escape::{partial_escape, unescape};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub use matcher::XmlTagMatcher;
pub use visitor::{Ancestor, Cursor, XmlVisitor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TagId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Tag(Tag),
    /// Raw (escaped) character data, leading whitespace included.
    Text(String),
    Comment { prefix: String, text: String },
    /// CDATA sections and processing instructions, printed verbatim.
    Raw { prefix: String, text: String },
}

impl Content {
    pub fn as_tag(&self) -> Option<&Tag> {
        match self {
            Content::Tag(tag) => Some(tag),
            _ => None,
        }
    }

    fn is_blank_text(&self) -> bool {
        matches!(self, Content::Text(text) if text.trim().is_empty())
    }

    fn write_to(&self, out: &mut String) {
        match self {
            Content::Tag(tag) => tag.write_to(out),
            Content::Text(text) => out.push_str(text),
            Content::Comment { prefix, text } => {
                out.push_str(prefix);
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            Content::Raw { prefix, text } => {
                out.push_str(prefix);
                out.push_str(text);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub(crate) id: TagId,
    pub(crate) prefix: String,
    pub(crate) name: String,
    /// Everything between the name and `>` (or `/>`), leading space included.
    pub(crate) attributes: String,
    /// `None` for a self-closing tag.
    pub(crate) content: Option<Vec<Content>>,
    pub(crate) closing_prefix: String,
}

impl Tag {
    pub fn id(&self) -> TagId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn content(&self) -> &[Content] {
        self.content.as_deref().unwrap_or(&[])
    }

    /// Indentation of this tag: the part of its prefix after the last newline.
    pub fn indent(&self) -> &str {
        match self.prefix.rfind('\n') {
            Some(idx) => &self.prefix[idx + 1..],
            None => "",
        }
    }

    pub fn children(&self) -> impl Iterator<Item = &Tag> {
        self.content().iter().filter_map(Content::as_tag)
    }

    pub fn child(&self, name: &str) -> Option<&Tag> {
        self.children().find(|t| t.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Tag> {
        self.children().filter(move |t| t.name == name)
    }

    pub fn child_value(&self, name: &str) -> Option<String> {
        self.child(name).and_then(Tag::value)
    }

    /// Descend through a `/`-separated path of child names.
    pub fn find(&self, path: &str) -> Option<&Tag> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |tag, name| tag.child(name))
    }

    /// Trimmed, unescaped text of a leaf tag. `None` when the tag has element children.
    pub fn value(&self) -> Option<String> {
        let content = match &self.content {
            Some(content) => content,
            None => return Some(String::new()),
        };
        if content.iter().any(|c| matches!(c, Content::Tag(_))) {
            return None;
        }
        let mut raw = String::new();
        for item in content {
            match item {
                Content::Text(text) => raw.push_str(text),
                Content::Raw { text, .. } if text.starts_with("<![CDATA[") => {
                    raw.push_str(text.trim_start_matches("<![CDATA[").trim_end_matches("]]>"));
                }
                _ => {}
            }
        }
        let unescaped = unescape(&raw).map(|c| c.into_owned()).unwrap_or(raw);
        Some(unescaped.trim().to_string())
    }

    pub fn with_value(&self, value: &str) -> Tag {
        Tag {
            content: Some(vec![Content::Text(partial_escape(value).into_owned())]),
            closing_prefix: String::new(),
            ..self.clone()
        }
    }

    /// Replace the value of the first child named `name`; no-op when absent.
    pub fn with_child_value(&self, name: &str, value: &str) -> Tag {
        let mut replaced = false;
        self.map_children(|child| {
            if !replaced && child.name == name {
                replaced = true;
                child.with_value(value)
            } else {
                child
            }
        })
    }

    pub fn with_prefix(&self, prefix: &str) -> Tag {
        Tag {
            prefix: prefix.to_string(),
            ..self.clone()
        }
    }

    pub fn with_content(&self, content: Vec<Content>) -> Tag {
        Tag {
            content: Some(content),
            ..self.clone()
        }
    }

    pub fn map_children<F>(&self, mut f: F) -> Tag
    where
        F: FnMut(Tag) -> Tag,
    {
        let content = self.content.as_ref().map(|content| {
            content
                .iter()
                .cloned()
                .map(|c| match c {
                    Content::Tag(tag) => Content::Tag(f(tag)),
                    other => other,
                })
                .collect()
        });
        Tag {
            content,
            ..self.clone()
        }
    }

    /// Append `child` as the last element, indented like its siblings.
    pub fn append_child(&self, child: Tag, indent_unit: &str) -> Tag {
        let own_indent = self.indent().to_string();
        let child_prefix = self
            .children()
            .last()
            .map(|t| t.prefix.clone())
            .unwrap_or_else(|| format!("\n{own_indent}{indent_unit}"));
        let child_indent = child_prefix
            .rfind('\n')
            .map_or("", |idx| &child_prefix[idx + 1..])
            .to_string();

        let mut tag = self.clone();
        let content = tag.content.get_or_insert_with(Vec::new);
        let had_elements = content.iter().any(|c| !c.is_blank_text());
        if !had_elements {
            content.clear();
            tag.closing_prefix = format!("\n{own_indent}");
        }
        content.push(Content::Tag(child.reindent(&child_prefix, &child_indent, indent_unit)));
        tag
    }

    /// Lay a freshly built tag out at `indent`, children one unit deeper.
    fn reindent(mut self, prefix: &str, indent: &str, unit: &str) -> Tag {
        self.prefix = prefix.to_string();
        let has_elements = self.children().next().is_some();
        if has_elements {
            let child_indent = format!("{indent}{unit}");
            let child_prefix = format!("\n{child_indent}");
            if let Some(content) = self.content.take() {
                self.content = Some(
                    content
                        .into_iter()
                        .filter(|c| !c.is_blank_text())
                        .map(|c| match c {
                            Content::Tag(t) => {
                                Content::Tag(t.reindent(&child_prefix, &child_indent, unit))
                            }
                            Content::Comment { text, .. } => Content::Comment {
                                prefix: child_prefix.clone(),
                                text,
                            },
                            other => other,
                        })
                        .collect(),
                );
            }
            self.closing_prefix = format!("\n{indent}");
        }
        self
    }

    pub fn print(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        out.push_str(&self.prefix);
        out.push('<');
        out.push_str(&self.name);
        out.push_str(&self.attributes);
        match &self.content {
            None => out.push_str("/>"),
            Some(content) => {
                out.push('>');
                for item in content {
                    item.write_to(out);
                }
                out.push_str(&self.closing_prefix);
                out.push_str("</");
                out.push_str(&self.name);
                out.push('>');
            }
        }
    }
}

// ============================================================================
// TagTemplate - id-less description of tags to be inserted
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagTemplate {
    pub name: String,
    pub value: Option<String>,
    pub children: Vec<TagTemplate>,
}

impl TagTemplate {
    pub fn leaf(name: &str, value: &str) -> Self {
        TagTemplate {
            name: name.to_string(),
            value: Some(value.to_string()),
            children: Vec::new(),
        }
    }

    pub fn element(name: &str, children: Vec<TagTemplate>) -> Self {
        TagTemplate {
            name: name.to_string(),
            value: None,
            children,
        }
    }

    /// `<dependency>` with groupId/artifactId and optional version/type/scope.
    pub fn dependency(
        group: &str,
        artifact: &str,
        version: Option<&str>,
        type_: Option<&str>,
        scope: Option<&str>,
    ) -> Self {
        let mut children = vec![
            TagTemplate::leaf("groupId", group),
            TagTemplate::leaf("artifactId", artifact),
        ];
        if let Some(version) = version {
            children.push(TagTemplate::leaf("version", version));
        }
        if let Some(type_) = type_.filter(|t| *t != "jar") {
            children.push(TagTemplate::leaf("type", type_));
        }
        if let Some(scope) = scope {
            children.push(TagTemplate::leaf("scope", scope));
        }
        TagTemplate::element("dependency", children)
    }

    /// Materialize with ids drawn from `next_id`; layout happens on insertion.
    pub fn build(&self, next_id: &mut u32) -> Tag {
        let id = TagId(*next_id);
        *next_id += 1;
        let content = match &self.value {
            Some(value) => Some(vec![Content::Text(partial_escape(value).into_owned())]),
            None if self.children.is_empty() => Some(Vec::new()),
            None => Some(
                self.children
                    .iter()
                    .map(|c| Content::Tag(c.build(next_id)))
                    .collect(),
            ),
        };
        Tag {
            id,
            prefix: String::new(),
            name: self.name.clone(),
            attributes: String::new(),
            content,
            closing_prefix: String::new(),
        }
    }
}

// ============================================================================
// XmlDocument
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    path: PathBuf,
    bom: bool,
    prolog: String,
    root: Tag,
    epilogue: String,
    next_id: u32,
}

impl XmlDocument {
    pub fn parse(path: &Path, text: &str) -> crate::error::AutofixResult<XmlDocument> {
        parser::parse_document(path, text)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &Tag {
        &self.root
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    pub fn with_root(self, root: Tag) -> XmlDocument {
        XmlDocument { root, ..self }
    }

    pub(crate) fn with_next_id(self, next_id: u32) -> XmlDocument {
        XmlDocument {
            next_id: next_id.max(self.next_id),
            ..self
        }
    }

    /// Indentation step used by the document, taken from the root's first child.
    pub fn indent_unit(&self) -> String {
        self.root
            .children()
            .next()
            .map(|t| t.indent().to_string())
            .filter(|indent| !indent.is_empty())
            .unwrap_or_else(|| "    ".to_string())
    }

    /// Find a tag anywhere in the document by id.
    pub fn find_by_id(&self, id: TagId) -> Option<&Tag> {
        fn search(tag: &Tag, id: TagId) -> Option<&Tag> {
            if tag.id == id {
                return Some(tag);
            }
            tag.children().find_map(|c| search(c, id))
        }
        search(&self.root, id)
    }

    pub fn print(&self) -> String {
        let mut out = String::new();
        if self.bom {
            out.push('\u{feff}');
        }
        out.push_str(&self.prolog);
        self.root.write_to(&mut out);
        out.push_str(&self.epilogue);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- header -->
<project xmlns="http://maven.apache.org/POM/4.0.0">
    <modelVersion>4.0.0</modelVersion>
    <groupId>com.example</groupId>
    <artifactId>demo</artifactId>
    <dependencies>
        <dependency>
            <groupId>org.projectlombok</groupId>
            <artifactId>lombok</artifactId>
            <version>1.18.10</version>
            <optional/>
        </dependency>
    </dependencies>
</project>
"#;

    fn parse(text: &str) -> XmlDocument {
        XmlDocument::parse(Path::new("pom.xml"), text).unwrap()
    }

    #[test]
    fn test_print_is_lossless() {
        assert_eq!(parse(POM).print(), POM);
    }

    #[test]
    fn test_find_and_values() {
        let doc = parse(POM);
        let dep = doc.root().find("dependencies/dependency").unwrap();
        assert_eq!(dep.child_value("artifactId").as_deref(), Some("lombok"));
        assert_eq!(dep.child_value("version").as_deref(), Some("1.18.10"));
        assert_eq!(doc.indent_unit(), "    ");
    }

    #[test]
    fn test_with_child_value_keeps_layout() {
        let doc = parse(POM);
        let dep = doc.root().find("dependencies/dependency").unwrap();
        let updated = dep.with_child_value("version", "1.18.22");
        assert!(updated.print().contains("<version>1.18.22</version>"));
        assert_eq!(updated.id(), dep.id());
        assert_eq!(
            updated.print().replace("1.18.22", "1.18.10"),
            dep.print()
        );
    }

    #[test]
    fn test_append_child_indents_like_siblings() {
        let doc = parse(POM);
        let deps = doc.root().find("dependencies").unwrap();
        let mut next_id = doc.next_id();
        let new_dep = TagTemplate::dependency("g", "a", Some("1"), None, None).build(&mut next_id);
        let printed = deps.append_child(new_dep, "    ").print();
        assert!(printed.contains(
            "\n        <dependency>\n            <groupId>g</groupId>\n            <artifactId>a</artifactId>\n            <version>1</version>\n        </dependency>\n    </dependencies>"
        ));
    }

    #[test]
    fn test_append_child_into_empty_container() {
        let doc = parse("<project>\n    <dependencies/>\n</project>");
        let deps = doc.root().child("dependencies").unwrap();
        let mut next_id = doc.next_id();
        let child = TagTemplate::leaf("module", "x").build(&mut next_id);
        let printed = deps.append_child(child, "    ").print();
        assert_eq!(
            printed,
            "\n    <dependencies>\n        <module>x</module>\n    </dependencies>"
        );
    }
}
