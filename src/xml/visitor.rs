// ============================================================================
// XmlVisitor - 单次前序遍历 + 后续访问队列
// ============================================================================
//
// A visitor walks the tree once (pre-order, `visit_tag` before children,
// `leave_tag` after) and returns replacement nodes. Work that depends on the
// result of the current pass is scheduled on the cursor and runs after the
// pass completes, in FIFO order, against the updated document.

use super::{Content, Tag, TagId, TagTemplate, XmlDocument};
use crate::maven::ModuleId;
use crate::report::ReporterId;
use anyhow::{anyhow, Result};
use std::collections::{HashSet, VecDeque};

pub trait XmlVisitor {
    fn name(&self) -> &'static str;

    fn enter_document(&self, _doc: &XmlDocument, _cursor: &mut Cursor) -> Result<()> {
        Ok(())
    }

    /// Return `None` to remove the tag (and the whitespace in front of it).
    fn visit_tag(&self, tag: Tag, _cursor: &mut Cursor) -> Result<Option<Tag>> {
        Ok(Some(tag))
    }

    fn leave_tag(&self, tag: Tag, _cursor: &mut Cursor) -> Result<Tag> {
        Ok(tag)
    }

    fn leave_document(&self, doc: XmlDocument, _cursor: &mut Cursor) -> Result<XmlDocument> {
        Ok(doc)
    }
}

/// Snapshot of an enclosing tag, enough for container predicates.
#[derive(Debug, Clone)]
pub struct Ancestor {
    pub id: TagId,
    pub name: String,
    pub artifact_id: Option<String>,
}

pub struct Cursor {
    module: Option<ModuleId>,
    ancestors: Vec<Ancestor>,
    messages: HashSet<String>,
    scheduled: Vec<Box<dyn XmlVisitor>>,
    fired: Vec<ReporterId>,
    next_id: u32,
    indent_unit: String,
}

impl Cursor {
    fn new(doc: &XmlDocument, module: Option<ModuleId>) -> Self {
        Cursor {
            module,
            ancestors: Vec::new(),
            messages: HashSet::new(),
            scheduled: Vec::new(),
            fired: Vec::new(),
            next_id: doc.next_id(),
            indent_unit: doc.indent_unit(),
        }
    }

    pub fn module(&self) -> Option<ModuleId> {
        self.module
    }

    pub fn ancestors(&self) -> &[Ancestor] {
        &self.ancestors
    }

    pub fn parent(&self) -> Option<&Ancestor> {
        self.ancestors.last()
    }

    /// `true` when the enclosing tags are exactly `path`, root first.
    pub fn in_path(&self, path: &[&str]) -> bool {
        self.ancestors.len() == path.len()
            && self.ancestors.iter().zip(path).all(|(a, p)| a.name == *p)
    }

    pub fn put_message(&mut self, key: impl Into<String>) {
        self.messages.insert(key.into());
    }

    pub fn has_message(&self, key: &str) -> bool {
        self.messages.contains(key)
    }

    pub fn schedule(&mut self, visitor: Box<dyn XmlVisitor>) {
        self.scheduled.push(visitor);
    }

    pub fn report(&mut self, reporter: ReporterId) {
        self.fired.push(reporter);
    }

    pub fn indent_unit(&self) -> &str {
        &self.indent_unit
    }

    pub fn build(&mut self, template: &TagTemplate) -> Tag {
        template.build(&mut self.next_id)
    }
}

/// Result of running a visitor (and everything it scheduled) over a document.
pub struct VisitOutcome {
    pub document: XmlDocument,
    pub fired: Vec<ReporterId>,
}

pub fn run_visitor(
    doc: XmlDocument,
    visitor: Box<dyn XmlVisitor>,
    module: Option<ModuleId>,
) -> Result<VisitOutcome> {
    let mut queue: VecDeque<Box<dyn XmlVisitor>> = VecDeque::from([visitor]);
    let mut doc = doc;
    let mut fired = Vec::new();

    while let Some(visitor) = queue.pop_front() {
        let mut cursor = Cursor::new(&doc, module);
        doc = walk_document(doc, visitor.as_ref(), &mut cursor)
            .map_err(|e| e.context(format!("visitor {} failed", visitor.name())))?;
        doc = doc.with_next_id(cursor.next_id);
        fired.append(&mut cursor.fired);
        queue.extend(cursor.scheduled.drain(..));
    }

    Ok(VisitOutcome { document: doc, fired })
}

fn walk_document(doc: XmlDocument, visitor: &dyn XmlVisitor, cursor: &mut Cursor) -> Result<XmlDocument> {
    visitor.enter_document(&doc, cursor)?;
    let root = doc.root().clone();
    let root = walk_tag(root, visitor, cursor)?
        .ok_or_else(|| anyhow!("root element cannot be removed"))?;
    let doc = doc.with_root(root);
    visitor.leave_document(doc, cursor)
}

fn walk_tag(tag: Tag, visitor: &dyn XmlVisitor, cursor: &mut Cursor) -> Result<Option<Tag>> {
    let Some(mut tag) = visitor.visit_tag(tag, cursor)? else {
        return Ok(None);
    };

    if let Some(content) = tag.content.take() {
        cursor.ancestors.push(Ancestor {
            id: tag.id,
            name: tag.name.clone(),
            artifact_id: child_value_in(&content, "artifactId"),
        });
        let mut walked = Vec::with_capacity(content.len());
        for item in content {
            match item {
                Content::Tag(child) => {
                    if let Some(child) = walk_tag(child, visitor, cursor)? {
                        walked.push(Content::Tag(child));
                    }
                }
                other => walked.push(other),
            }
        }
        cursor.ancestors.pop();
        tag.content = Some(walked);
    }

    visitor.leave_tag(tag, cursor).map(Some)
}

fn child_value_in(content: &[Content], name: &str) -> Option<String> {
    content
        .iter()
        .filter_map(Content::as_tag)
        .find(|t| t.name == name)
        .and_then(Tag::value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    struct Rename;

    impl XmlVisitor for Rename {
        fn name(&self) -> &'static str {
            "rename"
        }

        fn visit_tag(&self, tag: Tag, cursor: &mut Cursor) -> Result<Option<Tag>> {
            if tag.name() == "a" && cursor.in_path(&["root"]) {
                cursor.put_message("seen");
                return Ok(Some(tag.with_value("renamed")));
            }
            if tag.name() == "drop" {
                return Ok(None);
            }
            Ok(Some(tag))
        }

        fn leave_document(&self, doc: XmlDocument, cursor: &mut Cursor) -> Result<XmlDocument> {
            if cursor.has_message("seen") {
                cursor.schedule(Box::new(AppendB));
            }
            Ok(doc)
        }
    }

    struct AppendB;

    impl XmlVisitor for AppendB {
        fn name(&self) -> &'static str {
            "append"
        }

        fn visit_tag(&self, tag: Tag, cursor: &mut Cursor) -> Result<Option<Tag>> {
            if tag.name() == "root" {
                let b = cursor.build(&TagTemplate::leaf("b", "new"));
                let unit = cursor.indent_unit().to_string();
                return Ok(Some(tag.append_child(b, &unit)));
            }
            Ok(Some(tag))
        }
    }

    #[test]
    fn test_scheduled_visitor_runs_after_pass() {
        let doc = XmlDocument::parse(
            Path::new("t.xml"),
            "<root>\n  <a>x</a>\n  <drop/>\n</root>",
        )
        .unwrap();
        let outcome = run_visitor(doc, Box::new(Rename), None).unwrap();
        assert_eq!(
            outcome.document.print(),
            "<root>\n  <a>renamed</a>\n  <b>new</b>\n</root>"
        );
    }
}
