// ============================================================================
// XML 解析 - quick-xml events folded into the lossless tree
// ============================================================================

use super::{Content, Tag, TagId, XmlDocument};
use crate::error::{AutofixError, AutofixResult};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::Path;

pub(crate) fn parse_document(path: &Path, text: &str) -> AutofixResult<XmlDocument> {
    let (bom, text) = match text.strip_prefix('\u{feff}') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let fail = |message: String| AutofixError::XmlParse {
        path: path.to_path_buf(),
        message,
    };

    // Declaration, comments and doctype before the root stay as raw text.
    let root_start = find_root_start(text).ok_or_else(|| fail("no root element".to_string()))?;
    let prolog = text[..root_start].to_string();
    let body = &text[root_start..];

    let mut reader = Reader::from_str(body);
    reader.trim_text(false);

    let mut next_id: u32 = 0;
    let mut stack: Vec<(Tag, Vec<Content>)> = Vec::new();
    let mut pending_ws = String::new();
    let mut root: Option<Tag> = None;
    let mut root_end = body.len();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| fail(format!("{} at byte {}", e, reader.buffer_position())))?;

        match event {
            Event::Start(e) => {
                let (name, attributes) = split_start(&e);
                let tag = new_tag(&mut next_id, std::mem::take(&mut pending_ws), name, attributes, None);
                stack.push((tag, Vec::new()));
            }
            Event::Empty(e) => {
                let (name, attributes) = split_start(&e);
                let tag = new_tag(&mut next_id, std::mem::take(&mut pending_ws), name, attributes, None);
                if stack.is_empty() {
                    root = Some(tag);
                    root_end = reader.buffer_position();
                    break;
                }
                push_content(&mut stack, Content::Tag(tag));
            }
            Event::End(_) => {
                let Some((mut tag, children)) = stack.pop() else {
                    return Err(fail("unexpected closing tag".to_string()));
                };
                tag.content = Some(children);
                tag.closing_prefix = std::mem::take(&mut pending_ws);
                if stack.is_empty() {
                    root = Some(tag);
                    root_end = reader.buffer_position();
                    break;
                }
                push_content(&mut stack, Content::Tag(tag));
            }
            Event::Text(e) => {
                let raw = String::from_utf8_lossy(&e).into_owned();
                if raw.trim().is_empty() {
                    pending_ws.push_str(&raw);
                } else {
                    let mut text = std::mem::take(&mut pending_ws);
                    text.push_str(&raw);
                    push_content(&mut stack, Content::Text(text));
                }
            }
            Event::Comment(e) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                let prefix = std::mem::take(&mut pending_ws);
                push_content(&mut stack, Content::Comment { prefix, text });
            }
            Event::CData(e) => {
                let text = format!("<![CDATA[{}]]>", String::from_utf8_lossy(&e));
                let prefix = std::mem::take(&mut pending_ws);
                push_content(&mut stack, Content::Raw { prefix, text });
            }
            Event::PI(e) => {
                let text = format!("<?{}?>", String::from_utf8_lossy(&e));
                let prefix = std::mem::take(&mut pending_ws);
                push_content(&mut stack, Content::Raw { prefix, text });
            }
            Event::Decl(_) | Event::DocType(_) => {
                return Err(fail("declaration inside the root element".to_string()));
            }
            Event::Eof => break,
        }
    }

    let root = root.ok_or_else(|| fail("unclosed root element".to_string()))?;
    let epilogue = body[root_end.min(body.len())..].to_string();

    Ok(XmlDocument {
        path: path.to_path_buf(),
        bom,
        prolog,
        root,
        epilogue,
        next_id,
    })
}

fn new_tag(next_id: &mut u32, prefix: String, name: String, attributes: String, content: Option<Vec<Content>>) -> Tag {
    let id = TagId(*next_id);
    *next_id += 1;
    Tag {
        id,
        prefix,
        name,
        attributes,
        content,
        closing_prefix: String::new(),
    }
}

fn split_start(e: &quick_xml::events::BytesStart) -> (String, String) {
    let name_len = e.name().as_ref().len();
    let raw: &[u8] = e;
    let name = String::from_utf8_lossy(&raw[..name_len]).into_owned();
    let attributes = String::from_utf8_lossy(&raw[name_len..]).into_owned();
    (name, attributes)
}

fn push_content(stack: &mut [(Tag, Vec<Content>)], content: Content) {
    if let Some((_, children)) = stack.last_mut() {
        children.push(content);
    }
}

/// Byte offset of the root element's `<`, skipping declarations, comments
/// and the doctype (internal subset brackets included).
fn find_root_start(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        let rest = &text[i..];
        if rest.starts_with("<?") {
            i += rest.find("?>")? + 2;
        } else if rest.starts_with("<!--") {
            i += rest.find("-->")? + 3;
        } else if rest.starts_with("<!") {
            let mut depth = 0usize;
            let mut j = i;
            loop {
                match bytes.get(j)? {
                    b'[' => depth += 1,
                    b']' => depth = depth.saturating_sub(1),
                    b'>' if depth == 0 => break,
                    _ => {}
                }
                j += 1;
            }
            i = j + 1;
        } else {
            return Some(i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(text: &str) {
        let doc = parse_document(Path::new("t.xml"), text).unwrap();
        assert_eq!(doc.print(), text);
    }

    #[test]
    fn test_roundtrip_shapes() {
        roundtrip("<a/>");
        roundtrip("<a x=\"1\" >text &amp; more</a>\n");
        roundtrip("<?xml version=\"1.0\"?>\n<!DOCTYPE a [<!ENTITY e \"x\">]>\n<a>\n  <b />\n  <!-- c -->\n  <d><![CDATA[<raw>]]></d>\n</a>\n<!-- trailing -->\n");
        roundtrip("\u{feff}<project>\r\n\t<x>1</x>\r\n</project>");
    }

    #[test]
    fn test_ids_are_unique() {
        let doc = parse_document(Path::new("t.xml"), "<a><b/><c><d/></c></a>").unwrap();
        let root = doc.root();
        let mut ids = vec![root.id()];
        for child in root.children() {
            ids.push(child.id());
            ids.extend(child.children().map(Tag::id));
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
        assert_eq!(doc.next_id(), 4);
    }

    #[test]
    fn test_rejects_broken_xml() {
        assert!(parse_document(Path::new("t.xml"), "<a><b></a>").is_err());
        assert!(parse_document(Path::new("t.xml"), "just text").is_err());
    }

    #[test]
    fn test_cdata_value() {
        let doc = parse_document(Path::new("t.xml"), "<a><v><![CDATA[1.0]]></v></a>").unwrap();
        assert_eq!(doc.root().child_value("v").as_deref(), Some("1.0"));
    }
}
