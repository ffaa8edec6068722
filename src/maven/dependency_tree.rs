// ============================================================================
// 依赖树 - DTNode arena + `dependency:tree` dump parser
// ============================================================================
//
// One arena holds the trees of every module. Nodes are appended while the
// dump is read and never mutated afterwards.

use crate::error::{AutofixError, AutofixResult};
use crate::gatv::{ga, Gatv};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DtNodeId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtNode {
    pub group: String,
    pub artifact: String,
    pub type_: String,
    pub classifier: Option<String>,
    pub version: String,
    pub scope: Option<String>,
    parent: Option<DtNodeId>,
    children: Vec<DtNodeId>,
}

impl DtNode {
    pub fn new(group: &str, artifact: &str, type_: &str, version: &str, scope: Option<&str>) -> Self {
        DtNode {
            group: group.to_string(),
            artifact: artifact.to_string(),
            type_: type_.to_string(),
            classifier: None,
            version: version.to_string(),
            scope: scope.map(str::to_string),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn to_gatv(&self) -> Gatv {
        Gatv::new(&self.group, &self.artifact, &self.type_, &self.version)
    }

    pub fn ga(&self) -> String {
        ga(&self.group, &self.artifact)
    }

    pub fn parent(&self) -> Option<DtNodeId> {
        self.parent
    }

    pub fn children(&self) -> &[DtNodeId] {
        &self.children
    }
}

impl fmt::Display for DtNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.group, self.artifact, self.type_, self.version)?;
        if let Some(scope) = &self.scope {
            write!(f, ":{scope}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DependencyTree {
    nodes: Vec<DtNode>,
}

impl DependencyTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: DtNodeId) -> &DtNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add_root(&mut self, node: DtNode) -> DtNodeId {
        let id = DtNodeId(self.nodes.len());
        self.nodes.push(DtNode {
            parent: None,
            children: Vec::new(),
            ..node
        });
        id
    }

    pub fn add_child(&mut self, parent: DtNodeId, node: DtNode) -> DtNodeId {
        let id = DtNodeId(self.nodes.len());
        self.nodes.push(DtNode {
            parent: Some(parent),
            children: Vec::new(),
            ..node
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Pre-order walk from `root`, `root` included.
    pub fn walk(&self, root: DtNodeId) -> Vec<DtNodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        out
    }

    /// Path from the parent of `id` up to the tree root.
    pub fn ancestors(&self, id: DtNodeId) -> Vec<DtNodeId> {
        let mut out = Vec::new();
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            out.push(parent);
            current = self.node(parent).parent;
        }
        out
    }

    /// Read an indented tree dump and return the ids of the roots found, in
    /// order. Nesting is taken from the width of the `+- | \-` prefix.
    pub fn parse_dump(&mut self, text: &str) -> AutofixResult<Vec<DtNodeId>> {
        let mut roots = Vec::new();
        let mut stack: Vec<(usize, DtNodeId)> = Vec::new();

        for (idx, raw_line) in text.lines().enumerate() {
            let line = raw_line
                .strip_prefix("[INFO]")
                .map(|l| l.strip_prefix(' ').unwrap_or(l))
                .unwrap_or(raw_line);
            if line.trim().is_empty() {
                continue;
            }

            let indent = line
                .find(|c: char| !matches!(c, ' ' | '|' | '+' | '-' | '\\'))
                .unwrap_or(line.len());
            let coordinate = line[indent..].split_whitespace().next().unwrap_or("");
            let node = parse_coordinate(coordinate).ok_or_else(|| AutofixError::InvalidTreeLine {
                line: idx + 1,
                text: raw_line.to_string(),
            })?;

            if indent == 0 {
                stack.clear();
                let id = self.add_root(node);
                roots.push(id);
                stack.push((0, id));
                continue;
            }

            while stack.last().is_some_and(|(width, _)| *width >= indent) {
                stack.pop();
            }
            let Some(&(_, parent)) = stack.last() else {
                return Err(AutofixError::InvalidTreeLine {
                    line: idx + 1,
                    text: raw_line.to_string(),
                });
            };
            let id = self.add_child(parent, node);
            stack.push((indent, id));
        }

        Ok(roots)
    }
}

/// `g:a:t:v`, `g:a:t:v:scope` or `g:a:t:classifier:v:scope`.
fn parse_coordinate(text: &str) -> Option<DtNode> {
    let fields: Vec<&str> = text.split(':').collect();
    if fields.iter().any(|f| f.is_empty()) {
        return None;
    }
    match fields.as_slice() {
        [g, a, t, v] => Some(DtNode::new(g, a, t, v, None)),
        [g, a, t, v, s] => Some(DtNode::new(g, a, t, v, Some(s))),
        [g, a, t, c, v, s] => {
            let mut node = DtNode::new(g, a, t, v, Some(s));
            node.classifier = Some(c.to_string());
            Some(node)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = "\
com.example:parent:pom:1.0
com.example:app:jar:1.0
+- org.projectlombok:lombok:jar:1.18.10:provided
+- org.mockito:mockito-core:jar:2.23.0:test
|  +- net.bytebuddy:byte-buddy:jar:1.9.0:test
|  \\- org.objenesis:objenesis:jar:2.6:test
\\- io.netty:netty-transport-native-epoll:jar:linux-x86_64:4.1.50.Final:compile (optional)
";

    #[test]
    fn test_parse_dump_nesting() {
        let mut tree = DependencyTree::new();
        let roots = tree.parse_dump(DUMP).unwrap();
        assert_eq!(roots.len(), 2);
        assert!(tree.node(roots[0]).children().is_empty());

        let app = tree.node(roots[1]);
        assert_eq!(app.ga(), "com.example:app");
        assert_eq!(app.children().len(), 3);

        let mockito = tree.node(app.children()[1]);
        assert_eq!(mockito.children().len(), 2);
        let byte_buddy = tree.node(mockito.children()[0]);
        assert_eq!(byte_buddy.to_gatv().to_string(), "net.bytebuddy:byte-buddy:jar:1.9.0");
        assert_eq!(byte_buddy.scope.as_deref(), Some("test"));

        let epoll = tree.node(app.children()[2]);
        assert_eq!(epoll.classifier.as_deref(), Some("linux-x86_64"));
        assert_eq!(epoll.version, "4.1.50.Final");
    }

    #[test]
    fn test_walk_and_ancestors() {
        let mut tree = DependencyTree::new();
        let roots = tree.parse_dump(DUMP).unwrap();
        let order: Vec<String> = tree
            .walk(roots[1])
            .into_iter()
            .map(|id| tree.node(id).artifact.clone())
            .collect();
        assert_eq!(
            order,
            ["app", "lombok", "mockito-core", "byte-buddy", "objenesis", "netty-transport-native-epoll"]
        );
        let byte_buddy = tree.walk(roots[1])[3];
        let up: Vec<&str> = tree
            .ancestors(byte_buddy)
            .into_iter()
            .map(|id| tree.node(id).artifact.as_str())
            .collect();
        assert_eq!(up, ["mockito-core", "app"]);
    }

    #[test]
    fn test_maven_log_prefix() {
        let mut tree = DependencyTree::new();
        let roots = tree
            .parse_dump("[INFO] com.example:app:jar:1.0\n[INFO] \\- junit:junit:jar:4.12:test\n")
            .unwrap();
        assert_eq!(tree.node(roots[0]).children().len(), 1);
    }

    #[test]
    fn test_invalid_lines() {
        let mut tree = DependencyTree::new();
        let err = tree.parse_dump("com.example:app:jar:1.0\n+- broken\n").unwrap_err();
        assert!(matches!(err, AutofixError::InvalidTreeLine { line: 2, .. }));

        let err = tree.parse_dump("+- junit:junit:jar:4.12:test\n").unwrap_err();
        assert!(matches!(err, AutofixError::InvalidTreeLine { line: 1, .. }));
    }
}
