// ============================================================================
// AddJdkMigrationCommentRecipe - 用注释标记迁移新增的依赖
// ============================================================================

use super::{visit_xml, Recipe, RecipeContext, SourceFile};
use crate::report::{CountPolicy, Reporter};
use crate::xml::{Content, Cursor, Tag, XmlTagMatcher, XmlVisitor};
use anyhow::Result;

pub struct AddJdkMigrationCommentRecipe {
    to_version: u32,
}

impl AddJdkMigrationCommentRecipe {
    pub fn new(to_version: u32) -> Self {
        AddJdkMigrationCommentRecipe { to_version }
    }
}

impl Recipe for AddJdkMigrationCommentRecipe {
    fn name(&self) -> &'static str {
        "jdk-migration-comment"
    }

    fn display_name(&self) -> &'static str {
        "Mark JDK migration dependencies"
    }

    fn description(&self) -> &'static str {
        "Brackets dependencies added for the JDK migration with start/end comments."
    }

    // Covered by the entries of the additions themselves.
    fn reporter(&self) -> Option<Reporter> {
        Some(Reporter::new("jdk_migration_comment", &[], CountPolicy::Suppressed))
    }

    fn visit(&self, source: &SourceFile, ctx: &mut RecipeContext) -> Result<SourceFile> {
        let SourceFile::Xml(xml) = source else {
            return Ok(source.clone());
        };
        // only POMs that actually receive an addition get markers
        let added = xml.module.map(|m| ctx.plan.added_gas_for(m)).unwrap_or_default();
        if added.is_empty() {
            return Ok(source.clone());
        }
        let visitor = MigrationCommentVisitor {
            matcher: XmlTagMatcher::GaSet(added),
            start: format!("JDK{} upgrade start", self.to_version),
            end: format!("JDK{} upgrade end", self.to_version),
        };
        visit_xml(source, ctx, Box::new(visitor))
    }
}

struct MigrationCommentVisitor {
    matcher: XmlTagMatcher,
    start: String,
    end: String,
}

impl MigrationCommentVisitor {
    fn is_marker(item: Option<&Content>, marker: &str) -> bool {
        matches!(item, Some(Content::Comment { text, .. }) if text.trim() == marker)
    }

    fn comment(prefix: &str, text: &str) -> Content {
        Content::Comment {
            prefix: prefix.to_string(),
            text: text.to_string(),
        }
    }
}

impl XmlVisitor for MigrationCommentVisitor {
    fn name(&self) -> &'static str {
        "jdk-migration-comment"
    }

    fn visit_tag(&self, tag: Tag, cursor: &mut Cursor) -> Result<Option<Tag>> {
        if tag.name() != "dependencies" || !cursor.in_path(&["project"]) {
            return Ok(Some(tag));
        }

        let added: Vec<usize> = tag
            .content()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.as_tag().is_some_and(|t| t.name() == "dependency" && self.matcher.matches(t)))
            .map(|(i, _)| i)
            .collect();
        let (Some(&first), Some(&last)) = (added.first(), added.last()) else {
            return Ok(Some(tag));
        };

        let mut content = tag.content().to_vec();
        let prefix_of = |i: usize| content[i].as_tag().map(|t| t.prefix().to_string()).unwrap_or_default();
        let first_prefix = prefix_of(first);
        let last_prefix = prefix_of(last);

        let mut changed = false;
        if !Self::is_marker(content.get(last + 1), &self.end) {
            content.insert(last + 1, Self::comment(&last_prefix, &self.end));
            changed = true;
        }
        if first == 0 || !Self::is_marker(content.get(first - 1), &self.start) {
            content.insert(first, Self::comment(&first_prefix, &self.start));
            changed = true;
        }

        if changed {
            Ok(Some(tag.with_content(content)))
        } else {
            Ok(Some(tag))
        }
    }
}
