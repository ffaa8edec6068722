// ============================================================================
// OrderTagVisitor - 同一父节点下两个标签的稳定局部重排
// ============================================================================

use super::{visit_xml, Recipe, RecipeContext, SourceFile};
use crate::report::{CountPolicy, Reporter};
use crate::xml::{Content, Cursor, Tag, XmlTagMatcher, XmlVisitor};
use anyhow::Result;

type ContainerPredicate = Box<dyn Fn(&Tag, &Cursor) -> bool>;

/// Moves children matching `after` behind the last child matching `before`,
/// inside containers accepted by the predicate. Everything else keeps its
/// relative order.
pub struct OrderTagVisitor {
    container: ContainerPredicate,
    before: XmlTagMatcher,
    after: XmlTagMatcher,
}

impl OrderTagVisitor {
    pub fn new<F>(container: F, before: XmlTagMatcher, after: XmlTagMatcher) -> Self
    where
        F: Fn(&Tag, &Cursor) -> bool + 'static,
    {
        OrderTagVisitor {
            container: Box::new(container),
            before,
            after,
        }
    }

    /// `None` when the content is already in order.
    fn reorder(&self, content: &[Content]) -> Option<Vec<Content>> {
        let is = |m: &XmlTagMatcher, c: &Content| c.as_tag().is_some_and(|t| m.matches(t));

        let last_before = content.iter().rposition(|c| is(&self.before, c))?;
        let first_after = content.iter().position(|c| is(&self.after, c))?;
        if last_before < first_after {
            return None;
        }

        let (head, tail) = content.split_at(last_before + 1);
        let mut reordered: Vec<Content> = head.iter().filter(|c| !is(&self.after, *c)).cloned().collect();
        reordered.extend(head.iter().filter(|c| is(&self.after, *c)).cloned());
        reordered.extend(tail.iter().cloned());
        Some(reordered)
    }
}

impl XmlVisitor for OrderTagVisitor {
    fn name(&self) -> &'static str {
        "order-tag"
    }

    fn visit_tag(&self, tag: Tag, cursor: &mut Cursor) -> Result<Option<Tag>> {
        if !(self.container)(&tag, cursor) {
            return Ok(Some(tag));
        }
        match self.reorder(tag.content()) {
            Some(content) => Ok(Some(tag.with_content(content))),
            None => Ok(Some(tag)),
        }
    }
}

/// Puts lombok ahead of mapstruct-processor in the compiler plugin's
/// `annotationProcessorPaths`.
pub struct OrderAnnotationProcessorPathsRecipe;

impl OrderAnnotationProcessorPathsRecipe {
    fn visitor() -> OrderTagVisitor {
        OrderTagVisitor::new(
            |tag, cursor| {
                tag.name() == "annotationProcessorPaths"
                    && cursor
                        .ancestors()
                        .iter()
                        .any(|a| a.name == "plugin" && a.artifact_id.as_deref() == Some("maven-compiler-plugin"))
            },
            XmlTagMatcher::by_ga("org.projectlombok", "lombok"),
            XmlTagMatcher::by_ga("org.mapstruct", "mapstruct-processor"),
        )
    }
}

impl Recipe for OrderAnnotationProcessorPathsRecipe {
    fn name(&self) -> &'static str {
        "order-annotation-processor-paths"
    }

    fn display_name(&self) -> &'static str {
        "Order annotation processor paths"
    }

    fn description(&self) -> &'static str {
        "Moves lombok before mapstruct-processor in maven-compiler-plugin annotationProcessorPaths."
    }

    fn reporter(&self) -> Option<Reporter> {
        Some(Reporter::new("annotation_processor_order", &[], CountPolicy::OnePerRecipe))
    }

    fn visit(&self, source: &SourceFile, ctx: &mut RecipeContext) -> Result<SourceFile> {
        visit_xml(source, ctx, Box::new(Self::visitor()))
    }
}
