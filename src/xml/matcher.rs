// ============================================================================
// XmlTagMatcher - 按 groupId/artifactId 子节点匹配标签
// ============================================================================

use super::Tag;
use crate::gatv::truncate_to_ga;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlTagMatcher {
    Ga { group: String, artifact: String },
    /// Any of a set of `group:artifact` keys.
    GaSet(BTreeSet<String>),
}

impl XmlTagMatcher {
    pub fn by_ga(group: &str, artifact: &str) -> Self {
        XmlTagMatcher::Ga {
            group: group.to_string(),
            artifact: artifact.to_string(),
        }
    }

    /// Build from GATV-ish keys, each truncated at its second colon.
    pub fn by_keys<'a, I>(keys: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        XmlTagMatcher::GaSet(keys.into_iter().map(|k| truncate_to_ga(k).to_string()).collect())
    }

    pub fn matches(&self, tag: &Tag) -> bool {
        let (Some(group), Some(artifact)) = (tag.child_value("groupId"), tag.child_value("artifactId"))
        else {
            return false;
        };
        self.matches_ga(&group, &artifact)
    }

    pub fn matches_ga(&self, group: &str, artifact: &str) -> bool {
        match self {
            XmlTagMatcher::Ga { group: g, artifact: a } => g == group && a == artifact,
            XmlTagMatcher::GaSet(set) => set.contains(&format!("{group}:{artifact}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::XmlDocument;
    use std::path::Path;

    #[test]
    fn test_match_by_ga_and_set() {
        let doc = XmlDocument::parse(
            Path::new("pom.xml"),
            "<dependency><groupId>g2</groupId><artifactId>a2</artifactId></dependency>",
        )
        .unwrap();
        let tag = doc.root();
        assert!(XmlTagMatcher::by_ga("g2", "a2").matches(tag));
        assert!(!XmlTagMatcher::by_ga("g2", "a3").matches(tag));
        assert!(XmlTagMatcher::by_keys(["g1:a1:jar:1", "g2:a2:jar:2"]).matches(tag));
        assert!(!XmlTagMatcher::by_keys(["g2:a3:jar:2"]).matches(tag));
    }
}
