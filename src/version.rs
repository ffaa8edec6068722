// ============================================================================
// 版本比较 - Version ordering for dependency upgrades
// ============================================================================
//
// A version is split on '.'; each segment contributes its leading digits as a
// number. Parsing stops at the first segment that is not purely numeric: its
// leading digits (if they fit in an i32) are kept and everything after them,
// including the remaining segments, becomes the tail. Segments whose digits
// overflow i32 are not numeric at all and go to the tail whole.
//
// Ordering: numbers position-wise, a shorter matching prefix is older, then
// the tail compared as a plain string. `1.2.1` < `1.2.1-update` on purpose.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    numbers: Vec<i32>,
    tail: String,
}

impl Version {
    pub fn parse(raw: &str) -> Self {
        let mut numbers = Vec::new();
        let mut tail = String::new();

        if !raw.is_empty() {
            let segments: Vec<&str> = raw.split('.').collect();
            for (idx, segment) in segments.iter().enumerate() {
                let digits_end = segment
                    .char_indices()
                    .find(|(_, c)| !c.is_ascii_digit())
                    .map_or(segment.len(), |(i, _)| i);
                let digits = &segment[..digits_end];

                let parsed = if digits.is_empty() {
                    None
                } else {
                    digits.parse::<i32>().ok()
                };

                match parsed {
                    Some(n) if digits_end == segment.len() => numbers.push(n),
                    Some(n) => {
                        numbers.push(n);
                        tail = rest_from(&segments, idx, &segment[digits_end..]);
                        break;
                    }
                    None => {
                        tail = rest_from(&segments, idx, segment);
                        break;
                    }
                }
            }
        }

        Version {
            raw: raw.to_string(),
            numbers,
            tail,
        }
    }

    pub fn numbers(&self) -> &[i32] {
        &self.numbers
    }

    pub fn tail(&self) -> &str {
        &self.tail
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// `true` when `self` is older than `other`.
    pub fn should_update_to(&self, other: &Version) -> bool {
        self.cmp(other) == Ordering::Less
    }
}

/// Convenience for call sites that only hold strings.
pub fn should_update(from: &str, to: &str) -> bool {
    Version::parse(from).should_update_to(&Version::parse(to))
}

fn rest_from(segments: &[&str], idx: usize, head: &str) -> String {
    let mut rest = head.to_string();
    for segment in &segments[idx + 1..] {
        rest.push('.');
        rest.push_str(segment);
    }
    rest
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        // Vec ordering already treats a shorter equal prefix as smaller.
        self.numbers
            .cmp(&other.numbers)
            .then_with(|| self.tail.cmp(&other.tail))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for Version {
    fn from(raw: &str) -> Self {
        Version::parse(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_components() {
        let v = Version::parse("1.18.22");
        assert_eq!(v.numbers(), &[1, 18, 22]);
        assert_eq!(v.tail(), "");

        let v = Version::parse("3.24.0-GA");
        assert_eq!(v.numbers(), &[3, 24, 0]);
        assert_eq!(v.tail(), "-GA");

        let v = Version::parse("");
        assert!(v.numbers().is_empty());
        assert_eq!(v.tail(), "");
    }

    #[test]
    fn test_should_update_table() {
        assert!(should_update("1.2.1", "1.2.3"));
        assert!(!should_update("1.2.3", "1.2.1"));
        assert!(should_update("1.2", "1.2.3"));
        assert!(should_update("1.2.1", "1.2.1-update"));
        assert!(!should_update("1.2.1-update", "1.2.1"));
        assert!(!should_update("1.18.22", "1.18.22"));
        assert!(should_update("1.16.20", "1.18.22"));
    }

    #[test]
    fn test_tail_keeps_following_segments() {
        let v = Version::parse("1.0-beta.2");
        assert_eq!(v.numbers(), &[1, 0]);
        assert_eq!(v.tail(), "-beta.2");
        assert!(should_update("1.0-beta.2", "1.0-beta.3"));
    }

    #[test]
    fn test_date_like_version() {
        let v = Version::parse("2018-09-stable");
        assert_eq!(v.numbers(), &[2018]);
        assert_eq!(v.tail(), "-09-stable");
        assert!(should_update("2018-09-stable", "2018-10-stable"));
    }

    #[test]
    fn test_overflow_segment_falls_into_tail() {
        let v = Version::parse("1.99999999999.3");
        assert_eq!(v.numbers(), &[1]);
        assert_eq!(v.tail(), "99999999999.3");
        // no panic, plain string comparison of the tails
        assert!(should_update("1.99999999999", "1.99999999999x"));
    }

    #[test]
    fn test_non_numeric_head() {
        let v = Version::parse("RELEASE");
        assert!(v.numbers().is_empty());
        assert_eq!(v.tail(), "RELEASE");
        assert!(should_update("RELEASE", "1.0"));
    }
}
