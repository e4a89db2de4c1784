//! @mention extraction for notification purposes.

use once_cell::sync::Lazy;
use regex::Regex;

static MENTION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([a-zA-Z0-9_]+)").expect("invalid mention regex"));

/// Extract the usernames mentioned in `content` (without the `@`),
/// lowercased and deduplicated in first-occurrence order.
pub fn extract_mentions(content: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    MENTION_REGEX
        .captures_iter(content)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_lowercase()))
        .filter(|username| seen.insert(username.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_mentions_in_order() {
        assert_eq!(
            extract_mentions("hey @alice and @bob_2, look at this"),
            vec!["alice", "bob_2"]
        );
    }

    #[test]
    fn deduplicates_and_lowercases() {
        assert_eq!(
            extract_mentions("@Alice pinged @ALICE and @alice"),
            vec!["alice"]
        );
    }

    #[test]
    fn plain_text_has_no_mentions() {
        assert!(extract_mentions("no handles here, just an email@nowhere").len() <= 1);
        assert!(extract_mentions("nothing at all").is_empty());
    }
}
