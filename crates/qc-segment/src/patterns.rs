//! Line patterns used by the segmentation strategies

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Chat id header: `Chat ID: 1`, `Conversation #A-7`, `Ticket No. 55`
    static ref HEADER: Regex = Regex::new(
        r"(?i)^\s*(?:chat|conversation|ticket|session)\s*(?:(?:id\b|no\.|no\b|number\b)\s*[:#]?|[:#])\s*([a-z0-9][\w.\-]*)\s*$"
    ).unwrap();

    /// Rule line of at least five `-`, `=`, `*` or `#`
    static ref SEPARATOR: Regex = Regex::new(r"^\s*[-=*#]{5,}\s*$").unwrap();

    /// `--- begin of chat ---`, `[End of conversation]`
    static ref CHAT_MARKER: Regex = Regex::new(
        r"(?i)^\s*[\[(<\-=*]*\s*(?:begin|start|end)\s+of\s+(?:the\s+)?(?:chat|conversation|transcript)\s*[\])>\-=*]*\s*$"
    ).unwrap();

    /// `Label: rest of line`
    static ref SPEAKER_LINE: Regex = Regex::new(r"^\s*([A-Za-z][A-Za-z ]{0,24}?)\s*:\s*(.*?)\s*$").unwrap();
}

const OPERATOR_LABELS: [&str; 5] = ["operator", "agent", "advisor", "rep", "representative"];
const CUSTOMER_LABELS: [&str; 4] = ["customer", "client", "caller", "buyer"];
const MAX_NAME_CHARS: usize = 40;
const MAX_NAME_WORDS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Operator,
    Customer,
}

impl Role {
    pub(crate) fn counterpart(self) -> Role {
        match self {
            Role::Operator => Role::Customer,
            Role::Customer => Role::Operator,
        }
    }
}

/// Id captured from a header line
pub(crate) fn header_id(line: &str) -> Option<String> {
    HEADER
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub(crate) fn is_separator(line: &str) -> bool {
    SEPARATOR.is_match(line) || CHAT_MARKER.is_match(line)
}

/// A `Label: Name` line whose label carries a role and whose value looks
/// like a person's name rather than a message.
pub(crate) fn speaker_anchor(line: &str) -> Option<(Role, String)> {
    let caps = SPEAKER_LINE.captures(line)?;
    let label = caps.get(1)?.as_str().trim().to_lowercase();
    let name = caps.get(2)?.as_str().trim();

    let role = if OPERATOR_LABELS.contains(&label.as_str()) {
        Role::Operator
    } else if CUSTOMER_LABELS.contains(&label.as_str()) {
        Role::Customer
    } else {
        return None;
    };

    looks_like_name(name).then(|| (role, name.to_string()))
}

fn looks_like_name(value: &str) -> bool {
    let words = value.split_whitespace().count();
    !value.is_empty()
        && value.chars().count() <= MAX_NAME_CHARS
        && (1..=MAX_NAME_WORDS).contains(&words)
        && !value.chars().any(|c| matches!(c, '.' | ',' | '!' | '?' | ';' | ':'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_variants() {
        assert_eq!(header_id("Chat ID: 1"), Some("1".to_string()));
        assert_eq!(header_id("  Conversation #A-7 "), Some("A-7".to_string()));
        assert_eq!(header_id("Ticket No. 55"), Some("55".to_string()));
        assert_eq!(header_id("session id: x"), Some("x".to_string()));
        assert_eq!(header_id("Chat notes"), None);
        assert_eq!(header_id("Chat ID: 1 was escalated to billing"), None);
    }

    #[test]
    fn test_separator_lines() {
        assert!(is_separator("-----"));
        assert!(is_separator("  ==========  "));
        assert!(is_separator("#####"));
        assert!(is_separator("--- begin of chat ---"));
        assert!(is_separator("[End of conversation]"));
        assert!(!is_separator("----"));
        assert!(!is_separator("-- end --"));
    }

    #[test]
    fn test_speaker_anchor() {
        assert_eq!(
            speaker_anchor("Agent: Maria Lopez"),
            Some((Role::Operator, "Maria Lopez".to_string()))
        );
        assert_eq!(
            speaker_anchor("Customer: John"),
            Some((Role::Customer, "John".to_string()))
        );
        assert_eq!(speaker_anchor("Agent: Hello, how can I help?"), None);
        assert_eq!(speaker_anchor("Manager: Paul"), None);
        assert_eq!(speaker_anchor("Caller: one two three four five"), None);
    }
}
