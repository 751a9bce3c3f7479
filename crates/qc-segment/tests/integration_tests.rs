//! Integration tests for qc-segment.
//!
//! Transcripts here mirror what agents paste into the QC console: several
//! exported chats concatenated with whatever framing the helpdesk produced.

use proptest::prelude::*;
use qc_segment::{segment, SegmentationStrategy, Segmenter, SegmenterConfig};
use serde_json::json;

fn conversation(order: u32) -> String {
    format!(
        "Operator: Good morning, thank you for contacting support about order {order}.\n\
         Customer: Hi, the parcel for order {order} has not arrived yet and the tracking is stuck.\n\
         Operator: I am sorry to hear that, I have opened an investigation with the courier."
    )
}

// =============================================================================
// Strategy Tests
// =============================================================================

#[test]
fn test_two_chat_id_headers() {
    let raw = format!(
        "Chat ID: 1\n{}\n\nChat ID: 2\n{}",
        conversation(11),
        conversation(12)
    );
    let result = segment(&raw);

    assert_eq!(result.strategy, SegmentationStrategy::Header);
    assert_eq!(result.chats.len(), 2);
    assert_eq!(result.chats[0].title, "Chat 1");
    assert_eq!(result.chats[1].title, "Chat 2");
    assert!(result
        .chats
        .iter()
        .all(|c| c.text.trim().chars().count() >= 120));
}

#[test]
fn test_header_beats_separator() {
    let raw = format!(
        "Ticket No. 55\n{}\n----------\nTicket No. 56\n{}",
        conversation(1),
        conversation(2)
    );
    let result = segment(&raw);
    assert_eq!(result.strategy, SegmentationStrategy::Header);
    assert_eq!(result.chats[0].chat_id.as_deref(), Some("55"));
}

#[test]
fn test_begin_end_markers() {
    let raw = format!(
        "--- begin of chat ---\n{}\n[End of conversation]\n--- begin of chat ---\n{}\n[End of conversation]",
        conversation(3),
        conversation(4)
    );
    let result = segment(&raw);
    assert_eq!(result.strategy, SegmentationStrategy::Separator);
    assert_eq!(result.chats.len(), 2);
    assert!(result.warning.is_none());
    assert!(result.chats[1].text.contains("order 4"));
}

#[test]
fn test_wire_shape() {
    let raw = format!("Chat ID: A-1\n{}\nChat ID: A-2\n{}", conversation(5), conversation(6));
    let value = serde_json::to_value(segment(&raw)).unwrap();
    assert_eq!(value["strategy"], json!("HEADER"));
    assert_eq!(value["chats"][1]["chatId"], json!("A-2"));
    assert!(value.get("warning").is_none());
}

#[test]
fn test_config_from_yaml() {
    let config: SegmenterConfig = serde_yaml::from_str("minSegmentChars: 10\n").unwrap();
    assert_eq!(config.min_segment_chars, 10);
    assert_eq!(config.speaker_lookahead, 4);

    let result = Segmenter::new(config).segment("Chat ID: 1\nshort but ok\nChat ID: 2\nalso short ok");
    assert_eq!(result.strategy, SegmentationStrategy::Header);
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #[test]
    fn prop_segments_are_contiguous(raw in "(?s).{0,400}") {
        let result = segment(&raw);
        prop_assert!(!result.chats.is_empty());
        for (i, chat) in result.chats.iter().enumerate() {
            prop_assert_eq!(chat.index, i);
            prop_assert!(!chat.title.is_empty());
        }
        if result.strategy == SegmentationStrategy::Single {
            prop_assert_eq!(result.chats.len(), 1);
            prop_assert!(result.warning.is_some());
        } else {
            prop_assert!(result.chats.len() >= 2);
        }
    }
}
