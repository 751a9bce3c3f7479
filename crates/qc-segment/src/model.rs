//! Segmentation data model

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegmentationStrategy {
    Header,
    Separator,
    SpeakerBlock,
    Single,
}

impl fmt::Display for SegmentationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SegmentationStrategy::Header => write!(f, "HEADER"),
            SegmentationStrategy::Separator => write!(f, "SEPARATOR"),
            SegmentationStrategy::SpeakerBlock => write!(f, "SPEAKER_BLOCK"),
            SegmentationStrategy::Single => write!(f, "SINGLE"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participants {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
}

impl Participants {
    pub fn is_empty(&self) -> bool {
        self.operator.is_none() && self.customer.is_none()
    }
}

/// One chat cut out of a transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSegment {
    /// 0-based position after trivial segments are dropped
    pub index: usize,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants: Option<Participants>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationResult {
    pub strategy: SegmentationStrategy,
    pub chats: Vec<ChatSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl SegmentationResult {
    pub fn is_multi(&self) -> bool {
        self.chats.len() > 1
    }
}

/// Segmenter thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmenterConfig {
    /// Segments whose trimmed text is shorter than this are trivial
    #[serde(default = "default_min_segment_chars")]
    pub min_segment_chars: usize,

    /// How many lines after a speaker anchor to look for its counterpart
    #[serde(default = "default_speaker_lookahead")]
    pub speaker_lookahead: usize,
}

fn default_min_segment_chars() -> usize {
    120
}

fn default_speaker_lookahead() -> usize {
    4
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_segment_chars: default_min_segment_chars(),
            speaker_lookahead: default_speaker_lookahead(),
        }
    }
}
