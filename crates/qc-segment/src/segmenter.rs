//! Strategy selection and segment assembly

use crate::model::{ChatSegment, Participants, SegmentationResult, SegmentationStrategy, SegmenterConfig};
use crate::patterns::{header_id, is_separator, speaker_anchor, Role};

const INCONCLUSIVE_WARNING: &str =
    "Multi-chat detection was inconclusive; the transcript is treated as a single chat";

/// Candidate segment before trivial-segment filtering
#[derive(Debug)]
struct Draft {
    text: String,
    chat_id: Option<String>,
    participants: Option<Participants>,
}

impl Draft {
    fn from_lines(lines: &[&str], chat_id: Option<String>) -> Self {
        Self {
            text: lines.join("\n").trim().to_string(),
            chat_id,
            participants: detect_participants(lines),
        }
    }
}

/// Transcript segmenter
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Split `raw` into chats. Never fails.
    pub fn segment(&self, raw: &str) -> SegmentationResult {
        let lines: Vec<&str> = raw.lines().collect();

        let candidates = [
            (SegmentationStrategy::Header, header_drafts(&lines)),
            (SegmentationStrategy::Separator, separator_drafts(&lines)),
            (
                SegmentationStrategy::SpeakerBlock,
                speaker_drafts(&lines, self.config.speaker_lookahead),
            ),
        ];

        for (strategy, drafts) in candidates {
            if let Some(result) = self.accept(strategy, drafts) {
                return result;
            }
        }

        self.single(raw, &lines)
    }

    /// Keep non-trivial drafts; the strategy wins with at least two.
    fn accept(&self, strategy: SegmentationStrategy, drafts: Vec<Draft>) -> Option<SegmentationResult> {
        let min = self.config.min_segment_chars;
        let mut dropped = 0usize;
        let kept: Vec<Draft> = drafts
            .into_iter()
            .filter(|d| !d.text.is_empty())
            .filter(|d| {
                let keep = d.text.chars().count() >= min;
                if !keep {
                    dropped += 1;
                }
                keep
            })
            .collect();

        if kept.len() < 2 {
            return None;
        }

        let warning = (dropped > 0).then(|| {
            format!(
                "Dropped {} trivial segment(s) shorter than {} characters",
                dropped, min
            )
        });

        Some(SegmentationResult {
            strategy,
            chats: kept.into_iter().enumerate().map(|(i, d)| finish(i, d)).collect(),
            warning,
        })
    }

    fn single(&self, raw: &str, lines: &[&str]) -> SegmentationResult {
        let ids: Vec<String> = lines.iter().filter_map(|l| header_id(l)).collect();
        let chat_id = match ids.as_slice() {
            [only] => Some(only.clone()),
            _ => None,
        };
        let draft = Draft {
            text: raw.trim().to_string(),
            chat_id,
            participants: detect_participants(lines),
        };

        SegmentationResult {
            strategy: SegmentationStrategy::Single,
            chats: vec![finish(0, draft)],
            warning: Some(INCONCLUSIVE_WARNING.to_string()),
        }
    }
}

/// Segment `raw` with the default thresholds
pub fn segment(raw: &str) -> SegmentationResult {
    Segmenter::default().segment(raw)
}

fn finish(index: usize, draft: Draft) -> ChatSegment {
    let title = match (&draft.chat_id, &draft.participants) {
        (Some(id), _) => format!("Chat {}", id),
        (
            None,
            Some(Participants {
                operator: Some(operator),
                customer: Some(customer),
            }),
        ) => format!("{} / {}", operator, customer),
        _ => format!("Chat {}", index + 1),
    };

    ChatSegment {
        index,
        title,
        chat_id: draft.chat_id,
        participants: draft.participants,
        text: draft.text,
    }
}

/// First operator and first customer named by `Label: Name` lines
fn detect_participants(lines: &[&str]) -> Option<Participants> {
    let mut participants = Participants::default();
    for (role, name) in lines.iter().filter_map(|l| speaker_anchor(l)) {
        let slot = match role {
            Role::Operator => &mut participants.operator,
            Role::Customer => &mut participants.customer,
        };
        if slot.is_none() {
            *slot = Some(name);
        }
        if participants.operator.is_some() && participants.customer.is_some() {
            break;
        }
    }
    (!participants.is_empty()).then_some(participants)
}

/// Each header runs to the next one; lines before the first header belong
/// to the first segment.
fn header_drafts(lines: &[&str]) -> Vec<Draft> {
    let headers: Vec<(usize, String)> = lines
        .iter()
        .enumerate()
        .filter_map(|(i, l)| header_id(l).map(|id| (i, id)))
        .collect();
    if headers.len() < 2 {
        return Vec::new();
    }

    headers
        .iter()
        .enumerate()
        .map(|(k, (line, id))| {
            let start = if k == 0 { 0 } else { *line };
            let end = headers.get(k + 1).map_or(lines.len(), |(next, _)| *next);
            Draft::from_lines(&lines[start..end], Some(id.clone()))
        })
        .collect()
}

/// Separator lines split the transcript and are themselves discarded
fn separator_drafts(lines: &[&str]) -> Vec<Draft> {
    if !lines.iter().any(|l| is_separator(l)) {
        return Vec::new();
    }

    lines
        .split(|l| is_separator(l))
        .map(|chunk| Draft::from_lines(chunk, None))
        .collect()
}

/// A segment starts at a role line whose counterpart role appears within
/// `lookahead` lines.
fn speaker_drafts(lines: &[&str], lookahead: usize) -> Vec<Draft> {
    let mut starts: Vec<(usize, Participants)> = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let Some((role, name)) = speaker_anchor(lines[i]) else {
            i += 1;
            continue;
        };

        let window_end = (i + lookahead).min(lines.len().saturating_sub(1));
        let counterpart = (i + 1..=window_end).find_map(|j| match speaker_anchor(lines[j]) {
            Some((r, other)) if r == role.counterpart() => Some((j, other)),
            _ => None,
        });

        match counterpart {
            Some((j, other)) => {
                let (operator, customer) = match role {
                    Role::Operator => (name, other),
                    Role::Customer => (other, name),
                };
                starts.push((
                    i,
                    Participants {
                        operator: Some(operator),
                        customer: Some(customer),
                    },
                ));
                i = j + 1;
            }
            None => i += 1,
        }
    }

    if starts.len() < 2 {
        return Vec::new();
    }

    starts
        .iter()
        .enumerate()
        .map(|(k, (line, participants))| {
            let start = if k == 0 { 0 } else { *line };
            let end = starts.get(k + 1).map_or(lines.len(), |(next, _)| *next);
            Draft {
                text: lines[start..end].join("\n").trim().to_string(),
                chat_id: None,
                participants: Some(participants.clone()),
            }
        })
        .collect()
}
