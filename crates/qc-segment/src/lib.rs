//! QC Segment - multi-chat transcript segmentation
//!
//! Splits a pasted transcript that may hold several chats into individual
//! [`ChatSegment`]s. Strategies are tried in priority order and the first one
//! producing at least two non-trivial segments wins:
//!
//! 1. `HEADER`: `Chat ID: 1`, `Conversation #A-7`, `Ticket No. 55`
//! 2. `SEPARATOR`: rule lines (`-----`, `=====`) or begin/end markers
//! 3. `SPEAKER_BLOCK`: an operator line paired with a nearby customer line
//! 4. `SINGLE`: the whole transcript as one chat
//!
//! Segmentation never fails; inconclusive input falls back to `SINGLE` with a
//! warning.

pub mod model;
mod patterns;
pub mod segmenter;

pub use model::{ChatSegment, Participants, SegmentationResult, SegmentationStrategy, SegmenterConfig};
pub use segmenter::{segment, Segmenter};
