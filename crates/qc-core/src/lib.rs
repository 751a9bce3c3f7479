//! QC Core: shared data model, field paths, public errors and fingerprints
//!
//! Everything the engine, the segmenter and the orchestrator agree on lives
//! here. The crate performs no I/O.

pub mod data_model;
pub mod error;
pub mod fingerprint;
pub mod path;

pub use data_model::{
    AbuseSignal, AiSignals, Evidence, EvidenceKind, InputKind, NormalizedInput, Severity,
    ToneSignal,
};
pub use error::{ErrorCategory, PublicError};
pub use fingerprint::{fingerprint_bytes, fingerprint_input, FingerprintType, InputFingerprint};
pub use path::{value_to_text, FieldPath, PathSegment};

/// Version stamped on every run summary produced by this engine build
pub const ENGINE_VERSION: &str = "qc-engine/1.0.0";
