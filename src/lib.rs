//! rescore-rs: re-score, filter and rank candidate alignments of short reads.
//!
//! # Library usage
//!
//! ```no_run
//! use rescore_rs::{ScoringConfig, prepare_record, score_group};
//! use rescore_rs::record::{AlignmentRecord, Cigar};
//!
//! // let config = ScoringConfig::default();
//! // let mut candidates: Vec<AlignmentRecord> = /* one read's alignments */;
//! // for rec in &mut candidates {
//! //     prepare_record(rec, &config, None)?;
//! // }
//! // let outcome = score_group(candidates, &config, None);
//! ```

// Internal modules, not part of the public API.
pub(crate) mod bam_input;
pub(crate) mod grouping;
pub(crate) mod md;
pub(crate) mod progress;
pub(crate) mod types;

// Public modules.
pub mod config;
pub mod error;
pub mod fragment;
pub mod likelihood;
pub mod pairing;
pub mod pipeline;
pub mod realign;
pub mod record;
pub mod rewrite;
pub mod scoring;
pub mod status;
pub mod variants;

// Flat re-exports for the most commonly used public types.
pub use config::{ClipMode, FragmentConfig, IndelPenaltyMode, ScoringConfig, SortOrder};
pub use error::RescoreError;
pub use fragment::FragmentLengthModel;
pub use pipeline::{Stats, prepare_record};
pub use record::{AlignmentRecord, Annotations, Cigar, CigarOp};
pub use scoring::{Candidate, GroupOutcome, score_group};
pub use status::{CellStatus, InsertRegion, StatusTrack};
pub use types::MapQ;

// Re-exports needed by integration tests in tests/.
#[doc(hidden)]
pub use bam_input::{CANDIDATE_COUNT, POSTERIOR};
#[doc(hidden)]
pub use grouping::ReadGroups;
#[doc(hidden)]
pub use md::{MdToken, format as format_md, parse as parse_md, reference_len as md_reference_len};
