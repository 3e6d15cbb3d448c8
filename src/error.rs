//! Fatal conditions raised by the scoring core.
//!
//! Everything here aborts the run: these are data-consistency invariants or
//! mode/input mismatches, not expected runtime conditions. Recoverable cases
//! (unmapped reads, empty alignments, non-finite posteriors) never reach this
//! type; they are counted and skipped by the pipeline instead.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RescoreError {
    /// CIGAR and MD disagree on the number of reference bases spanned.
    #[error("read {read}: CIGAR spans {cigar_ref_len} reference bases but MD spans {md_ref_len}")]
    CigarMdMismatch {
        read: String,
        cigar_ref_len: u32,
        md_ref_len: u32,
    },

    /// CIGAR query length disagrees with the stored read length.
    #[error("read {read}: CIGAR consumes {cigar_query_len} query bases but the read has {read_len}")]
    ReadLengthMismatch {
        read: String,
        cigar_query_len: u32,
        read_len: u32,
    },

    /// MD string could not be parsed, or its tokens landed on the wrong cells.
    #[error("read {read}: malformed MD string: {message}")]
    MalformedMd { read: String, message: String },

    /// The rewritten CIGAR/MD pair no longer agrees on reference length.
    #[error("read {read}: rewritten CIGAR spans {cigar_ref_len} reference bases but rewritten MD spans {md_ref_len}")]
    RewriteInconsistent {
        read: String,
        cigar_ref_len: u32,
        md_ref_len: u32,
    },

    #[error(
        "only {found} usable pairs found for fragment-length estimation (need {required}); \
         supply --fragment-mean and --fragment-sd explicitly"
    )]
    InsufficientFragmentSamples { found: u64, required: u64 },

    #[error("read {read} is not paired but paired-end mode was requested")]
    NotPaired { read: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, RescoreError>;
