use crate::error::{RescoreError, Result};
use crate::types::MapQ;
use clap::ValueEnum;

/// Which soft/hard-clipped read ends the realigner may trim and the
/// likelihood engine penalises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ClipMode {
    #[default]
    UseAll,
    Ignore,
    FivePrime,
    ThreePrime,
}

impl ClipMode {
    /// Whether the left (reference-orientation) flank is subject to clipping
    /// for a read on the given strand.
    pub fn left_flank(self, is_reverse: bool) -> bool {
        match self {
            ClipMode::UseAll => true,
            ClipMode::Ignore => false,
            ClipMode::FivePrime => !is_reverse,
            ClipMode::ThreePrime => is_reverse,
        }
    }

    pub fn right_flank(self, is_reverse: bool) -> bool {
        match self {
            ClipMode::UseAll => true,
            ClipMode::Ignore => false,
            ClipMode::FivePrime => is_reverse,
            ClipMode::ThreePrime => !is_reverse,
        }
    }
}

/// How gap penalties enter the log-likelihood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum IndelPenaltyMode {
    /// Phred-scaled constants.
    #[default]
    Absolute,
    /// Scaled by the read's mean base quality relative to Q30.
    Relative,
}

/// Sort order recorded in the output header. Physical sorting happens elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortOrder {
    #[default]
    Unsorted,
    #[value(name = "queryname")]
    QueryName,
    Coordinate,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Unsorted => "unsorted",
            SortOrder::QueryName => "queryname",
            SortOrder::Coordinate => "coordinate",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FragmentConfig {
    pub disabled: bool,
    pub min_len: u32,
    pub max_len: u32,
    pub sample_cap: u64,
    pub min_samples: u64,
    /// Manual model; when both are set estimation is skipped.
    pub mean: Option<f64>,
    pub sd: Option<f64>,
}

impl Default for FragmentConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            min_len: 1,
            max_len: 1000,
            sample_cap: 100_000,
            min_samples: 100,
            mean: None,
            sd: None,
        }
    }
}

/// Immutable run configuration, built once and passed by reference.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub seed_length: u32,
    pub match_score: i32,
    pub mismatch_score: i32,
    pub gap_open: i32,
    pub gap_extend: i32,
    pub clip_penalty: i32,
    pub clip_mode: ClipMode,
    pub indel_mode: IndelPenaltyMode,
    pub known_snp_penalty: i32,
    pub known_indel_penalty: i32,
    pub known_multisub_penalty: i32,
    /// INFO key holding per-allele frequencies; `None` disables lookup.
    pub allele_freq_tag: Option<String>,
    pub min_align_rate: f64,
    pub min_identity: f64,
    pub min_mapq: MapQ,
    /// 0 disables the best-stratum cap.
    pub max_best: usize,
    pub max_report: usize,
    /// Hit ceiling of the upstream aligner; 0 disables inflation.
    pub max_hits: usize,
    pub max_sensitivity: bool,
    pub max_mismatch_pct: Option<f64>,
    pub max_indel_pct: Option<f64>,
    pub max_seed_mismatches: Option<u32>,
    pub realign: bool,
    pub default_base_quality: u8,
    pub hard_clip_sample: usize,
    pub max_mapq: MapQ,
    pub unique_mapq: MapQ,
    pub invalid_mapq: MapQ,
    pub mark_secondary: bool,
    pub paired: bool,
    pub no_mix: bool,
    pub fragment: FragmentConfig,
    pub sort_order: SortOrder,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            seed_length: 20,
            match_score: 1,
            mismatch_score: -2,
            gap_open: 5,
            gap_extend: 2,
            clip_penalty: 5,
            clip_mode: ClipMode::UseAll,
            indel_mode: IndelPenaltyMode::Absolute,
            known_snp_penalty: 10,
            known_indel_penalty: 20,
            known_multisub_penalty: 20,
            allele_freq_tag: Some("AF".to_string()),
            min_align_rate: 0.0,
            min_identity: 0.0,
            min_mapq: 0,
            max_best: 0,
            max_report: 1,
            max_hits: 0,
            max_sensitivity: false,
            max_mismatch_pct: None,
            max_indel_pct: None,
            max_seed_mismatches: None,
            realign: false,
            default_base_quality: 30,
            hard_clip_sample: 5,
            max_mapq: 60,
            unique_mapq: 70,
            invalid_mapq: 255,
            mark_secondary: true,
            paired: false,
            no_mix: false,
            fragment: FragmentConfig::default(),
            sort_order: SortOrder::Unsorted,
        }
    }
}

impl ScoringConfig {
    /// Check every parameter against its documented range.
    pub fn validate(&self) -> Result<()> {
        fn fail(msg: String) -> Result<()> {
            Err(RescoreError::InvalidConfig(msg))
        }

        if self.seed_length == 0 {
            return fail("seed length must be > 0".into());
        }
        if self.match_score <= 0 {
            return fail(format!("match score must be > 0 (got {})", self.match_score));
        }
        if self.mismatch_score > 0 {
            return fail(format!("mismatch score must be <= 0 (got {})", self.mismatch_score));
        }
        if self.gap_open < 0 {
            return fail(format!("gap-open penalty must be >= 0 (got {})", self.gap_open));
        }
        if self.gap_extend <= 0 {
            return fail(format!("gap-extend penalty must be > 0 (got {})", self.gap_extend));
        }
        for (name, v) in [
            ("clip", self.clip_penalty),
            ("known-SNP", self.known_snp_penalty),
            ("known-indel", self.known_indel_penalty),
            ("known-multi-substitution", self.known_multisub_penalty),
        ] {
            if v < 0 {
                return fail(format!("{name} penalty must be >= 0 (got {v})"));
            }
        }
        for (name, v) in [("align rate", self.min_align_rate), ("identity", self.min_identity)] {
            if !(0.0..=1.0).contains(&v) {
                return fail(format!("minimum {name} must be within [0, 1] (got {v})"));
            }
        }
        for (name, v) in [("mismatch", self.max_mismatch_pct), ("indel", self.max_indel_pct)] {
            if let Some(v) = v
                && !(0.0..=1.0).contains(&v)
            {
                return fail(format!("maximum {name} fraction must be within [0, 1] (got {v})"));
            }
        }
        if self.max_report == 0 {
            return fail("maximum report count must be > 0".into());
        }
        if self.min_mapq > self.max_mapq {
            return fail(format!(
                "minimum mapq {} exceeds maximum mapq {}",
                self.min_mapq, self.max_mapq
            ));
        }

        let frag = &self.fragment;
        if frag.min_len > frag.max_len {
            return fail(format!(
                "fragment min length {} exceeds max length {}",
                frag.min_len, frag.max_len
            ));
        }
        if frag.sample_cap == 0 {
            return fail("fragment sample cap must be > 0".into());
        }
        match (frag.mean, frag.sd) {
            (Some(_), None) | (None, Some(_)) => {
                return fail("fragment mean and sd must be supplied together".into());
            }
            (Some(m), Some(s)) if !(m.is_finite() && s.is_finite() && m > 0.0 && s > 0.0) => {
                return fail(format!("fragment mean/sd must be positive (got {m}/{s})"));
            }
            _ => {}
        }
        Ok(())
    }
}
