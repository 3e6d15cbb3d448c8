use rescore_rs::config::{ClipMode, FragmentConfig, IndelPenaltyMode, ScoringConfig, SortOrder};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "rescore-rs",
    about = "Re-score, filter and rank candidate alignments with calibrated mapping qualities",
    version
)]
pub struct Args {
    /// Input BAM, grouped by read name
    pub in_bam: PathBuf,

    /// Output BAM path
    #[arg(short = 'o', long = "out", value_name = "BAM")]
    pub out_bam: PathBuf,

    /// Known variants (VCF) used as alternative likelihood hypotheses
    #[arg(long = "known-variants", value_name = "VCF")]
    pub known_variants: Option<PathBuf>,

    /// Suppress progress messages and set logging level to WARN
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Input is paired-end
    #[arg(long)]
    pub paired: bool,

    /// Drop mates that cannot be paired instead of scoring them alone
    #[arg(long)]
    pub no_mix: bool,

    /// Trim spurious flanks with the 1-D realigner before scoring
    #[arg(long)]
    pub realign: bool,

    /// Seed length counted from the read's 5' end
    #[arg(long, default_value_t = 20)]
    pub seed_length: u32,

    #[arg(long, default_value_t = 1)]
    pub match_score: i32,

    #[arg(long, default_value_t = -2, allow_hyphen_values = true)]
    pub mismatch_score: i32,

    #[arg(long, default_value_t = 5)]
    pub gap_open: i32,

    #[arg(long, default_value_t = 2)]
    pub gap_extend: i32,

    #[arg(long, default_value_t = 5)]
    pub clip_penalty: i32,

    /// Which clipped ends are trimmed and penalised
    #[arg(long, value_enum, default_value_t = ClipMode::UseAll)]
    pub clip_mode: ClipMode,

    #[arg(long, value_enum, default_value_t = IndelPenaltyMode::Absolute)]
    pub indel_mode: IndelPenaltyMode,

    #[arg(long, default_value_t = 10)]
    pub known_snp_penalty: i32,

    #[arg(long, default_value_t = 20)]
    pub known_indel_penalty: i32,

    #[arg(long, default_value_t = 20)]
    pub known_multisub_penalty: i32,

    /// INFO tag holding per-allele frequencies
    #[arg(long, default_value = "AF", conflicts_with = "no_allele_freq")]
    pub allele_freq_tag: String,

    /// Ignore allele frequencies and always use the default penalties
    #[arg(long)]
    pub no_allele_freq: bool,

    #[arg(long, default_value_t = 0.0)]
    pub min_align_rate: f64,

    #[arg(long, default_value_t = 0.0)]
    pub min_identity: f64,

    #[arg(long, default_value_t = 0)]
    pub min_mapq: u8,

    /// Discard reads with more than this many best-stratum hits (0 = no limit)
    #[arg(long, default_value_t = 0)]
    pub max_best: usize,

    /// Report at most this many alignments per read
    #[arg(long, default_value_t = 1)]
    pub max_report: usize,

    /// Hit ceiling used by the upstream aligner (0 = none)
    #[arg(long, default_value_t = 0)]
    pub max_hits: usize,

    /// Skip the mismatch, indel and seed filters
    #[arg(long)]
    pub max_sensitivity: bool,

    #[arg(long)]
    pub max_mismatch_pct: Option<f64>,

    #[arg(long)]
    pub max_indel_pct: Option<f64>,

    #[arg(long)]
    pub max_seed_mismatches: Option<u32>,

    /// Base quality assumed when the input carries none
    #[arg(long, default_value_t = 30)]
    pub default_base_quality: u8,

    #[arg(long, default_value_t = 60)]
    pub max_mapq: u8,

    /// Leave the secondary flag of emitted records untouched
    #[arg(long)]
    pub keep_secondary_flags: bool,

    #[arg(long, default_value_t = 1)]
    pub fragment_min: u32,

    #[arg(long, default_value_t = 1000)]
    pub fragment_max: u32,

    #[arg(long, default_value_t = 100_000)]
    pub fragment_sample_cap: u64,

    #[arg(long, default_value_t = 100)]
    pub fragment_min_samples: u64,

    /// Skip estimation and use this mean (requires --fragment-sd)
    #[arg(long, requires = "fragment_sd")]
    pub fragment_mean: Option<f64>,

    #[arg(long, requires = "fragment_mean")]
    pub fragment_sd: Option<f64>,

    /// Do not weight pairs by fragment length
    #[arg(long)]
    pub no_fragment_model: bool,

    /// Sort order recorded in the output header
    #[arg(long, value_enum, default_value_t = SortOrder::Unsorted)]
    pub sort_order: SortOrder,
}

impl Args {
    pub fn to_config(&self) -> ScoringConfig {
        ScoringConfig {
            seed_length: self.seed_length,
            match_score: self.match_score,
            mismatch_score: self.mismatch_score,
            gap_open: self.gap_open,
            gap_extend: self.gap_extend,
            clip_penalty: self.clip_penalty,
            clip_mode: self.clip_mode,
            indel_mode: self.indel_mode,
            known_snp_penalty: self.known_snp_penalty,
            known_indel_penalty: self.known_indel_penalty,
            known_multisub_penalty: self.known_multisub_penalty,
            allele_freq_tag: (!self.no_allele_freq).then(|| self.allele_freq_tag.clone()),
            min_align_rate: self.min_align_rate,
            min_identity: self.min_identity,
            min_mapq: self.min_mapq,
            max_best: self.max_best,
            max_report: self.max_report,
            max_hits: self.max_hits,
            max_sensitivity: self.max_sensitivity,
            max_mismatch_pct: self.max_mismatch_pct,
            max_indel_pct: self.max_indel_pct,
            max_seed_mismatches: self.max_seed_mismatches,
            realign: self.realign,
            default_base_quality: self.default_base_quality,
            max_mapq: self.max_mapq,
            mark_secondary: !self.keep_secondary_flags,
            paired: self.paired,
            no_mix: self.no_mix,
            fragment: FragmentConfig {
                disabled: self.no_fragment_model,
                min_len: self.fragment_min,
                max_len: self.fragment_max,
                sample_cap: self.fragment_sample_cap,
                min_samples: self.fragment_min_samples,
                mean: self.fragment_mean,
                sd: self.fragment_sd,
            },
            sort_order: self.sort_order,
            ..ScoringConfig::default()
        }
    }
}
