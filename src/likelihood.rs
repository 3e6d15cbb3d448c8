//! Log10 likelihood of an alignment, optionally explained by known variants.
//!
//! The baseline walks the status track once. Each overlapping known variant
//! whose alternate allele is exactly what the read shows becomes a competing
//! hypothesis: its cells are reclassified and priced by the variant penalty
//! instead of the ordinary mismatch and gap terms. The best hypothesis wins.

use crate::config::{ClipMode, IndelPenaltyMode, ScoringConfig};
use crate::record::{AlignmentRecord, CigarOp};
use crate::status::{CellStatus, StatusTrack};
use crate::variants::{KnownVariant, VariantSource};

const MAX_ERROR: f64 = 0.75;
const MIN_ERROR: f64 = 1e-10;
const RELATIVE_GAP_REFERENCE_Q: f64 = 30.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Hypothesis {
    pub log10_likelihood: f64,
    /// Id of the known variant behind this hypothesis; `None` for the baseline.
    pub variant: Option<String>,
}

pub fn error_probability(q: u8) -> f64 {
    10f64.powf(-f64::from(q) / 10.0).clamp(MIN_ERROR, MAX_ERROR)
}

/// Read-wide inputs to the per-cell terms.
struct ReadContext<'a> {
    qualities: Option<&'a [u8]>,
    default_q: u8,
    /// Sequence offset of each query-consuming cell of the undecorated track.
    offsets: Vec<Option<usize>>,
    clip_mode: ClipMode,
    is_reverse: bool,
    gap_scale: f64,
}

impl ReadContext<'_> {
    fn quality_at(&self, cell: usize) -> u8 {
        match (self.qualities, self.offsets.get(cell).copied().flatten()) {
            (Some(q), Some(i)) if i < q.len() => q[i],
            _ => self.default_q,
        }
    }

    fn mean_quality(&self, range: impl Iterator<Item = usize>) -> f64 {
        let Some(q) = self.qualities else {
            return f64::from(self.default_q);
        };
        let (sum, n) = range
            .filter_map(|i| q.get(i))
            .fold((0u64, 0u64), |(s, n), &v| (s + u64::from(v), n + 1));
        if n == 0 { f64::from(self.default_q) } else { sum as f64 / n as f64 }
    }
}

fn read_context<'a>(
    record: &'a AlignmentRecord,
    track: &StatusTrack,
    config: &ScoringConfig,
) -> ReadContext<'a> {
    let qualities = record
        .qualities
        .as_deref()
        .filter(|q| !q.is_empty() && !q.iter().all(|&v| v == 0xff));
    let mut ctx = ReadContext {
        qualities,
        default_q: config.default_base_quality,
        offsets: track.query_offsets(),
        clip_mode: config.clip_mode,
        is_reverse: record.is_reverse(),
        gap_scale: 1.0,
    };
    if config.indel_mode == IndelPenaltyMode::Relative {
        let n = qualities.map_or(0, <[u8]>::len);
        ctx.gap_scale = ctx.mean_quality(0..n) / RELATIVE_GAP_REFERENCE_Q;
    }
    ctx
}

/// Log10 likelihood of `cells`. `known_penalty` (log10, <= 0) is charged once
/// for the first known-variant cell encountered.
fn score_cells(
    cells: &[CellStatus],
    record: &AlignmentRecord,
    ctx: &ReadContext<'_>,
    config: &ScoringConfig,
    known_penalty: f64,
) -> f64 {
    let clip_term = |q: u8| error_probability(q).log10() - f64::from(config.clip_penalty) / 10.0;
    let gap_open = -f64::from(config.gap_open) / 10.0 * ctx.gap_scale;
    let gap_extend = -f64::from(config.gap_extend) / 10.0 * ctx.gap_scale;

    let first_aligned = cells
        .iter()
        .position(|c| *c != CellStatus::SoftClip)
        .unwrap_or(cells.len());
    let left_clip = ctx.clip_mode.left_flank(ctx.is_reverse);
    let right_clip = ctx.clip_mode.right_flank(ctx.is_reverse);

    let mut total = 0.0;
    let mut prev: Option<CellStatus> = None;
    let mut known_charged = false;

    for (i, &cell) in cells.iter().enumerate() {
        let q = ctx.quality_at(i);
        total += match cell {
            CellStatus::Match => (1.0 - error_probability(q)).log10(),
            CellStatus::Mismatch => error_probability(q).log10(),
            CellStatus::SoftClip => {
                let allowed = if i < first_aligned { left_clip } else { right_clip };
                if allowed { clip_term(q) } else { 0.0 }
            }
            CellStatus::Insertion | CellStatus::Deletion => {
                if prev == Some(cell) { gap_extend } else { gap_open }
            }
            CellStatus::KnownSnp | CellStatus::KnownMultiSub | CellStatus::KnownIndel => {
                let mut term = 0.0;
                if !known_charged {
                    term += known_penalty;
                    known_charged = true;
                }
                if ctx.offsets.get(i).copied().flatten().is_some() {
                    term += (1.0 - error_probability(q)).log10();
                }
                term
            }
        };
        prev = Some(cell);
    }

    let stored = ctx.qualities.map_or(record.sequence.len(), <[u8]>::len);
    let sample = config.hard_clip_sample.max(1);
    let leading_hard = record.cigar.leading_hard_clip();
    if leading_hard > 0 && left_clip {
        let mean = ctx.mean_quality(0..sample.min(stored));
        total += f64::from(leading_hard) * clip_term(mean.round() as u8);
    }
    let trailing_hard = record.cigar.trailing_hard_clip();
    if trailing_hard > 0 && right_clip {
        let mean = ctx.mean_quality(stored.saturating_sub(sample)..stored);
        total += f64::from(trailing_hard) * clip_term(mean.round() as u8);
    }

    total
}

/// Log10 likelihood of the record as aligned, without variant hypotheses.
pub fn baseline_log10_likelihood(
    record: &AlignmentRecord,
    track: &StatusTrack,
    config: &ScoringConfig,
) -> f64 {
    let ctx = read_context(record, track, config);
    score_cells(&track.cells, record, &ctx, config, 0.0)
}

/// Baseline likelihood, improved by the best-scoring known-variant hypothesis.
pub fn best_hypothesis(
    record: &AlignmentRecord,
    track: &StatusTrack,
    config: &ScoringConfig,
    variants: Option<&dyn VariantSource>,
) -> Hypothesis {
    let ctx = read_context(record, track, config);
    let mut best = Hypothesis {
        log10_likelihood: score_cells(&track.cells, record, &ctx, config, 0.0),
        variant: None,
    };

    let Some(source) = variants else {
        return best;
    };
    if record.sequence.is_empty() {
        return best;
    }

    let positions = cell_reference_positions(record);
    for variant in source.overlapping(&record.ref_name, record.pos, record.end()) {
        let Some((cells, penalty)) = overlay_variant(record, track, &positions, &ctx, variant, config)
        else {
            continue;
        };
        let score = score_cells(&cells, record, &ctx, config, penalty);
        if score > best.log10_likelihood {
            best = Hypothesis {
                log10_likelihood: score,
                variant: Some(variant.id.clone()),
            };
        }
    }

    best
}

/// 1-based reference position of every track cell. Query-only cells take the
/// position of the preceding reference base.
pub fn cell_reference_positions(record: &AlignmentRecord) -> Vec<i64> {
    let mut positions = Vec::with_capacity(record.cigar.alignment_len() as usize);
    let mut g = i64::from(record.pos);
    for &(len, op) in &record.cigar.ops {
        if !op.occupies_track() {
            if op == CigarOp::RefSkip {
                g += i64::from(len);
            }
            continue;
        }
        for _ in 0..len {
            if op.consumes_reference() {
                positions.push(g);
                g += 1;
            } else {
                positions.push(g - 1);
            }
        }
    }
    positions
}

/// Reclassify the cells covering `variant` when the read carries one of its
/// alternate alleles. Returns the decorated cells and the log10 penalty.
fn overlay_variant(
    record: &AlignmentRecord,
    track: &StatusTrack,
    positions: &[i64],
    ctx: &ReadContext<'_>,
    variant: &KnownVariant,
    config: &ScoringConfig,
) -> Option<(Vec<CellStatus>, f64)> {
    let (vs, ve) = (i64::from(variant.start), i64::from(variant.end));
    let span: Vec<usize> = (0..track.cells.len())
        .filter(|&i| {
            let p = positions[i];
            p >= vs && p <= ve && track.cells[i] != CellStatus::SoftClip
        })
        .collect();
    let (&first, &last) = (span.first()?, span.last()?);

    if track.cells[first..=last].contains(&CellStatus::SoftClip) {
        return None;
    }
    let ref_cells = span
        .iter()
        .filter(|&&i| track.cells[i].consumes_reference())
        .count() as i64;
    if ref_cells != ve - vs + 1 {
        return None;
    }

    let observed: Vec<u8> = span
        .iter()
        .filter_map(|&i| ctx.offsets[i])
        .filter_map(|q| record.sequence.get(q))
        .map(u8::to_ascii_uppercase)
        .collect();

    let alt_idx = variant
        .alt_alleles
        .iter()
        .position(|alt| is_literal_allele(alt) && *alt == observed)?;
    let alt = &variant.alt_alleles[alt_idx];

    let (class, default_penalty) = if alt.len() != variant.ref_allele.len() {
        (CellStatus::KnownIndel, config.known_indel_penalty)
    } else if alt.len() == 1 {
        (CellStatus::KnownSnp, config.known_snp_penalty)
    } else {
        (CellStatus::KnownMultiSub, config.known_multisub_penalty)
    };

    let mut cells = track.cells.clone();
    let mut changed = false;
    for &i in &span {
        if cells[i] != CellStatus::Match {
            cells[i] = class;
            changed = true;
        }
    }
    if !changed {
        return None;
    }

    let penalty = match variant.freq(alt_idx) {
        Some(f) if f > 0.0 && f.is_finite() => f.min(1.0).log10(),
        _ => -f64::from(default_penalty) / 10.0,
    };
    Some((cells, penalty))
}

fn is_literal_allele(allele: &[u8]) -> bool {
    !allele.is_empty()
        && allele
            .iter()
            .all(|b| matches!(b.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T' | b'N'))
}
