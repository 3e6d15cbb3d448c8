//! One-dimensional local re-estimation of the aligned region.
//!
//! The CIGAR already fixes which read base faces which reference base, so
//! this is a Smith-Waterman recurrence collapsed onto the status track: the
//! running score is floored at zero and the best-scoring stretch becomes the
//! insert region. Anything outside it is treated as spurious flank.

use crate::config::{ClipMode, ScoringConfig};
use crate::status::{CellStatus, InsertRegion, StatusTrack};

#[derive(Debug, Clone, Copy)]
pub struct RealignScores {
    pub match_score: i32,
    pub mismatch_score: i32,
    pub gap_open: i32,
    pub gap_extend: i32,
}

impl From<&ScoringConfig> for RealignScores {
    fn from(config: &ScoringConfig) -> Self {
        Self {
            match_score: config.match_score,
            mismatch_score: config.mismatch_score,
            gap_open: config.gap_open,
            gap_extend: config.gap_extend,
        }
    }
}

/// Best-scoring region of `track`. Ties keep the first maximum seen.
/// Returns an empty region when no cell scores positively.
pub fn realign_1d(track: &StatusTrack, scores: &RealignScores) -> InsertRegion {
    let mut running: i64 = 0;
    let mut run_start = 0usize;
    let mut best: i64 = 0;
    let mut region = InsertRegion::default();
    let mut prev: Option<CellStatus> = None;

    for (i, &cell) in track.cells.iter().enumerate() {
        let delta = match cell {
            CellStatus::Match | CellStatus::KnownSnp | CellStatus::KnownMultiSub => {
                i64::from(scores.match_score)
            }
            CellStatus::Mismatch => i64::from(scores.mismatch_score),
            CellStatus::Insertion | CellStatus::Deletion | CellStatus::KnownIndel => {
                if prev == Some(cell) {
                    -i64::from(scores.gap_extend)
                } else {
                    -i64::from(scores.gap_open)
                }
            }
            CellStatus::SoftClip => 0,
        };
        prev = Some(cell);

        let next = running + delta;
        if next <= 0 {
            running = 0;
            run_start = i + 1;
            continue;
        }
        running = next;
        if running > best {
            best = running;
            region = InsertRegion { from: run_start, to: i + 1 };
        }
    }

    region
}

/// Pin the flanks the clip mode does not allow the realigner to move back to
/// their CIGAR boundaries.
pub fn restrict_to_clip_mode(
    dp: InsertRegion,
    cigar: InsertRegion,
    mode: ClipMode,
    is_reverse: bool,
) -> InsertRegion {
    if dp.is_empty() {
        return dp;
    }
    let from = if mode.left_flank(is_reverse) { dp.from } else { cigar.from };
    let to = if mode.right_flank(is_reverse) { dp.to } else { cigar.to };
    InsertRegion { from, to }
}
