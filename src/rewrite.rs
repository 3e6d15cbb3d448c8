//! Regenerate CIGAR and MD after the realigner moved the region boundaries.
//!
//! Cells outside the new region become soft clips (query bases) or vanish
//! (deleted reference bases). Hard clips are kept verbatim; skips and pads
//! survive only when they sit strictly inside the region. The MD string is
//! cut to the same reference window; substitution and deletion tokens are
//! atomic and are either kept whole or dropped whole.

use crate::error::{RescoreError, Result};
use crate::md::{self, MdToken};
use crate::record::{AlignmentRecord, Cigar, CigarOp};
use crate::status::{InsertRegion, StatusTrack};

/// Encodings produced for a new region; applied to the record by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenEncodings {
    pub cigar: Cigar,
    pub md: Option<String>,
    /// Reference bases removed from the left; added to the alignment start.
    pub ref_shift: u32,
}

/// Compute the CIGAR/MD pair for `region` without touching the record.
pub fn rewrite_encodings(
    record: &AlignmentRecord,
    track: &StatusTrack,
    region: InsertRegion,
) -> Result<RewrittenEncodings> {
    let mut leading_hard = 0u32;
    let mut trailing_hard = 0u32;
    let mut body = Cigar::default();
    let mut lead_clip = 0u32;
    let mut trail_clip = 0u32;
    let mut ref_shift = 0u32;
    let mut cell = 0usize;

    for &(len, op) in &record.cigar.ops {
        if !op.occupies_track() {
            match op {
                CigarOp::HardClip if cell == 0 => leading_hard += len,
                CigarOp::HardClip => trailing_hard += len,
                _ if cell > region.from && cell < region.to => body.add_operation(len, op),
                _ => {
                    if cell <= region.from && op.consumes_reference() {
                        ref_shift += len;
                    }
                }
            }
            continue;
        }

        let start = cell;
        let end = cell + len as usize;
        cell = end;

        let before = overlap(start, end, 0, region.from);
        let within = overlap(start, end, region.from, region.to);
        let after = overlap(start, end, region.to, usize::MAX);

        if op.consumes_query() {
            lead_clip += before;
            trail_clip += after;
        }
        if op.consumes_reference() {
            ref_shift += before;
        }
        body.add_operation(within, op);
    }

    let mut cigar = Cigar::default();
    cigar.add_operation(leading_hard, CigarOp::HardClip);
    cigar.add_operation(lead_clip, CigarOp::SoftClip);
    for &(len, op) in &body.ops {
        cigar.add_operation(len, op);
    }
    cigar.add_operation(trail_clip, CigarOp::SoftClip);
    cigar.add_operation(trailing_hard, CigarOp::HardClip);

    debug_assert_eq!(cigar.query_len(), record.cigar.query_len());

    let md = match record.md.as_deref() {
        Some(md_str) => {
            let malformed = |message: String| RescoreError::MalformedMd {
                read: record.name.clone(),
                message,
            };
            let tokens = md::parse(md_str).map_err(malformed)?;
            let lo = track.cells[..region.from]
                .iter()
                .filter(|c| c.consumes_reference())
                .count() as u32;
            let hi = lo
                + track.cells[region.from..region.to]
                    .iter()
                    .filter(|c| c.consumes_reference())
                    .count() as u32;
            let clipped = clip_md(&tokens, lo, hi);

            let cigar_ref_len = cigar.track_reference_len();
            let md_ref_len = md::reference_len(&clipped).map_err(malformed)?;
            if cigar_ref_len != md_ref_len {
                return Err(RescoreError::RewriteInconsistent {
                    read: record.name.clone(),
                    cigar_ref_len,
                    md_ref_len,
                });
            }
            Some(md::format(&clipped))
        }
        None => None,
    };

    Ok(RewrittenEncodings { cigar, md, ref_shift })
}

/// Rewrite the record in place and report whether anything changed.
pub fn apply_region(
    record: &mut AlignmentRecord,
    track: &StatusTrack,
    old: InsertRegion,
    new: InsertRegion,
) -> Result<bool> {
    if old == new {
        return Ok(false);
    }
    let rewritten = rewrite_encodings(record, track, new)?;
    tracing::debug!(
        read = %record.name,
        old_cigar = %record.cigar,
        new_cigar = %rewritten.cigar,
        ref_shift = rewritten.ref_shift,
        "rewrote alignment flanks"
    );
    record.cigar = rewritten.cigar;
    record.md = rewritten.md;
    record.pos += rewritten.ref_shift;
    Ok(true)
}

/// Keep the part of the MD token stream covering reference offsets `[lo, hi)`.
fn clip_md(tokens: &[MdToken], lo: u32, hi: u32) -> Vec<MdToken> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut r = 0u32;

    for token in tokens {
        let len = token.reference_len();
        let (start, end) = (r, r + len);
        r = end;
        match token {
            MdToken::Match(_) => {
                let kept = end.min(hi).saturating_sub(start.max(lo));
                if kept > 0 {
                    out.push(MdToken::Match(kept));
                }
            }
            _ => {
                if start >= lo && end <= hi {
                    out.push(token.clone());
                }
            }
        }
    }

    out
}

fn overlap(start: usize, end: usize, lo: usize, hi: usize) -> u32 {
    end.min(hi).saturating_sub(start.max(lo)) as u32
}
