//! Per-position alignment status tracks.
//!
//! A track has one cell per CIGAR position that is a match, mismatch,
//! insertion, deletion or soft clip (hard clips, skips and pads own no cells),
//! always in reference orientation. The MD string then refines `M` cells into
//! matches and mismatches.

use crate::error::{RescoreError, Result};
use crate::md::{self, MdToken};
use crate::record::{AlignmentRecord, CigarOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStatus {
    Match,
    Mismatch,
    Insertion,
    Deletion,
    SoftClip,
    KnownSnp,
    KnownIndel,
    KnownMultiSub,
}

impl CellStatus {
    /// Reference consumption of an undecorated cell. `KnownIndel` cells can be
    /// either insertions or deletions, so callers needing coordinates must use
    /// the track the variant overlay was built from.
    pub fn consumes_reference(self) -> bool {
        matches!(
            self,
            CellStatus::Match
                | CellStatus::Mismatch
                | CellStatus::Deletion
                | CellStatus::KnownSnp
                | CellStatus::KnownMultiSub
        )
    }

    pub fn consumes_query(self) -> bool {
        matches!(
            self,
            CellStatus::Match
                | CellStatus::Mismatch
                | CellStatus::Insertion
                | CellStatus::SoftClip
                | CellStatus::KnownSnp
                | CellStatus::KnownMultiSub
        )
    }

    pub fn is_gap(self) -> bool {
        matches!(self, CellStatus::Insertion | CellStatus::Deletion)
    }
}

/// Half-open `[from, to)` range of track cells treated as truly aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InsertRegion {
    pub from: usize,
    pub to: usize,
}

impl InsertRegion {
    pub fn len(&self) -> usize {
        self.to.saturating_sub(self.from)
    }

    pub fn is_empty(&self) -> bool {
        self.to <= self.from
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusTrack {
    pub cells: Vec<CellStatus>,
}

impl StatusTrack {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn reference_len(&self) -> u32 {
        self.cells.iter().filter(|c| c.consumes_reference()).count() as u32
    }

    pub fn query_len(&self) -> u32 {
        self.cells.iter().filter(|c| c.consumes_query()).count() as u32
    }

    /// Region left after removing leading and trailing soft-clip cells.
    pub fn cigar_region(&self) -> InsertRegion {
        let from = self
            .cells
            .iter()
            .take_while(|c| **c == CellStatus::SoftClip)
            .count();
        let trailing = self.cells[from..]
            .iter()
            .rev()
            .take_while(|c| **c == CellStatus::SoftClip)
            .count();
        InsertRegion { from, to: self.cells.len() - trailing }
    }

    /// Index into the stored read sequence for every query-consuming cell.
    pub fn query_offsets(&self) -> Vec<Option<usize>> {
        let mut q = 0usize;
        self.cells
            .iter()
            .map(|c| {
                if c.consumes_query() {
                    q += 1;
                    Some(q - 1)
                } else {
                    None
                }
            })
            .collect()
    }
}

/// Decode a record's CIGAR (and MD, when present) into a status track.
pub fn build_status_track(record: &AlignmentRecord) -> Result<StatusTrack> {
    let mut cells = Vec::with_capacity(record.cigar.alignment_len() as usize);
    for &(len, op) in &record.cigar.ops {
        let status = match op {
            CigarOp::Match | CigarOp::Equal => CellStatus::Match,
            CigarOp::Diff => CellStatus::Mismatch,
            CigarOp::Ins => CellStatus::Insertion,
            CigarOp::Del => CellStatus::Deletion,
            CigarOp::SoftClip => CellStatus::SoftClip,
            CigarOp::RefSkip | CigarOp::HardClip | CigarOp::Pad => continue,
        };
        cells.extend(std::iter::repeat_n(status, len as usize));
    }

    let mut track = StatusTrack { cells };
    if let Some(md) = record.md.as_deref() {
        apply_md(&mut track, md, &record.name)?;
    }
    Ok(track)
}

fn apply_md(track: &mut StatusTrack, md_str: &str, read: &str) -> Result<()> {
    let malformed = |message: String| RescoreError::MalformedMd {
        read: read.to_string(),
        message,
    };

    let tokens = md::parse(md_str).map_err(malformed)?;
    let cigar_ref_len = track.reference_len();
    let md_ref_len = md::reference_len(&tokens).map_err(|e| malformed(format!("{e} in {md_str}")))?;
    if cigar_ref_len != md_ref_len {
        return Err(RescoreError::CigarMdMismatch {
            read: read.to_string(),
            cigar_ref_len,
            md_ref_len,
        });
    }

    let cells = &mut track.cells;
    let mut cursor = 0usize;

    for token in &tokens {
        match token {
            MdToken::Match(n) => {
                for _ in 0..*n {
                    let idx = next_reference_cell(cells, &mut cursor)
                        .ok_or_else(|| malformed(format!("{md_str} runs past the alignment")))?;
                    if cells[idx] == CellStatus::Deletion {
                        return Err(malformed(format!(
                            "{md_str} reports a match over deleted cell {idx}"
                        )));
                    }
                }
            }
            MdToken::Mismatch(base) => {
                let idx = next_reference_cell(cells, &mut cursor)
                    .ok_or_else(|| malformed(format!("{md_str} runs past the alignment")))?;
                match cells[idx] {
                    CellStatus::Match | CellStatus::Mismatch => cells[idx] = CellStatus::Mismatch,
                    other => {
                        return Err(malformed(format!(
                            "substitution '{}' lands on {other:?} cell {idx}",
                            *base as char
                        )));
                    }
                }
            }
            MdToken::Deletion(bases) => {
                for _ in 0..bases.len() {
                    let idx = next_reference_cell(cells, &mut cursor)
                        .ok_or_else(|| malformed(format!("{md_str} runs past the alignment")))?;
                    if cells[idx] != CellStatus::Deletion {
                        return Err(malformed(format!(
                            "deletion lands on {:?} cell {idx}",
                            cells[idx]
                        )));
                    }
                }
            }
        }
    }

    Ok(())
}

fn next_reference_cell(cells: &[CellStatus], cursor: &mut usize) -> Option<usize> {
    while *cursor < cells.len() {
        let idx = *cursor;
        *cursor += 1;
        if cells[idx].consumes_reference() {
            return Some(idx);
        }
    }
    None
}
