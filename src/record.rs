use crate::types::MapQ;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::record::Flags;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CigarOp {
    #[default]
    Match,
    Ins,
    Del,
    RefSkip,
    SoftClip,
    HardClip,
    Pad,
    Equal,
    Diff,
}

impl CigarOp {
    pub fn consumes_query(self) -> bool {
        matches!(
            self,
            CigarOp::Match | CigarOp::Ins | CigarOp::SoftClip | CigarOp::Equal | CigarOp::Diff
        )
    }

    pub fn consumes_reference(self) -> bool {
        matches!(
            self,
            CigarOp::Match | CigarOp::Del | CigarOp::RefSkip | CigarOp::Equal | CigarOp::Diff
        )
    }

    /// Ops that own cells in the status track. Hard clips, skips and pads do not.
    pub fn occupies_track(self) -> bool {
        matches!(
            self,
            CigarOp::Match
                | CigarOp::Ins
                | CigarOp::Del
                | CigarOp::SoftClip
                | CigarOp::Equal
                | CigarOp::Diff
        )
    }

    pub fn to_char(self) -> char {
        match self {
            CigarOp::Match => 'M',
            CigarOp::Ins => 'I',
            CigarOp::Del => 'D',
            CigarOp::RefSkip => 'N',
            CigarOp::SoftClip => 'S',
            CigarOp::HardClip => 'H',
            CigarOp::Pad => 'P',
            CigarOp::Equal => '=',
            CigarOp::Diff => 'X',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'M' => CigarOp::Match,
            'I' => CigarOp::Ins,
            'D' => CigarOp::Del,
            'N' => CigarOp::RefSkip,
            'S' => CigarOp::SoftClip,
            'H' => CigarOp::HardClip,
            'P' => CigarOp::Pad,
            '=' => CigarOp::Equal,
            'X' => CigarOp::Diff,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cigar {
    pub ops: Vec<(u32, CigarOp)>,
}

impl Cigar {
    pub fn add_operation(&mut self, len: u32, op: CigarOp) {
        if len == 0 {
            return;
        }
        if let Some((prev_len, prev_op)) = self.ops.last_mut()
            && *prev_op == op
        {
            *prev_len = prev_len.saturating_add(len);
            return;
        }
        self.ops.push((len, op));
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of status-track cells: M/=/X/I/D/S lengths.
    pub fn alignment_len(&self) -> u32 {
        self.sum_where(CigarOp::occupies_track)
    }

    pub fn reference_len(&self) -> u32 {
        self.sum_where(CigarOp::consumes_reference)
    }

    /// Reference bases spanned by track cells, i.e. excluding `N` skips.
    pub fn track_reference_len(&self) -> u32 {
        self.sum_where(|op| op.occupies_track() && op.consumes_reference())
    }

    pub fn query_len(&self) -> u32 {
        self.sum_where(CigarOp::consumes_query)
    }

    pub fn leading_hard_clip(&self) -> u32 {
        match self.ops.first() {
            Some(&(len, CigarOp::HardClip)) => len,
            _ => 0,
        }
    }

    pub fn trailing_hard_clip(&self) -> u32 {
        match self.ops.as_slice() {
            [_, .., (len, CigarOp::HardClip)] => *len,
            _ => 0,
        }
    }

    /// Sum of all operation lengths, `None` if it does not fit in a `u32`.
    /// Decoders reject such CIGARs, so every partial sum below fits.
    pub fn checked_total_len(&self) -> Option<u32> {
        self.ops.iter().try_fold(0u32, |acc, &(len, _)| acc.checked_add(len))
    }

    fn sum_where(&self, pred: impl Fn(CigarOp) -> bool) -> u32 {
        self.ops
            .iter()
            .filter(|(_, op)| pred(*op))
            .fold(0u32, |acc, &(len, _)| acc.saturating_add(len))
    }
}

impl fmt::Display for Cigar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ops.is_empty() {
            return f.write_str("*");
        }
        for (len, op) in &self.ops {
            write!(f, "{}{}", len, op.to_char())?;
        }
        Ok(())
    }
}

impl FromStr for Cigar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cigar = Cigar::default();
        if s == "*" {
            return Ok(cigar);
        }
        let mut len: u32 = 0;
        let mut have_digits = false;
        for c in s.chars() {
            if let Some(d) = c.to_digit(10) {
                len = len
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(d))
                    .ok_or_else(|| format!("CIGAR length overflow in {s}"))?;
                have_digits = true;
                continue;
            }
            let op = CigarOp::from_char(c).ok_or_else(|| format!("invalid CIGAR op '{c}' in {s}"))?;
            if !have_digits {
                return Err(format!("CIGAR op '{c}' without length in {s}"));
            }
            // keep zero-length and repeated ops verbatim; normalisation is the caller's choice
            cigar.ops.push((len, op));
            len = 0;
            have_digits = false;
        }
        if have_digits {
            return Err(format!("trailing length without op in {s}"));
        }
        if cigar.checked_total_len().is_none() {
            return Err(format!("CIGAR length overflow in {s}"));
        }
        Ok(cigar)
    }
}

/// Derived per-record fields filled in by the scoring stages.
#[derive(Debug, Clone, Default)]
pub struct Annotations {
    pub aln_len: u32,
    pub insert_len: u32,
    pub insert_from: u32,
    pub identity: f64,
    pub align_rate: f64,
    pub log_likelihood: f64,
    pub seed_mismatches: u32,
    pub seed_indels: u32,
    pub mismatches: u32,
    pub indels: u32,
    pub edit_distance: u32,
    pub known_variant: Option<String>,
    pub realigned: bool,
    pub posterior: f64,
    pub mapq: Option<MapQ>,
    pub reported: u32,
    pub candidates: u32,
}

/// One decoded alignment plus the annotations accumulated while scoring it.
#[derive(Debug, Clone)]
pub struct AlignmentRecord {
    pub name: String,
    pub ref_name: String,
    /// 1-based leftmost reference position.
    pub pos: u32,
    pub flags: Flags,
    /// Mate's 1-based leftmost position (SAM `PNEXT`).
    pub mate_pos: Option<u32>,
    pub template_len: i32,
    pub read_len: u32,
    /// Stored read bases in reference orientation (hard clips excluded).
    pub sequence: Vec<u8>,
    /// Phred base qualities aligned with `sequence`.
    pub qualities: Option<Vec<u8>>,
    pub cigar: Cigar,
    /// Mismatch span string (SAM `MD`).
    pub md: Option<String>,
    pub annotations: Annotations,
    /// Decoded input record, kept so untouched fields pass through to output.
    pub source: Option<RecordBuf>,
}

impl AlignmentRecord {
    pub fn new(name: &str, ref_name: &str, pos: u32, cigar: Cigar) -> Self {
        let read_len = cigar.query_len();
        Self {
            name: name.to_string(),
            ref_name: ref_name.to_string(),
            pos,
            flags: Flags::empty(),
            mate_pos: None,
            template_len: 0,
            read_len,
            sequence: Vec::new(),
            qualities: None,
            cigar,
            md: None,
            annotations: Annotations::default(),
            source: None,
        }
    }

    pub fn is_unmapped(&self) -> bool {
        self.flags.is_unmapped()
    }

    pub fn is_reverse(&self) -> bool {
        self.flags.is_reverse_complemented()
    }

    pub fn is_paired(&self) -> bool {
        self.flags.is_segmented()
    }

    pub fn is_first_of_pair(&self) -> bool {
        self.flags.is_first_segment()
    }

    pub fn is_secondary(&self) -> bool {
        self.flags.is_secondary()
    }

    pub fn is_supplementary(&self) -> bool {
        self.flags.is_supplementary()
    }

    pub fn set_secondary(&mut self, secondary: bool) {
        if secondary {
            self.flags.insert(Flags::SECONDARY);
        } else {
            self.flags.remove(Flags::SECONDARY);
        }
    }

    /// Last reference position covered (1-based, inclusive).
    pub fn end(&self) -> u32 {
        (self.pos + self.cigar.reference_len()).saturating_sub(1)
    }
}
