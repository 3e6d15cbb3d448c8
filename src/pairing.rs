use crate::error::RescoreError;
use crate::record::AlignmentRecord;

/// One candidate placement of a read pair. At least one mate is present.
#[derive(Debug, Clone)]
pub struct AlignmentPair {
    /// Read-1 side.
    pub first: Option<AlignmentRecord>,
    /// Read-2 side.
    pub second: Option<AlignmentRecord>,
}

impl AlignmentPair {
    pub fn both(a: AlignmentRecord, b: AlignmentRecord) -> Self {
        let (first, second) = assign_pair_order(a, b);
        Self { first: Some(first), second: Some(second) }
    }

    pub fn single(record: AlignmentRecord) -> Self {
        if record.is_first_of_pair() {
            Self { first: Some(record), second: None }
        } else {
            Self { first: None, second: Some(record) }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.first.is_some() && self.second.is_some()
    }

    /// |TLEN| when both mates are present.
    pub fn template_len(&self) -> Option<u32> {
        match (&self.first, &self.second) {
            (Some(a), Some(_)) => Some(a.template_len.unsigned_abs()),
            _ => None,
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &AlignmentRecord> {
        self.first.iter().chain(self.second.iter())
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut AlignmentRecord> {
        self.first.iter_mut().chain(self.second.iter_mut())
    }

    /// Point each mate's PNEXT at the other and recompute TLEN from the
    /// current alignment starts and ends. The leftmost mate gets the positive
    /// TLEN; read 1 does when both start together.
    pub fn sync_mate_fields(&mut self) {
        let (Some(first), Some(second)) = (self.first.as_mut(), self.second.as_mut()) else {
            return;
        };
        first.mate_pos = Some(second.pos);
        second.mate_pos = Some(first.pos);
        if first.ref_name != second.ref_name {
            return;
        }

        let start = i64::from(first.pos.min(second.pos));
        let end = i64::from(first.end().max(second.end()));
        let tlen = i32::try_from(end - start + 1).unwrap_or(i32::MAX);
        if first.pos <= second.pos {
            first.template_len = tlen;
            second.template_len = -tlen;
        } else {
            first.template_len = -tlen;
            second.template_len = tlen;
        }
    }

    pub fn into_records(self) -> impl Iterator<Item = AlignmentRecord> {
        self.first.into_iter().chain(self.second)
    }
}

fn assign_pair_order(a: AlignmentRecord, b: AlignmentRecord) -> (AlignmentRecord, AlignmentRecord) {
    if b.is_first_of_pair() && !a.is_first_of_pair() { (b, a) } else { (a, b) }
}

/// Adjacent records are mates when exactly one is read 1 and both report the
/// same non-zero |TLEN|.
pub fn are_mates(a: &AlignmentRecord, b: &AlignmentRecord) -> bool {
    let tlen = a.template_len.unsigned_abs();
    a.is_first_of_pair() != b.is_first_of_pair()
        && tlen != 0
        && tlen == b.template_len.unsigned_abs()
}

/// Group one read's records into pairs, assuming the aligner wrote mates
/// next to each other. Unmatched records become single-mate pairs, or are
/// dropped under `no_mix`.
pub fn reconcile_pairs(
    records: Vec<AlignmentRecord>,
    no_mix: bool,
) -> Result<Vec<AlignmentPair>, RescoreError> {
    if let Some(r) = records.iter().find(|r| !r.is_paired()) {
        return Err(RescoreError::NotPaired { read: r.name.clone() });
    }

    let mut pairs = Vec::with_capacity(records.len() / 2 + 1);
    let mut iter = records.into_iter().peekable();
    while let Some(record) = iter.next() {
        if let Some(mate) = iter.next_if(|next| are_mates(&record, next)) {
            pairs.push(AlignmentPair::both(record, mate));
        } else if !no_mix {
            pairs.push(AlignmentPair::single(record));
        } else {
            tracing::trace!(read = %record.name, "dropping unpaired mate under no-mix");
        }
    }
    Ok(pairs)
}
