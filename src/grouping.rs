//! Split a name-grouped record stream into read groups.

use crate::record::AlignmentRecord;

/// All candidate alignments of one read (or read pair), in input order.
#[derive(Debug, Clone)]
pub struct ReadGroup {
    pub name: String,
    pub records: Vec<AlignmentRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupState {
    Accumulating,
    Flushing,
    Done,
}

/// Iterator adapter yielding one [`ReadGroup`] per run of equal read names.
///
/// A group is flushed when the name changes or the input ends. The first
/// record of the next group is held back until the flushed group has been
/// handed out. An input error ends iteration after being reported.
pub struct ReadGroups<I> {
    inner: I,
    state: GroupState,
    pending: Vec<AlignmentRecord>,
    carry: Option<AlignmentRecord>,
}

impl<I> ReadGroups<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            state: GroupState::Accumulating,
            pending: Vec::new(),
            carry: None,
        }
    }
}

impl<I, E> Iterator for ReadGroups<I>
where
    I: Iterator<Item = Result<AlignmentRecord, E>>,
{
    type Item = Result<ReadGroup, E>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                GroupState::Done => return None,
                GroupState::Accumulating => match self.inner.next() {
                    None => {
                        self.state = if self.pending.is_empty() {
                            GroupState::Done
                        } else {
                            GroupState::Flushing
                        };
                    }
                    Some(Err(e)) => {
                        self.state = GroupState::Done;
                        self.pending.clear();
                        return Some(Err(e));
                    }
                    Some(Ok(record)) => {
                        if let Some(current) = self.pending.first()
                            && current.name != record.name
                        {
                            self.carry = Some(record);
                            self.state = GroupState::Flushing;
                        } else {
                            self.pending.push(record);
                        }
                    }
                },
                GroupState::Flushing => {
                    let records = std::mem::take(&mut self.pending);
                    match self.carry.take() {
                        Some(next) => {
                            self.pending.push(next);
                            self.state = GroupState::Accumulating;
                        }
                        None => self.state = GroupState::Done,
                    }
                    let name = records.first().map(|r| r.name.clone()).unwrap_or_default();
                    return Some(Ok(ReadGroup { name, records }));
                }
            }
        }
    }
}
