//! BAM reading and writing around `AlignmentRecord`.
use crate::config::SortOrder;
use crate::record::{AlignmentRecord, Cigar, CigarOp};
use anyhow::{Context, Result, anyhow};
use noodles::core::Position;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::record::MappingQuality;
use noodles::sam::alignment::record::cigar::{Op as SamCigarOp, op::Kind as CigarKind};
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::Cigar as SamCigar;
use noodles::sam::alignment::record_buf::data::field::Value;
use noodles::{bam, sam};
use std::path::Path;

/// Tag for the number of candidates considered for the read.
pub const CANDIDATE_COUNT: Tag = Tag::new(b'Z', b'C');
pub const POSTERIOR: Tag = Tag::new(b'Z', b'P');
pub const LOG_LIKELIHOOD: Tag = Tag::new(b'Z', b'L');
pub const IDENTITY: Tag = Tag::new(b'Z', b'I');
pub const MISMATCH_COUNT: Tag = Tag::new(b'X', b'M');
pub const INDEL_COUNT: Tag = Tag::new(b'X', b'O');
pub const SEED_MISMATCHES: Tag = Tag::new(b'Z', b'S');
pub const KNOWN_VARIANT: Tag = Tag::new(b'Z', b'V');

/// Open a BAM file and stream its records as `AlignmentRecord`s.
pub fn open_bam(
    path: &Path,
) -> Result<(sam::Header, impl Iterator<Item = Result<AlignmentRecord>>)> {
    let mut reader = bam::io::reader::Builder
        .build_from_path(path)
        .with_context(|| format!("failed to open BAM {}", path.display()))?;
    let header = reader.read_header()?;
    let ref_names = reference_names(&header);

    let record_header = header.clone();
    let mut buf = RecordBuf::default();
    let records = std::iter::from_fn(move || {
        match reader.read_record_buf(&record_header, &mut buf) {
            Ok(0) => None,
            Ok(_) => Some(from_record_buf(std::mem::take(&mut buf), &ref_names)),
            Err(e) => Some(Err(anyhow!(e).context("failed to read BAM record"))),
        }
    });

    Ok((header, records))
}

fn reference_names(header: &sam::Header) -> Vec<String> {
    header
        .reference_sequences()
        .keys()
        .map(|name| name.to_string())
        .collect()
}

pub fn from_record_buf(buf: RecordBuf, ref_names: &[String]) -> Result<AlignmentRecord> {
    let name = buf.name().map(|n| n.to_string()).unwrap_or_default();
    let ref_name = buf
        .reference_sequence_id()
        .and_then(|id| ref_names.get(id))
        .cloned()
        .unwrap_or_default();
    let pos = match buf.alignment_start() {
        Some(p) => u32::try_from(p.get()).map_err(|_| anyhow!("alignment start out of range"))?,
        None => 0,
    };

    let mut cigar = Cigar::default();
    for op in buf.cigar().as_ref() {
        let len = u32::try_from(op.len()).map_err(|_| anyhow!("CIGAR op length out of range"))?;
        cigar.ops.push((len, kind_to_op(op.kind())));
    }
    if cigar.checked_total_len().is_none() {
        return Err(anyhow!("CIGAR length overflow"));
    }

    let sequence = buf.sequence().as_ref().to_vec();
    let qualities = Some(buf.quality_scores().as_ref().to_vec()).filter(|q| !q.is_empty());
    let md = match buf.data().get(&Tag::MISMATCHED_POSITIONS) {
        Some(Value::String(s)) => Some(s.to_string()),
        _ => None,
    };
    let read_len = if sequence.is_empty() { cigar.query_len() } else { sequence.len() as u32 };

    Ok(AlignmentRecord {
        name,
        ref_name,
        pos,
        flags: buf.flags(),
        mate_pos: buf.mate_alignment_start().and_then(|p| u32::try_from(p.get()).ok()),
        template_len: buf.template_length(),
        read_len,
        sequence,
        qualities,
        cigar,
        md,
        annotations: Default::default(),
        source: Some(buf),
    })
}

/// Build the output record: the input record with scores and rewritten
/// encodings applied.
pub fn to_record_buf(record: AlignmentRecord, invalid_mapq: u8) -> Result<RecordBuf> {
    let mut out = record.source.unwrap_or_default();
    let a = &record.annotations;

    *out.flags_mut() = record.flags;
    let start = Position::try_from(record.pos as usize)
        .map_err(|_| anyhow!("alignment start out of range: {}", record.pos))?;
    *out.alignment_start_mut() = Some(start);
    if record.mate_pos.is_some() {
        *out.mate_alignment_start_mut() = record.mate_pos.and_then(|p| Position::new(p as usize));
    }
    *out.template_length_mut() = record.template_len;

    let ops: Vec<SamCigarOp> = record
        .cigar
        .ops
        .iter()
        .map(|&(len, op)| SamCigarOp::new(op_to_kind(op), len as usize))
        .collect();
    *out.cigar_mut() = SamCigar::from(ops);

    *out.mapping_quality_mut() = match a.mapq {
        Some(q) if q != invalid_mapq => MappingQuality::new(q),
        _ => None,
    };

    let data = out.data_mut();
    if let Some(md) = record.md {
        data.insert(Tag::MISMATCHED_POSITIONS, Value::String(md.into()));
    }
    data.insert(Tag::EDIT_DISTANCE, Value::from(a.edit_distance as i32));
    data.insert(Tag::ALIGNMENT_HIT_COUNT, Value::from(a.reported as i32));
    data.insert(CANDIDATE_COUNT, Value::from(a.candidates as i32));
    data.insert(POSTERIOR, Value::Float(a.posterior as f32));
    data.insert(LOG_LIKELIHOOD, Value::Float(a.log_likelihood as f32));
    data.insert(IDENTITY, Value::Float(a.identity as f32));
    data.insert(MISMATCH_COUNT, Value::from(a.mismatches as i32));
    data.insert(INDEL_COUNT, Value::from(a.indels as i32));
    data.insert(SEED_MISMATCHES, Value::from(a.seed_mismatches as i32));
    match &a.known_variant {
        Some(id) => {
            data.insert(KNOWN_VARIANT, Value::String(id.clone().into()));
        }
        None => {
            data.remove(&KNOWN_VARIANT);
        }
    }

    Ok(out)
}

/// Copy of `header` whose `@HD SO` carries the requested sort order.
pub fn with_sort_order(header: &sam::Header, order: SortOrder) -> sam::Header {
    use sam::header::record::value::map::{self, Map};

    let mut header = header.clone();
    let mut hd = header
        .header()
        .cloned()
        .unwrap_or_else(|| Map::<map::Header>::new(map::header::Version::new(1, 6)));
    let value = match order {
        SortOrder::Unsorted => map::header::sort_order::UNSORTED,
        SortOrder::QueryName => map::header::sort_order::QUERY_NAME,
        SortOrder::Coordinate => map::header::sort_order::COORDINATE,
    };
    hd.other_fields_mut()
        .insert(map::header::tag::SORT_ORDER, value.into());
    *header.header_mut() = Some(hd);
    header
}

pub fn kind_to_op(kind: CigarKind) -> CigarOp {
    match kind {
        CigarKind::Match => CigarOp::Match,
        CigarKind::Insertion => CigarOp::Ins,
        CigarKind::Deletion => CigarOp::Del,
        CigarKind::Skip => CigarOp::RefSkip,
        CigarKind::SoftClip => CigarOp::SoftClip,
        CigarKind::HardClip => CigarOp::HardClip,
        CigarKind::Pad => CigarOp::Pad,
        CigarKind::SequenceMatch => CigarOp::Equal,
        CigarKind::SequenceMismatch => CigarOp::Diff,
    }
}

pub fn op_to_kind(op: CigarOp) -> CigarKind {
    match op {
        CigarOp::Match => CigarKind::Match,
        CigarOp::Ins => CigarKind::Insertion,
        CigarOp::Del => CigarKind::Deletion,
        CigarOp::RefSkip => CigarKind::Skip,
        CigarOp::SoftClip => CigarKind::SoftClip,
        CigarOp::HardClip => CigarKind::HardClip,
        CigarOp::Pad => CigarKind::Pad,
        CigarOp::Equal => CigarKind::SequenceMatch,
        CigarOp::Diff => CigarKind::SequenceMismatch,
    }
}
