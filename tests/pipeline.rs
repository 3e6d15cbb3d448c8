use noodles::core::Position;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::io::Write as _;
use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record::cigar::{Op, op::Kind};
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::data::field::Value;
use noodles::sam::alignment::record_buf::{Cigar as SamCigar, QualityScores, Sequence};
use noodles::sam::header::record::value::{Map, map::ReferenceSequence};
use noodles::{bam, sam};
use rescore_rs::pipeline::{self, Preparation, SkipReason, process_records};
use rescore_rs::{
    AlignmentRecord, CANDIDATE_COUNT, FragmentLengthModel, POSTERIOR, RescoreError, ScoringConfig, SortOrder,
    Stats,
};
use std::fs::File;
use std::num::NonZeroUsize;

fn aligned(name: &str, pos: u32, cigar: &str, md: &str) -> AlignmentRecord {
    let mut rec = AlignmentRecord::new(name, "chr1", pos, cigar.parse().expect("valid CIGAR"));
    rec.md = Some(md.to_string());
    rec.sequence = vec![b'A'; rec.read_len as usize];
    rec.qualities = Some(vec![30; rec.read_len as usize]);
    rec
}

fn run_in_memory(
    records: Vec<AlignmentRecord>,
    config: &ScoringConfig,
    fragment: Option<&FragmentLengthModel>,
) -> (anyhow::Result<Stats>, Vec<AlignmentRecord>) {
    let mut out = Vec::new();
    let stats = process_records(records.into_iter().map(Ok), config, fragment, None, None, |r| {
        out.push(r);
        Ok(())
    });
    (stats, out)
}

#[test]
fn malformed_record_is_fatal_before_output() {
    let records = vec![aligned("a", 1, "50M", "50"), aligned("b", 1, "50M", "48")];
    let (result, out) = run_in_memory(records, &ScoringConfig::default(), None);

    let err = result.expect_err("CIGAR/MD mismatch must abort");
    assert!(matches!(
        err.downcast_ref::<RescoreError>(),
        Some(RescoreError::CigarMdMismatch { cigar_ref_len: 50, md_ref_len: 48, .. })
    ));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].name, "a");
}

#[test]
fn read_length_mismatch_is_fatal() {
    let mut rec = aligned("a", 1, "50M", "50");
    rec.read_len = 60;
    let err = pipeline::prepare_record(&mut rec, &ScoringConfig::default(), None)
        .expect_err("length mismatch");
    assert!(matches!(err, RescoreError::ReadLengthMismatch { cigar_query_len: 50, read_len: 60, .. }));
}

#[test]
fn degenerate_records_are_skipped_and_counted() {
    let mut unmapped = aligned("u", 1, "20M", "20");
    unmapped.flags = Flags::UNMAPPED;
    let mut empty = AlignmentRecord::new("e", "chr1", 1, Default::default());
    empty.read_len = 0;

    assert_eq!(
        pipeline::prepare_record(&mut unmapped.clone(), &ScoringConfig::default(), None),
        Ok(Preparation::Skipped(SkipReason::Unmapped))
    );

    let (stats, out) = run_in_memory(vec![unmapped, empty], &ScoringConfig::default(), None);
    let stats = stats.expect("recoverable skips");
    assert!(out.is_empty());
    assert_eq!(stats.total_records, 2);
    assert_eq!(stats.unmapped_records, 1);
    assert_eq!(stats.degenerate_records, 1);
    assert_eq!(stats.read_groups, 2);
}

#[test]
fn realignment_rewrites_and_annotates() {
    let config = ScoringConfig { realign: true, seed_length: 5, ..Default::default() };
    let mut rec = aligned("r", 100, "12M", "0A0C10");
    assert_eq!(pipeline::prepare_record(&mut rec, &config, None), Ok(Preparation::Ready));

    assert!(rec.annotations.realigned);
    assert_eq!(rec.cigar.to_string(), "2S10M");
    assert_eq!(rec.md.as_deref(), Some("10"));
    assert_eq!(rec.pos, 102);
    let a = &rec.annotations;
    assert_eq!((a.insert_from, a.insert_len), (2, 10));
    assert_eq!(a.mismatches, 0);
    assert_eq!(a.seed_mismatches, 0);
    assert!((a.align_rate - 10.0 / 12.0).abs() < 1e-12);
}

#[test]
fn annotations_count_runs_and_seed_hits() {
    let config = ScoringConfig { seed_length: 10, ..Default::default() };
    // mismatch at read offset 3, 2-base deletion after offset 6, mismatch at offset 15
    let mut rec = aligned("r", 100, "6M2D14M", "3G2^TT9C4");
    pipeline::prepare_record(&mut rec, &config, None).expect("consistent");
    let a = &rec.annotations;
    assert_eq!(a.mismatches, 2);
    assert_eq!(a.indels, 1);
    assert_eq!(a.edit_distance, 4);
    assert_eq!(a.seed_mismatches, 1);
    assert_eq!(a.seed_indels, 1);
    assert!((a.identity - 18.0 / 22.0).abs() < 1e-12);

    // on the reverse strand the seed starts at the other end
    let mut rev = aligned("r", 100, "6M2D14M", "3G2^TT9C4");
    rev.flags = Flags::REVERSE_COMPLEMENTED;
    pipeline::prepare_record(&mut rev, &config, None).expect("consistent");
    assert_eq!(rev.annotations.seed_mismatches, 1);
    assert_eq!(rev.annotations.seed_indels, 0);
}

#[test]
fn paired_groups_emit_both_mates() {
    let config = ScoringConfig { paired: true, ..Default::default() };
    let model = FragmentLengthModel::new(300.0, 30.0);
    let mate = |first: bool, pos: u32, tlen: i32| {
        let mut rec = aligned("frag", pos, "50M", "50");
        rec.flags = Flags::SEGMENTED | if first { Flags::FIRST_SEGMENT } else { Flags::LAST_SEGMENT };
        rec.template_len = tlen;
        rec
    };
    let records = vec![
        mate(true, 1000, 300),
        mate(false, 1250, -300),
        mate(true, 9000, 700),
        mate(false, 9650, -700),
    ];

    let (stats, out) = run_in_memory(records, &config, Some(&model));
    let stats = stats.expect("paired run");
    assert_eq!(stats.read_groups, 1);
    assert_eq!(out.len(), 2);
    assert!(out.iter().all(|r| r.template_len.unsigned_abs() == 300));
    assert!(out.iter().all(|r| !r.is_secondary()));
}

#[test]
fn paired_mode_rejects_single_end_input() {
    let config = ScoringConfig { paired: true, ..Default::default() };
    let (result, _) = run_in_memory(vec![aligned("r", 1, "20M", "20")], &config, None);
    let err = result.expect_err("not paired");
    assert!(matches!(err.downcast_ref::<RescoreError>(), Some(RescoreError::NotPaired { .. })));
}

fn bam_record(name: &str, flags: Flags, pos: Option<usize>, md: Option<&str>) -> RecordBuf {
    let mut builder = RecordBuf::builder()
        .set_name(bstr::BString::from(name))
        .set_flags(flags)
        .set_sequence(Sequence::from(vec![b'A'; 100]))
        .set_quality_scores(QualityScores::from(vec![30; 100]));
    if let Some(pos) = pos {
        builder = builder
            .set_reference_sequence_id(0)
            .set_alignment_start(Position::try_from(pos).expect("non-zero"))
            .set_cigar(SamCigar::from(vec![Op::new(Kind::Match, 100)]));
    }
    let mut rec = builder.build();
    if let Some(md) = md {
        rec.data_mut().insert(Tag::MISMATCHED_POSITIONS, Value::from(md));
    }
    rec
}

#[test]
fn bam_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("in.bam");
    let output = dir.path().join("out.bam");

    let header = sam::Header::builder()
        .add_reference_sequence(
            "chr1",
            Map::<ReferenceSequence>::new(NonZeroUsize::try_from(100_000)?),
        )
        .build();
    let records = [
        bam_record("r1", Flags::empty(), Some(1000), Some("100")),
        bam_record("r1", Flags::SECONDARY, Some(5000), Some("10A10C10G67")),
        bam_record("r2", Flags::UNMAPPED, None, None),
    ];
    {
        let mut writer = bam::io::Writer::new(File::create(&input)?);
        writer.write_header(&header)?;
        for rec in &records {
            writer.write_alignment_record(&header, rec)?;
        }
        writer.try_finish()?;
    }

    let config = ScoringConfig { sort_order: SortOrder::QueryName, ..Default::default() };
    let stats = pipeline::run(&input, &output, &config, None)?;
    assert_eq!(stats.total_records, 3);
    assert_eq!(stats.unmapped_records, 1);
    assert_eq!(stats.read_groups, 2);
    assert_eq!(stats.emitted_records, 1);

    let mut reader = bam::io::reader::Builder.build_from_path(&output)?;
    let out_header = reader.read_header()?;
    let so = out_header
        .header()
        .and_then(|hd| hd.other_fields().get(&sam::header::record::value::map::header::tag::SORT_ORDER));
    assert!(so.is_some_and(|v| v == "queryname"));

    let out: Vec<RecordBuf> = reader.record_bufs(&out_header).collect::<Result<_, _>>()?;
    assert_eq!(out.len(), 1);
    let best = &out[0];
    assert_eq!(best.alignment_start().map(|p| p.get()), Some(1000));
    assert!(!best.flags().is_secondary());
    assert_eq!(best.mapping_quality().map(|q| q.get()), Some(60));

    let data = best.data();
    assert_eq!(data.get(&Tag::ALIGNMENT_HIT_COUNT).and_then(Value::as_int), Some(1));
    assert_eq!(data.get(&CANDIDATE_COUNT).and_then(Value::as_int), Some(2));
    assert_eq!(data.get(&Tag::EDIT_DISTANCE).and_then(Value::as_int), Some(0));
    assert!(matches!(data.get(&POSTERIOR), Some(Value::Float(p)) if *p > 0.99));
    Ok(())
}

#[test]
fn realigned_mates_get_fresh_pnext_and_tlen() {
    let config = ScoringConfig { paired: true, realign: true, ..Default::default() };
    let model = FragmentLengthModel::new(300.0, 30.0);
    let mut first = aligned("frag", 1000, "50M", "0A0C48");
    first.flags = Flags::SEGMENTED | Flags::FIRST_SEGMENT;
    first.mate_pos = Some(1250);
    first.template_len = 300;
    let mut second = aligned("frag", 1250, "50M", "50");
    second.flags = Flags::SEGMENTED | Flags::LAST_SEGMENT | Flags::REVERSE_COMPLEMENTED;
    second.mate_pos = Some(1000);
    second.template_len = -300;

    let (stats, out) = run_in_memory(vec![first, second], &config, Some(&model));
    assert_eq!(stats.expect("paired run").realigned_records, 1);
    assert_eq!(out.len(), 2);

    let (r1, r2) = (&out[0], &out[1]);
    assert_eq!(r1.pos, 1002);
    assert_eq!(r2.mate_pos, Some(1002));
    assert_eq!(r1.mate_pos, Some(1250));
    // 1002..=1299
    assert_eq!(r1.template_len, 298);
    assert_eq!(r2.template_len, -298);
}
