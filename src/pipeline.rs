use crate::bam_input;
use crate::config::ScoringConfig;
use crate::error::RescoreError;
use crate::fragment::{FragmentLengthModel, estimate_fragment_model};
use crate::grouping::{ReadGroup, ReadGroups};
use crate::likelihood::best_hypothesis;
use crate::pairing::reconcile_pairs;
use crate::progress::{Counters, StatusReporter};
use crate::realign::{RealignScores, realign_1d, restrict_to_clip_mode};
use crate::record::AlignmentRecord;
use crate::rewrite::apply_region;
use crate::scoring::score_group;
use crate::status::{CellStatus, InsertRegion, StatusTrack, build_status_track};
use crate::variants::VariantSource;
use anyhow::Result;
use noodles::bam;
use noodles::sam::alignment::io::Write as _;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    pub total_records: u64,
    pub unmapped_records: u64,
    pub degenerate_records: u64,
    pub realigned_records: u64,
    pub variant_explained: u64,
    pub read_groups: u64,
    pub ambiguous_groups: u64,
    pub emitted_records: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Unmapped,
    /// Zero-length read or zero-length alignment.
    Empty,
    /// The realigner found nothing worth keeping.
    Degenerate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preparation {
    Ready,
    Skipped(SkipReason),
}

/// Validate, optionally realign, annotate and score one record in place.
pub fn prepare_record(
    record: &mut AlignmentRecord,
    config: &ScoringConfig,
    variants: Option<&dyn VariantSource>,
) -> Result<Preparation, RescoreError> {
    if record.is_unmapped() {
        return Ok(Preparation::Skipped(SkipReason::Unmapped));
    }
    if record.read_len == 0 || record.cigar.alignment_len() == 0 {
        return Ok(Preparation::Skipped(SkipReason::Empty));
    }
    let cigar_query_len = record.cigar.query_len();
    if cigar_query_len != record.read_len {
        return Err(RescoreError::ReadLengthMismatch {
            read: record.name.clone(),
            cigar_query_len,
            read_len: record.read_len,
        });
    }

    let mut track = build_status_track(record)?;
    let mut region = track.cigar_region();
    if region.is_empty() {
        return Ok(Preparation::Skipped(SkipReason::Degenerate));
    }

    if config.realign {
        let dp = realign_1d(&track, &RealignScores::from(config));
        let dp = restrict_to_clip_mode(dp, region, config.clip_mode, record.is_reverse());
        if dp.is_empty() {
            return Ok(Preparation::Skipped(SkipReason::Degenerate));
        }
        if apply_region(record, &track, region, dp)? {
            record.annotations.realigned = true;
            track = build_status_track(record)?;
            region = track.cigar_region();
        }
    }

    annotate(record, &track, region, config);

    let hypothesis = best_hypothesis(record, &track, config, variants);
    record.annotations.log_likelihood = hypothesis.log10_likelihood;
    record.annotations.known_variant = hypothesis.variant;
    Ok(Preparation::Ready)
}

/// Fill the alignment-quality annotations from the status track.
pub fn annotate(
    record: &mut AlignmentRecord,
    track: &StatusTrack,
    region: InsertRegion,
    config: &ScoringConfig,
) {
    let cells = &track.cells[region.from..region.to];
    let count = |s: CellStatus| cells.iter().filter(|&&c| c == s).count() as u32;
    let (matches, mismatches) = (count(CellStatus::Match), count(CellStatus::Mismatch));
    let (inserted, deleted) = (count(CellStatus::Insertion), count(CellStatus::Deletion));
    let aligned = matches + mismatches + inserted + deleted;
    let query_in_region = cells.iter().filter(|c| c.consumes_query()).count() as u32;

    let a = &mut record.annotations;
    a.aln_len = record.cigar.alignment_len();
    a.insert_len = region.len() as u32;
    a.insert_from = region.from as u32;
    a.identity = if aligned == 0 { 0.0 } else { f64::from(matches) / f64::from(aligned) };
    a.align_rate = if record.read_len == 0 {
        0.0
    } else {
        f64::from(query_in_region) / f64::from(record.read_len)
    };
    a.mismatches = mismatches;
    a.indels = gap_runs(cells, |_| true);
    a.edit_distance = mismatches + inserted + deleted;

    let (seed_mismatches, seed_indels) = seed_counts(record, track, region, config.seed_length);
    record.annotations.seed_mismatches = seed_mismatches;
    record.annotations.seed_indels = seed_indels;
}

/// Number of insertion/deletion runs whose first cell satisfies `keep`.
fn gap_runs(cells: &[CellStatus], keep: impl Fn(usize) -> bool) -> u32 {
    let mut runs = 0;
    let mut prev: Option<CellStatus> = None;
    for (i, &c) in cells.iter().enumerate() {
        if c.is_gap() && prev != Some(c) && keep(i) {
            runs += 1;
        }
        prev = Some(c);
    }
    runs
}

/// Mismatches and indel runs within the first `seed_length` bases of the read,
/// counted from its 5' end.
fn seed_counts(
    record: &AlignmentRecord,
    track: &StatusTrack,
    region: InsertRegion,
    seed_length: u32,
) -> (u32, u32) {
    let lead = record.cigar.leading_hard_clip() as usize;
    let full_len = lead + record.read_len as usize + record.cigar.trailing_hard_clip() as usize;
    let seed = seed_length as usize;
    let reverse = record.is_reverse();

    // read-coordinate offset (from the 5' end) of every cell; deletions take
    // the offset of the next query base
    let mut q = lead;
    let offsets: Vec<usize> = track
        .cells
        .iter()
        .map(|c| {
            let at = q;
            if c.consumes_query() {
                q += 1;
            }
            if reverse { full_len.saturating_sub(at + 1) } else { at }
        })
        .collect();
    let in_seed = |i: usize| offsets[i] < seed;

    let mismatches = (region.from..region.to)
        .filter(|&i| track.cells[i] == CellStatus::Mismatch && in_seed(i))
        .count() as u32;
    let cells = &track.cells[region.from..region.to];
    let indels = gap_runs(cells, |i| in_seed(region.from + i));
    (mismatches, indels)
}

/// Score one read group. Returns the records to emit and whether the group
/// was discarded for an over-full best stratum.
pub fn score_read_group(
    records: Vec<AlignmentRecord>,
    config: &ScoringConfig,
    fragment: Option<&FragmentLengthModel>,
) -> Result<(Vec<AlignmentRecord>, bool), RescoreError> {
    if config.paired {
        let pairs = reconcile_pairs(records, config.no_mix)?;
        let outcome = score_group(pairs, config, fragment);
        let emitted = outcome
            .emitted
            .into_iter()
            .flat_map(|mut pair| {
                pair.sync_mate_fields();
                pair.into_records()
            })
            .collect();
        Ok((emitted, outcome.ambiguous))
    } else {
        let outcome = score_group(records, config, fragment);
        Ok((outcome.emitted, outcome.ambiguous))
    }
}

fn process_group(
    group: ReadGroup,
    config: &ScoringConfig,
    fragment: Option<&FragmentLengthModel>,
    variants: Option<&dyn VariantSource>,
    stats: &mut Stats,
) -> Result<Vec<AlignmentRecord>> {
    let mut kept = Vec::with_capacity(group.records.len());
    for mut record in group.records {
        match prepare_record(&mut record, config, variants)? {
            Preparation::Ready => {
                if record.annotations.realigned {
                    stats.realigned_records += 1;
                }
                if record.annotations.known_variant.is_some() {
                    stats.variant_explained += 1;
                }
                kept.push(record);
            }
            Preparation::Skipped(SkipReason::Unmapped) => stats.unmapped_records += 1,
            Preparation::Skipped(reason) => {
                tracing::debug!(read = %record.name, ?reason, "skipping record");
                stats.degenerate_records += 1;
            }
        }
    }
    if kept.is_empty() {
        return Ok(kept);
    }

    let (emitted, ambiguous) = score_read_group(kept, config, fragment)?;
    if ambiguous {
        stats.ambiguous_groups += 1;
    }
    Ok(emitted)
}

/// Drive the whole scoring core over a name-grouped record stream, handing
/// every emitted record to `sink`.
pub fn process_records<I, F>(
    records: I,
    config: &ScoringConfig,
    fragment: Option<&FragmentLengthModel>,
    variants: Option<&dyn VariantSource>,
    counters: Option<&Counters>,
    mut sink: F,
) -> Result<Stats>
where
    I: IntoIterator<Item = Result<AlignmentRecord>>,
    F: FnMut(AlignmentRecord) -> Result<()>,
{
    let mut stats = Stats::default();
    for result in ReadGroups::new(records.into_iter()) {
        let group = result?;
        let n = group.records.len() as u64;
        stats.total_records += n;
        stats.read_groups += 1;

        let emitted = process_group(group, config, fragment, variants, &mut stats)?;
        let emitted_count = emitted.len() as u64;
        for record in emitted {
            sink(record)?;
        }
        stats.emitted_records += emitted_count;
        if let Some(c) = counters {
            c.add_records(n);
            c.add_group(emitted_count);
        }
    }
    Ok(stats)
}

/// Fragment-length model for the run, or `None` when the density term is off.
pub fn fragment_model(input: &Path, config: &ScoringConfig) -> Result<Option<FragmentLengthModel>> {
    let frag = &config.fragment;
    if !config.paired || frag.disabled {
        return Ok(None);
    }
    if let (Some(mean), Some(sd)) = (frag.mean, frag.sd) {
        tracing::info!(mean, sd, "using supplied fragment-length distribution");
        return Ok(Some(FragmentLengthModel::new(mean, sd)));
    }
    let (_, records) = bam_input::open_bam(input)?;
    estimate_fragment_model(records, frag).map(Some)
}

pub fn run(
    input: &Path,
    output: &Path,
    config: &ScoringConfig,
    variants: Option<&dyn VariantSource>,
) -> Result<Stats> {
    let fragment = fragment_model(input, config)?;

    let (header, records) = bam_input::open_bam(input)?;
    let out_header = bam_input::with_sort_order(&header, config.sort_order);
    let mut writer = bam::io::Writer::new(File::create(output)?);
    writer.write_header(&out_header)?;

    let counters = Arc::new(Counters::default());
    let reporter = StatusReporter::spawn(Arc::clone(&counters), PROGRESS_INTERVAL);

    let result = process_records(
        records,
        config,
        fragment.as_ref(),
        variants,
        Some(&counters),
        |record| {
            let buf = bam_input::to_record_buf(record, config.invalid_mapq)?;
            writer.write_alignment_record(&out_header, &buf)?;
            Ok(())
        },
    );
    reporter.stop();
    let stats = result?;

    writer.try_finish()?;
    Ok(stats)
}
