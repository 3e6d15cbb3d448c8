use rescore_rs::realign::{RealignScores, realign_1d, restrict_to_clip_mode};
use rescore_rs::status::build_status_track;
use rescore_rs::{AlignmentRecord, CellStatus, ClipMode, InsertRegion, ScoringConfig, StatusTrack};

fn scores() -> RealignScores {
    RealignScores::from(&ScoringConfig::default())
}

fn track(cigar: &str, md: &str) -> StatusTrack {
    let mut rec = AlignmentRecord::new("r1", "chr1", 1, cigar.parse().expect("valid CIGAR"));
    rec.md = Some(md.to_string());
    build_status_track(&rec).expect("consistent record")
}

#[test]
fn clean_alignment_keeps_whole_region() {
    let t = track("10M", "10");
    assert_eq!(realign_1d(&t, &scores()), InsertRegion { from: 0, to: 10 });
}

#[test]
fn leading_mismatches_are_trimmed() {
    let t = track("10M", "0A0C8");
    assert_eq!(realign_1d(&t, &scores()), InsertRegion { from: 2, to: 10 });
}

#[test]
fn trailing_gap_is_trimmed() {
    // 8 matches, then a 2-base insertion and a single match
    let t = track("8M2I1M", "9");
    assert_eq!(realign_1d(&t, &scores()), InsertRegion { from: 0, to: 8 });
}

#[test]
fn first_maximum_wins_on_ties() {
    // two 2-match blocks separated by mismatches that reset the score
    let t = track("7M", "2A0C0G2");
    let region = realign_1d(&t, &scores());
    assert_eq!(region, InsertRegion { from: 0, to: 2 });
}

#[test]
fn all_mismatch_track_gives_empty_region() {
    let t = StatusTrack { cells: vec![CellStatus::Mismatch; 5] };
    assert!(realign_1d(&t, &scores()).is_empty());
}

#[test]
fn realigner_is_idempotent() {
    for (cigar, md) in [("10M", "0A0C8"), ("8M2I1M", "9"), ("4M1D6M", "1T2^G6"), ("2S8M", "3A4")] {
        let t = track(cigar, md);
        let first = realign_1d(&t, &scores());
        let second = realign_1d(&t, &scores());
        assert_eq!(first, second, "{cigar} {md}");
    }
}

#[test]
fn clip_mode_pins_disallowed_flanks() {
    let dp = InsertRegion { from: 2, to: 8 };
    let cigar = InsertRegion { from: 0, to: 10 };

    assert_eq!(restrict_to_clip_mode(dp, cigar, ClipMode::UseAll, false), dp);
    assert_eq!(restrict_to_clip_mode(dp, cigar, ClipMode::Ignore, false), cigar);
    assert_eq!(
        restrict_to_clip_mode(dp, cigar, ClipMode::FivePrime, false),
        InsertRegion { from: 2, to: 10 }
    );
    assert_eq!(
        restrict_to_clip_mode(dp, cigar, ClipMode::FivePrime, true),
        InsertRegion { from: 0, to: 8 }
    );
    assert_eq!(
        restrict_to_clip_mode(dp, cigar, ClipMode::ThreePrime, false),
        InsertRegion { from: 0, to: 8 }
    );
}
