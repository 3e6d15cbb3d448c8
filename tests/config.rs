use rescore_rs::{ClipMode, RescoreError, ScoringConfig};

#[test]
fn defaults_validate() {
    let cfg = ScoringConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.max_mapq, 60, "max_mapq");
    assert_eq!(cfg.unique_mapq, 70, "unique_mapq");
    assert_eq!(cfg.invalid_mapq, 255, "invalid_mapq");
    assert_eq!(cfg.max_report, 1, "max_report");
    assert_eq!(cfg.fragment.min_samples, 100, "fragment.min_samples");
}

fn rejected(cfg: ScoringConfig) -> bool {
    matches!(cfg.validate(), Err(RescoreError::InvalidConfig(_)))
}

#[test]
fn out_of_range_values_are_rejected() {
    assert!(rejected(ScoringConfig { seed_length: 0, ..Default::default() }));
    assert!(rejected(ScoringConfig { match_score: 0, ..Default::default() }));
    assert!(rejected(ScoringConfig { mismatch_score: 1, ..Default::default() }));
    assert!(rejected(ScoringConfig { gap_extend: 0, ..Default::default() }));
    assert!(rejected(ScoringConfig { clip_penalty: -1, ..Default::default() }));
    assert!(rejected(ScoringConfig { min_identity: 1.5, ..Default::default() }));
    assert!(rejected(ScoringConfig { min_align_rate: -0.1, ..Default::default() }));
    assert!(rejected(ScoringConfig { max_report: 0, ..Default::default() }));
    assert!(rejected(ScoringConfig { max_mismatch_pct: Some(2.0), ..Default::default() }));
}

#[test]
fn fragment_overrides_must_come_together() {
    let mut cfg = ScoringConfig::default();
    cfg.fragment.mean = Some(300.0);
    assert!(rejected(cfg.clone()));
    cfg.fragment.sd = Some(30.0);
    assert!(cfg.validate().is_ok());

    cfg.fragment.min_len = 2000;
    assert!(rejected(cfg));
}

#[test]
fn clip_mode_flanks_follow_strand() {
    assert!(ClipMode::UseAll.left_flank(false) && ClipMode::UseAll.right_flank(true));
    assert!(!ClipMode::Ignore.left_flank(false) && !ClipMode::Ignore.right_flank(false));

    // 5' end is on the left for forward reads and on the right for reverse reads
    assert!(ClipMode::FivePrime.left_flank(false));
    assert!(!ClipMode::FivePrime.right_flank(false));
    assert!(ClipMode::FivePrime.right_flank(true));
    assert!(!ClipMode::FivePrime.left_flank(true));

    assert!(ClipMode::ThreePrime.right_flank(false));
    assert!(ClipMode::ThreePrime.left_flank(true));
}
