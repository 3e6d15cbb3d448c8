use approx::assert_relative_eq;
use noodles::sam::alignment::record::Flags;
use rescore_rs::pairing::{AlignmentPair, are_mates, reconcile_pairs};
use rescore_rs::{AlignmentRecord, Candidate, FragmentLengthModel, RescoreError, ScoringConfig, score_group};

fn mate(first: bool, tlen: i32) -> AlignmentRecord {
    let mut rec = AlignmentRecord::new("frag", "chr1", 100, "50M".parse().expect("valid CIGAR"));
    rec.flags = Flags::SEGMENTED | if first { Flags::FIRST_SEGMENT } else { Flags::LAST_SEGMENT };
    rec.template_len = tlen;
    rec.annotations.insert_len = 50;
    rec.annotations.log_likelihood = -1.0;
    rec.annotations.identity = 1.0;
    rec.annotations.align_rate = 1.0;
    rec
}

#[test]
fn adjacent_mates_pair_up() {
    let pairs = reconcile_pairs(vec![mate(true, 300), mate(false, -300)], false).expect("paired");
    assert_eq!(pairs.len(), 1);
    assert!(pairs[0].is_complete());
    assert_eq!(pairs[0].template_len(), Some(300));
}

#[test]
fn read_two_first_is_reordered() {
    let pairs = reconcile_pairs(vec![mate(false, -250), mate(true, 250)], false).expect("paired");
    let pair = &pairs[0];
    assert!(pair.first.as_ref().is_some_and(AlignmentRecord::is_first_of_pair));
    assert!(pair.second.as_ref().is_some_and(|r| !r.is_first_of_pair()));
}

#[test]
fn mismatched_template_lengths_do_not_pair() {
    assert!(!are_mates(&mate(true, 300), &mate(false, -310)));
    assert!(!are_mates(&mate(true, 300), &mate(true, -300)));
    assert!(!are_mates(&mate(true, 0), &mate(false, 0)));

    let pairs = reconcile_pairs(vec![mate(true, 300), mate(false, -310)], false).expect("paired");
    assert_eq!(pairs.len(), 2);
    assert!(pairs.iter().all(|p| !p.is_complete()));
}

#[test]
fn no_mix_drops_singletons() {
    let records = vec![mate(true, 300), mate(false, -300), mate(true, 500)];
    let pairs = reconcile_pairs(records, true).expect("paired");
    assert_eq!(pairs.len(), 1);
    assert!(pairs[0].is_complete());
}

#[test]
fn unpaired_record_is_fatal() {
    let mut single = mate(true, 0);
    single.flags = Flags::empty();
    match reconcile_pairs(vec![single], false) {
        Err(RescoreError::NotPaired { read }) => assert_eq!(read, "frag"),
        other => panic!("expected NotPaired, got {other:?}"),
    }
}

#[test]
fn pair_weight_includes_fragment_density_only_when_complete() {
    let model = FragmentLengthModel::new(300.0, 30.0);
    let both = AlignmentPair::both(mate(true, 300), mate(false, -300));
    let base = 100f64.log10() - 2.0;
    assert_relative_eq!(
        both.log10_weight(Some(&model)),
        base + model.log10_density(300.0),
        epsilon = 1e-9
    );

    let single = AlignmentPair::single(mate(true, 300));
    assert_relative_eq!(single.log10_weight(Some(&model)), 50f64.log10() - 1.0, epsilon = 1e-9);
}

#[test]
fn pair_weight_uses_combined_insert_length() {
    let sized = |first: bool| {
        let mut rec = mate(first, 300);
        rec.annotations.insert_len = 100;
        rec.annotations.log_likelihood = 0.0;
        rec
    };
    let both = AlignmentPair::both(sized(true), sized(false));
    assert_relative_eq!(both.log10_weight(None), 200f64.log10(), epsilon = 1e-12);

    let single = AlignmentPair::single(sized(true));
    assert_relative_eq!(single.log10_weight(None), 2.0, epsilon = 1e-12);
    assert_relative_eq!(single.log10_weight(None), sized(true).log10_weight(None), epsilon = 1e-12);
}

#[test]
fn fragment_density_prefers_typical_insert() {
    let cfg = ScoringConfig { max_report: 2, ..Default::default() };
    let model = FragmentLengthModel::new(300.0, 30.0);
    let typical = AlignmentPair::both(mate(true, 300), mate(false, -300));
    let odd = AlignmentPair::both(mate(true, 900), mate(false, -900));

    let outcome = score_group(vec![odd, typical], &cfg, Some(&model));
    assert_eq!(outcome.emitted.len(), 2);
    assert_eq!(outcome.emitted[0].template_len(), Some(300));
    assert!(outcome.emitted[0].records().all(|r| !r.is_secondary()));
    assert!(outcome.emitted[1].records().all(|r| r.is_secondary()));
}
