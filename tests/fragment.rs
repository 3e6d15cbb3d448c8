use approx::assert_abs_diff_eq;
use noodles::sam::alignment::record::Flags;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rescore_rs::fragment::{FragmentAccumulator, estimate_fragment_model};
use rescore_rs::{AlignmentRecord, FragmentConfig, FragmentLengthModel, RescoreError};

/// Box-Muller draw from N(mean, sd).
fn normal(rng: &mut SmallRng, mean: f64, sd: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    mean + sd * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn read_one(tlen: i32) -> AlignmentRecord {
    let mut rec = AlignmentRecord::new("frag", "chr1", 100, "50M".parse().expect("valid CIGAR"));
    rec.flags = Flags::SEGMENTED | Flags::FIRST_SEGMENT;
    rec.template_len = tlen;
    rec
}

#[test]
fn estimate_converges_to_the_generating_distribution() {
    let mut rng = SmallRng::seed_from_u64(17);
    let (mean, sd) = (300.0, 30.0);

    let mut errors = Vec::new();
    for n in [200usize, 20_000] {
        let mut acc = FragmentAccumulator::default();
        for _ in 0..n {
            acc.add(normal(&mut rng, mean, sd));
        }
        let model = acc.finish(100).expect("enough samples");
        errors.push(((model.mean - mean).abs(), (model.sd - sd).abs()));
    }

    let (mean_err, sd_err) = errors[1];
    assert!(mean_err < 1.5, "mean error {mean_err}");
    assert!(sd_err < 1.5, "sd error {sd_err}");
}

#[test]
fn sample_filter_and_cap() {
    let config = FragmentConfig { sample_cap: 150, min_samples: 10, ..Default::default() };
    let mut records = Vec::new();
    for i in 0..300 {
        records.push(read_one(250 + (i % 11)));
        // mate, secondary and out-of-range records never count
        let mut mate = read_one(-250);
        mate.flags = Flags::SEGMENTED | Flags::LAST_SEGMENT;
        records.push(mate);
        let mut secondary = read_one(250);
        secondary.flags.insert(Flags::SECONDARY);
        records.push(secondary);
        records.push(read_one(5000));
    }

    let mut acc = FragmentAccumulator::default();
    let mut counted = 0;
    for rec in &records {
        if acc.offer(rec, &config) {
            counted += 1;
        }
        if acc.is_full(&config) {
            break;
        }
    }
    assert_eq!(counted, 150);
    assert_eq!(acc.count, 150);

    let model = estimate_fragment_model(records.into_iter().map(Ok), &config).expect("estimate");
    assert!(model.mean >= 250.0 && model.mean <= 260.0);
}

#[test]
fn too_few_samples_is_fatal() {
    let config = FragmentConfig::default();
    let records = (0..20).map(|_| Ok(read_one(300)));
    let err = estimate_fragment_model(records, &config).expect_err("too few samples");
    match err.downcast_ref::<RescoreError>() {
        Some(RescoreError::InsufficientFragmentSamples { found, required }) => {
            assert_eq!(*found, 20);
            assert_eq!(*required, 100);
        }
        other => panic!("expected InsufficientFragmentSamples, got {other:?}"),
    }

    let mut acc = FragmentAccumulator::default();
    acc.add(300.0);
    assert!(acc.finish(0).is_err(), "a single sample has no spread");
}

#[test]
fn density_peaks_at_the_mean_and_floors_sd() {
    let model = FragmentLengthModel::new(300.0, 30.0);
    assert!(model.log10_density(300.0) > model.log10_density(360.0));
    assert_abs_diff_eq!(
        model.density(300.0),
        1.0 / (30.0 * (2.0 * std::f64::consts::PI).sqrt()),
        epsilon = 1e-12
    );

    let narrow = FragmentLengthModel::new(300.0, 0.01);
    let floored = FragmentLengthModel::new(300.0, 1.0);
    assert_abs_diff_eq!(narrow.log10_density(301.0), floored.log10_density(301.0), epsilon = 1e-12);
}
