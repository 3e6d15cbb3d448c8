//! Bayesian posterior and mapping quality for one read group.
//!
//! Every candidate (a single-end record or a read pair) gets an unnormalised
//! weight `insert_len * 10^loglik` (times the fragment-length density for
//! complete pairs). Weights are normalised across the group, optionally
//! deflated when the upstream aligner hit its search ceiling, converted to
//! Phred-scaled mapping qualities, then filtered, ranked and capped.

use crate::config::ScoringConfig;
use crate::fragment::FragmentLengthModel;
use crate::pairing::AlignmentPair;
use crate::record::AlignmentRecord;
use crate::types::MapQ;
use std::cmp::Ordering;

const STRATUM_TOLERANCE: f64 = 1e-12;

/// Something the scorer can rank: one record, or one pair of mates.
pub trait Candidate {
    /// Log10 of the unnormalised weight.
    fn log10_weight(&self, fragment: Option<&FragmentLengthModel>) -> f64;
    fn identity(&self) -> f64;
    fn align_rate(&self) -> f64;
    fn mismatch_fraction(&self) -> f64;
    fn indel_fraction(&self) -> f64;
    fn seed_mismatches(&self) -> u32;
    fn posterior(&self) -> f64;
    fn mapq(&self) -> Option<MapQ>;
    fn set_score(&mut self, posterior: f64, mapq: MapQ);
    fn set_report_counts(&mut self, reported: u32, candidates: u32);
    fn set_secondary(&mut self, secondary: bool);
}

fn log10_weight_of(insert_len: u32, log_likelihood: f64) -> f64 {
    if insert_len == 0 {
        return f64::NEG_INFINITY;
    }
    f64::from(insert_len).log10() + log_likelihood
}

fn fraction(count: u32, len: u32) -> f64 {
    if len == 0 { 1.0 } else { f64::from(count) / f64::from(len) }
}

impl Candidate for AlignmentRecord {
    fn log10_weight(&self, _fragment: Option<&FragmentLengthModel>) -> f64 {
        log10_weight_of(self.annotations.insert_len, self.annotations.log_likelihood)
    }

    fn identity(&self) -> f64 {
        self.annotations.identity
    }

    fn align_rate(&self) -> f64 {
        self.annotations.align_rate
    }

    fn mismatch_fraction(&self) -> f64 {
        fraction(self.annotations.mismatches, self.annotations.insert_len)
    }

    fn indel_fraction(&self) -> f64 {
        fraction(self.annotations.indels, self.annotations.insert_len)
    }

    fn seed_mismatches(&self) -> u32 {
        self.annotations.seed_mismatches
    }

    fn posterior(&self) -> f64 {
        self.annotations.posterior
    }

    fn mapq(&self) -> Option<MapQ> {
        self.annotations.mapq
    }

    fn set_score(&mut self, posterior: f64, mapq: MapQ) {
        self.annotations.posterior = posterior;
        self.annotations.mapq = Some(mapq);
    }

    fn set_report_counts(&mut self, reported: u32, candidates: u32) {
        self.annotations.reported = reported;
        self.annotations.candidates = candidates;
    }

    fn set_secondary(&mut self, secondary: bool) {
        AlignmentRecord::set_secondary(self, secondary);
    }
}

impl AlignmentPair {
    fn fold_mates<T>(&self, f: impl Fn(&AlignmentRecord) -> T, pick: impl Fn(T, T) -> T, empty: T) -> T {
        self.records().map(f).reduce(pick).unwrap_or(empty)
    }
}

impl Candidate for AlignmentPair {
    fn log10_weight(&self, fragment: Option<&FragmentLengthModel>) -> f64 {
        // one fragment: the mates' aligned lengths add, their likelihoods multiply
        let insert_len = self.records().map(|r| r.annotations.insert_len).sum();
        let loglik = self.records().map(|r| r.annotations.log_likelihood).sum();
        let mut w = log10_weight_of(insert_len, loglik);
        if let (Some(model), Some(tlen)) = (fragment, self.template_len()) {
            w += model.log10_density(f64::from(tlen));
        }
        w
    }

    fn identity(&self) -> f64 {
        self.fold_mates(|r| r.annotations.identity, f64::min, 0.0)
    }

    fn align_rate(&self) -> f64 {
        self.fold_mates(|r| r.annotations.align_rate, f64::min, 0.0)
    }

    fn mismatch_fraction(&self) -> f64 {
        self.fold_mates(|r| r.mismatch_fraction(), f64::max, 1.0)
    }

    fn indel_fraction(&self) -> f64 {
        self.fold_mates(|r| r.indel_fraction(), f64::max, 1.0)
    }

    fn seed_mismatches(&self) -> u32 {
        self.fold_mates(|r| r.annotations.seed_mismatches, u32::max, 0)
    }

    fn posterior(&self) -> f64 {
        self.fold_mates(|r| r.annotations.posterior, f64::max, f64::NAN)
    }

    fn mapq(&self) -> Option<MapQ> {
        self.records().find_map(|r| r.annotations.mapq)
    }

    fn set_score(&mut self, posterior: f64, mapq: MapQ) {
        for r in self.records_mut() {
            r.set_score(posterior, mapq);
        }
    }

    fn set_report_counts(&mut self, reported: u32, candidates: u32) {
        for r in self.records_mut() {
            r.set_report_counts(reported, candidates);
        }
    }

    fn set_secondary(&mut self, secondary: bool) {
        for r in self.records_mut() {
            r.set_secondary(secondary);
        }
    }
}

/// Outcome of scoring one read group.
#[derive(Debug)]
pub struct GroupOutcome<C> {
    pub emitted: Vec<C>,
    /// Candidates scored before any filter ran.
    pub candidates: usize,
    /// True when the group was dropped for an over-full best stratum.
    pub ambiguous: bool,
}

/// Phred mapping quality for posterior `p`, clamped to `max_mapq`.
/// `p == 1` saturates at the cap; NaN yields `invalid_mapq`.
pub fn mapq_from_posterior(p: f64, config: &ScoringConfig) -> MapQ {
    if p.is_nan() {
        return config.invalid_mapq;
    }
    let q = -10.0 * (1.0 - p.clamp(0.0, 1.0)).log10();
    if q.is_nan() {
        return config.invalid_mapq;
    }
    let q = q.round().max(0.0);
    if q >= f64::from(config.max_mapq) { config.max_mapq } else { q as MapQ }
}

/// Normalised posteriors for log10 weights. When `n` reached the hit ceiling
/// the result is deflated by `sqrt(max_hits)`; a degenerate sum gives NaN.
pub fn normalise_posteriors(log10_weights: &[f64], max_hits: usize) -> Vec<f64> {
    let max = log10_weights
        .iter()
        .copied()
        .filter(|w| w.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return vec![f64::NAN; log10_weights.len()];
    }

    let scaled: Vec<f64> = log10_weights.iter().map(|w| 10f64.powf(w - max)).collect();
    let sum: f64 = scaled.iter().sum();
    if !(sum.is_finite() && sum > 0.0) {
        return vec![f64::NAN; log10_weights.len()];
    }

    let deflate = if max_hits > 0 && log10_weights.len() >= max_hits {
        (max_hits as f64).sqrt()
    } else {
        1.0
    };
    scaled.into_iter().map(|s| s / sum / deflate).collect()
}

fn effective_mapq(mapq: Option<MapQ>, config: &ScoringConfig) -> MapQ {
    match mapq {
        Some(q) if q != config.invalid_mapq => q,
        _ => 0,
    }
}

fn rank_key(p: f64) -> f64 {
    if p.is_nan() { f64::NEG_INFINITY } else { p }
}

/// Score, filter, rank and cap the candidates of one read group.
pub fn score_group<C: Candidate>(
    mut cands: Vec<C>,
    config: &ScoringConfig,
    fragment: Option<&FragmentLengthModel>,
) -> GroupOutcome<C> {
    let n = cands.len();
    let mut outcome = GroupOutcome { emitted: Vec::new(), candidates: n, ambiguous: false };
    if n == 0 {
        return outcome;
    }

    if n == 1 && config.max_hits > 1 {
        cands[0].set_score(1.0, config.unique_mapq);
    } else {
        let weights: Vec<f64> = cands.iter().map(|c| c.log10_weight(fragment)).collect();
        let posteriors = normalise_posteriors(&weights, config.max_hits);
        for (c, p) in cands.iter_mut().zip(posteriors) {
            c.set_score(p, mapq_from_posterior(p, config));
        }
    }

    cands.retain(|c| c.identity() >= config.min_identity && c.align_rate() >= config.min_align_rate);
    cands.retain(|c| effective_mapq(c.mapq(), config) >= config.min_mapq);
    // stable: equal posteriors keep input order
    cands.sort_by(by_posterior_desc);

    if let Some(top) = cands.first().map(|c| rank_key(c.posterior())) {
        let tied = cands
            .iter()
            .take_while(|c| {
                let p = rank_key(c.posterior());
                p == top || (p - top).abs() <= STRATUM_TOLERANCE
            })
            .count();
        if config.max_best > 0 && tied > config.max_best {
            tracing::debug!(tied, max_best = config.max_best, "best stratum too crowded; dropping group");
            outcome.ambiguous = true;
            return outcome;
        }
    }

    if !config.max_sensitivity {
        cands.retain(|c| passes_auxiliary_filters(c, config));
    }

    cands.truncate(config.max_report);
    let reported = cands.len() as u32;
    for (i, c) in cands.iter_mut().enumerate() {
        c.set_report_counts(reported, n as u32);
        if config.mark_secondary {
            c.set_secondary(i > 0);
        }
    }

    outcome.emitted = cands;
    outcome
}

fn passes_auxiliary_filters<C: Candidate>(c: &C, config: &ScoringConfig) -> bool {
    let within = |limit: Option<f64>, v: f64| limit.is_none_or(|l| v <= l);
    within(config.max_mismatch_pct, c.mismatch_fraction())
        && within(config.max_indel_pct, c.indel_fraction())
        && config.max_seed_mismatches.is_none_or(|l| c.seed_mismatches() <= l)
}

fn by_posterior_desc<C: Candidate>(a: &C, b: &C) -> Ordering {
    rank_key(b.posterior()).total_cmp(&rank_key(a.posterior()))
}
