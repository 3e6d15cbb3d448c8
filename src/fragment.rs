//! Paired-end fragment-length model.
//!
//! A single streaming pass collects |TLEN| from properly spaced read-1
//! alignments and fits a Gaussian. The pass consumes its input, so the caller
//! reopens the alignment source for the main pass.

use crate::config::FragmentConfig;
use crate::error::RescoreError;
use crate::record::AlignmentRecord;
use anyhow::Result;

const MIN_SD: f64 = 1.0;
const LOG10_SQRT_2PI: f64 = 0.399_089_934_179_057_5; // log10(sqrt(2*pi))

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentLengthModel {
    pub mean: f64,
    pub sd: f64,
}

impl FragmentLengthModel {
    pub fn new(mean: f64, sd: f64) -> Self {
        Self { mean, sd }
    }

    pub fn log10_density(&self, tlen: f64) -> f64 {
        let sd = self.sd.max(MIN_SD);
        let z = (tlen - self.mean) / sd;
        -0.5 * z * z * std::f64::consts::LOG10_E - sd.log10() - LOG10_SQRT_2PI
    }

    pub fn density(&self, tlen: f64) -> f64 {
        10f64.powf(self.log10_density(tlen))
    }
}

/// Running count / sum / sum of squares of accepted template lengths.
#[derive(Debug, Clone, Default)]
pub struct FragmentAccumulator {
    pub count: u64,
    sum: f64,
    sum_sq: f64,
}

impl FragmentAccumulator {
    /// Offer one record; returns true when it was counted.
    pub fn offer(&mut self, record: &AlignmentRecord, config: &FragmentConfig) -> bool {
        if !record.is_paired()
            || !record.is_first_of_pair()
            || record.is_unmapped()
            || record.is_secondary()
            || record.is_supplementary()
        {
            return false;
        }
        let tlen = record.template_len.unsigned_abs();
        if tlen < config.min_len || tlen > config.max_len {
            return false;
        }
        self.add(f64::from(tlen));
        true
    }

    pub fn add(&mut self, tlen: f64) {
        self.count += 1;
        self.sum += tlen;
        self.sum_sq += tlen * tlen;
    }

    pub fn is_full(&self, config: &FragmentConfig) -> bool {
        self.count >= config.sample_cap
    }

    /// Sample mean and Bessel-corrected standard deviation.
    pub fn finish(&self, min_samples: u64) -> Result<FragmentLengthModel, RescoreError> {
        let required = min_samples.max(2);
        if self.count < required {
            return Err(RescoreError::InsufficientFragmentSamples {
                found: self.count,
                required,
            });
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        let var = ((self.sum_sq - self.sum * self.sum / n) / (n - 1.0)).max(0.0);
        Ok(FragmentLengthModel { mean, sd: var.sqrt() })
    }
}

/// Fit the model from a record stream, stopping at the sample cap.
pub fn estimate_fragment_model<I>(records: I, config: &FragmentConfig) -> Result<FragmentLengthModel>
where
    I: IntoIterator<Item = Result<AlignmentRecord>>,
{
    let mut acc = FragmentAccumulator::default();
    let mut seen = 0u64;
    for result in records {
        let record = result?;
        seen += 1;
        acc.offer(&record, config);
        if acc.is_full(config) {
            break;
        }
    }

    let model = acc.finish(config.min_samples)?;
    tracing::info!(
        records_scanned = seen,
        samples = acc.count,
        mean = model.mean,
        sd = model.sd,
        "estimated fragment-length distribution"
    );
    Ok(model)
}
