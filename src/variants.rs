//! Known variants and range lookup over them.

use crate::types::{HashMap, HashMapExt};
use anyhow::{Context, Result};
use coitrees::{BasicCOITree, Interval, IntervalTree as CoitreeIntervalTree};
use noodles::vcf;
use noodles::vcf::variant::record_buf::info::field::Value;
use noodles::vcf::variant::record_buf::info::field::value::Array;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct KnownVariant {
    pub id: String,
    pub ref_name: String,
    /// 1-based, closed.
    pub start: u32,
    pub end: u32,
    pub ref_allele: Vec<u8>,
    pub alt_alleles: Vec<Vec<u8>>,
    /// Per-alternate-allele frequency, aligned with `alt_alleles`.
    pub freqs: Vec<Option<f64>>,
}

impl KnownVariant {
    /// Build a variant from VCF-style alleles. `end` is derived from the
    /// reference allele length.
    pub fn new(id: &str, ref_name: &str, start: u32, ref_allele: &[u8], alts: &[&[u8]]) -> Self {
        let end = start + (ref_allele.len() as u32).max(1) - 1;
        Self {
            id: id.to_string(),
            ref_name: ref_name.to_string(),
            start,
            end,
            ref_allele: ref_allele.to_ascii_uppercase(),
            alt_alleles: alts.iter().map(|a| a.to_ascii_uppercase()).collect(),
            freqs: vec![None; alts.len()],
        }
    }

    pub fn with_freqs(mut self, freqs: Vec<Option<f64>>) -> Self {
        self.freqs = freqs;
        self
    }

    pub fn freq(&self, alt_idx: usize) -> Option<f64> {
        self.freqs.get(alt_idx).copied().flatten()
    }
}

/// Lookup of known variants by reference range (1-based, closed).
pub trait VariantSource {
    fn overlapping(&self, ref_name: &str, start: u32, end: u32) -> Vec<&KnownVariant>;
}

#[derive(Debug, Clone, Default)]
struct VariantSlot {
    idx: usize,
}

struct RefIndex {
    variants: Vec<KnownVariant>,
    tree: BasicCOITree<VariantSlot, u32>,
}

/// In-memory interval index over known variants, one tree per reference.
pub struct VariantIndex {
    refs: HashMap<String, RefIndex>,
    len: usize,
}

impl VariantIndex {
    pub fn from_variants(variants: Vec<KnownVariant>) -> Self {
        let len = variants.len();
        let mut by_ref: HashMap<String, Vec<KnownVariant>> = HashMap::new();
        for v in variants {
            by_ref.entry(v.ref_name.clone()).or_default().push(v);
        }

        let mut refs = HashMap::new();
        for (name, variants) in by_ref {
            // COITree intervals are end-inclusive, same as the variant span.
            let intervals: Vec<Interval<VariantSlot>> = variants
                .iter()
                .enumerate()
                .map(|(idx, v)| Interval::new(v.start as i32, v.end as i32, VariantSlot { idx }))
                .collect();
            let tree = BasicCOITree::new(&intervals);
            refs.insert(name, RefIndex { variants, tree });
        }

        Self { refs, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl VariantSource for VariantIndex {
    fn overlapping(&self, ref_name: &str, start: u32, end: u32) -> Vec<&KnownVariant> {
        let Some(index) = self.refs.get(ref_name) else {
            return Vec::new();
        };
        let mut hits: Vec<usize> = Vec::new();
        index.tree.query(start as i32, end as i32, |node| {
            hits.push(node.metadata.idx);
        });
        // tree order is unspecified; report in file order
        hits.sort_unstable();
        hits.into_iter().map(|i| &index.variants[i]).collect()
    }
}

/// Load an uncompressed VCF. `freq_tag` names the INFO field holding
/// per-allele frequencies (e.g. `AF`).
pub fn load_vcf(path: &Path, freq_tag: Option<&str>) -> Result<VariantIndex> {
    let file = File::open(path).with_context(|| format!("failed to open VCF {}", path.display()))?;
    let mut reader = vcf::io::Reader::new(BufReader::new(file));
    let header = reader.read_header()?;

    let mut variants = Vec::new();
    for result in reader.record_bufs(&header) {
        let record = result?;
        let Some(start) = record.variant_start() else {
            continue;
        };
        let start = u32::try_from(start.get())
            .with_context(|| format!("variant start out of range in {}", path.display()))?;
        let ref_allele = record.reference_bases().as_bytes().to_ascii_uppercase();
        let alt_alleles: Vec<Vec<u8>> = record
            .alternate_bases()
            .as_ref()
            .iter()
            .map(|a| a.as_bytes().to_ascii_uppercase())
            .collect();
        if ref_allele.is_empty() || alt_alleles.is_empty() {
            continue;
        }

        let ref_name = record.reference_sequence_name().to_string();
        let id = record
            .ids()
            .as_ref()
            .iter()
            .next()
            .cloned()
            .unwrap_or_else(|| {
                format!("{}:{}:{}", ref_name, start, String::from_utf8_lossy(&ref_allele))
            });

        let freqs = match freq_tag {
            Some(tag) => allele_frequencies(record.info().get(tag).flatten(), alt_alleles.len()),
            None => vec![None; alt_alleles.len()],
        };

        variants.push(KnownVariant {
            id,
            ref_name,
            start,
            end: start + ref_allele.len() as u32 - 1,
            ref_allele,
            alt_alleles,
            freqs,
        });
    }

    tracing::info!(path = %path.display(), variants = variants.len(), "loaded known variants");
    Ok(VariantIndex::from_variants(variants))
}

fn allele_frequencies(value: Option<&Value>, n_alts: usize) -> Vec<Option<f64>> {
    let mut freqs = match value {
        Some(Value::Float(f)) => vec![Some(f64::from(*f))],
        Some(Value::Array(Array::Float(values))) => {
            values.iter().map(|v| v.map(f64::from)).collect()
        }
        _ => Vec::new(),
    };
    freqs.resize(n_alts, None);
    freqs
}
