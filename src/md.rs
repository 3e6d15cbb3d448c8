//! SAM `MD` mismatch span strings.
//!
//! An MD string alternates reference-match run lengths with either a single
//! substituted reference base or a `^`-prefixed deleted reference run, e.g.
//! `10A5^AC6`. Every token consumes reference positions only.

use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MdToken {
    Match(u32),
    Mismatch(u8),
    Deletion(Vec<u8>),
}

impl MdToken {
    pub fn reference_len(&self) -> u32 {
        match self {
            MdToken::Match(n) => *n,
            MdToken::Mismatch(_) => 1,
            MdToken::Deletion(bases) => bases.len() as u32,
        }
    }
}

pub fn parse(md: &str) -> Result<Vec<MdToken>, String> {
    let bytes = md.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_digit() {
            let mut n: u32 = 0;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                n = n
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(u32::from(bytes[i] - b'0')))
                    .ok_or_else(|| format!("match length overflow in {md}"))?;
                i += 1;
            }
            tokens.push(MdToken::Match(n));
        } else if b == b'^' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                i += 1;
            }
            if i == start {
                return Err(format!("empty deletion at offset {} in {md}", start - 1));
            }
            tokens.push(MdToken::Deletion(bytes[start..i].to_vec()));
        } else if b.is_ascii_alphabetic() {
            tokens.push(MdToken::Mismatch(b));
            i += 1;
        } else {
            return Err(format!("unexpected byte '{}' at offset {i} in {md}", b as char));
        }
    }

    Ok(tokens)
}

pub fn reference_len(tokens: &[MdToken]) -> Result<u32, String> {
    tokens
        .iter()
        .try_fold(0u32, |acc, t| acc.checked_add(t.reference_len()))
        .ok_or_else(|| "reference length overflow".to_string())
}

/// Render tokens in canonical form: numeric first and last, and a `0`
/// between any two adjacent non-match tokens.
pub fn format(tokens: &[MdToken]) -> String {
    let mut out = String::new();
    let mut pending: Option<u32> = Some(0);

    for token in tokens {
        match token {
            MdToken::Match(n) => {
                *pending.get_or_insert(0) += n;
            }
            MdToken::Mismatch(base) => {
                let _ = write!(out, "{}", pending.take().unwrap_or(0));
                out.push(base.to_ascii_uppercase() as char);
            }
            MdToken::Deletion(bases) => {
                let _ = write!(out, "{}", pending.take().unwrap_or(0));
                out.push('^');
                out.extend(bases.iter().map(|b| b.to_ascii_uppercase() as char));
            }
        }
    }
    let _ = write!(out, "{}", pending.unwrap_or(0));
    out
}
