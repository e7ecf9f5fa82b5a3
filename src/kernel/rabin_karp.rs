//! Rabin–Karp kernel.
//!
//! Windows whose fingerprint equals the pattern's are only candidates; each
//! one is confirmed with a full byte comparison before it is reported.

use crate::error::KernelError;

use super::{MatchKernel, push_offset};

/// Fingerprint base.
pub const BASE: u64 = 256;
/// Fingerprint modulus.
pub const MODULUS: u64 = 101;

/// Fingerprint of a whole window.
pub fn fingerprint(window: &[u8]) -> u64 {
    window
        .iter()
        .fold(0, |hash, &byte| ((hash * BASE) % MODULUS + byte as u64) % MODULUS)
}

/// Fingerprints of every `width`-byte window of `text`, left to right,
/// computed incrementally.
pub struct RollingFingerprints<'a> {
    text: &'a [u8],
    width: usize,
    /// `BASE^(width - 1) mod MODULUS`: weight of the byte leaving the window.
    lead_weight: u64,
    next_start: usize,
    current: u64,
}

impl<'a> RollingFingerprints<'a> {
    pub fn new(text: &'a [u8], width: usize) -> Self {
        let lead_weight = (1..width).fold(1, |w, _| (w * BASE) % MODULUS);
        let current = if width > 0 && width <= text.len() {
            fingerprint(&text[..width])
        } else {
            0
        };
        Self {
            text,
            width,
            lead_weight,
            next_start: 0,
            current,
        }
    }
}

impl Iterator for RollingFingerprints<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.width == 0 || self.next_start + self.width > self.text.len() {
            return None;
        }

        let hash = self.current;
        let start = self.next_start;
        self.next_start += 1;

        if let Some(&incoming) = self.text.get(start + self.width) {
            let outgoing = (self.text[start] as u64 * self.lead_weight) % MODULUS;
            let without_lead = (hash + MODULUS - outgoing) % MODULUS;
            self.current = (without_lead * BASE + incoming as u64) % MODULUS;
        }

        Some(hash)
    }
}

/// Reference hash-then-verify kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct RabinKarp;

impl MatchKernel for RabinKarp {
    fn name(&self) -> &'static str {
        "rabin-karp"
    }

    fn find_all(&self, text: &[u8], pattern: &[u8]) -> Result<Vec<usize>, KernelError> {
        let width = pattern.len();
        let mut offsets = Vec::new();
        if width == 0 || width > text.len() {
            return Ok(offsets);
        }

        let target = fingerprint(pattern);
        for (offset, hash) in RollingFingerprints::new(text, width).enumerate() {
            if hash == target && &text[offset..offset + width] == pattern {
                push_offset(&mut offsets, offset)?;
            }
        }
        Ok(offsets)
    }
}
