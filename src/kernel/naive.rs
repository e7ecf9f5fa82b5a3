//! Brute-force window comparison.

use crate::error::KernelError;

use super::{MatchKernel, push_offset};

#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveScan;

impl MatchKernel for NaiveScan {
    fn name(&self) -> &'static str {
        "naive"
    }

    fn find_all(&self, text: &[u8], pattern: &[u8]) -> Result<Vec<usize>, KernelError> {
        let mut offsets = Vec::new();
        if pattern.is_empty() || pattern.len() > text.len() {
            return Ok(offsets);
        }
        for (offset, window) in text.windows(pattern.len()).enumerate() {
            if window == pattern {
                push_offset(&mut offsets, offset)?;
            }
        }
        Ok(offsets)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::kernel::RabinKarp;

    #[test]
    fn finds_repeated_pattern() {
        assert_eq!(NaiveScan.find_all(b"abcabcabc", b"abc").unwrap(), vec![0, 3, 6]);
    }

    #[test]
    fn agrees_with_rabin_karp_on_random_inputs() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        // Small alphabet so matches (and fingerprint collisions) are frequent.
        let alphabet = b"ab, ";
        for _ in 0..200 {
            let text_len = rng.gen_range(0..200);
            let text: Vec<u8> = (0..text_len)
                .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
                .collect();
            let pattern_len = rng.gen_range(1..6);
            let pattern: Vec<u8> = (0..pattern_len)
                .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
                .collect();

            assert_eq!(
                NaiveScan.find_all(&text, &pattern).unwrap(),
                RabinKarp.find_all(&text, &pattern).unwrap(),
                "text {:?} pattern {:?}",
                String::from_utf8_lossy(&text),
                String::from_utf8_lossy(&pattern),
            );
        }
    }
}
