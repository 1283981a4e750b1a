//! Shannon entropy estimation over raw byte buffers.
//!
//! The estimator is the one primitive every other sensor in this crate builds
//! on: a bulk-encryption write looks, at the byte level, like noise, and
//! noise has entropy close to 8 bits/byte. Plaintext, images, and most other
//! everyday file formats sit well below that.

/// Number of leading bytes read from a file when scoring it.
///
/// Large files are only ever scored on this prefix; a file that grows past
/// this size is still scored, just not in full.
pub const ENTROPY_READ_SIZE: usize = 65_536;

/// Computes the Shannon entropy of `data`, in bits per byte.
///
/// Builds a 256-bin histogram of byte values (rather than a hash map keyed on
/// `char`), so the result is identical across platforms and doesn't carry
/// the allocation and iteration-order cost of a generic map.
///
/// # Panics
///
/// Panics (via `debug_assert!`) in debug builds if `data` is empty; entropy
/// of zero bytes is not a meaningful quantity, and callers are expected to
/// filter empty reads before calling this function.
pub fn shannon_entropy(data: &[u8]) -> f64 {
    debug_assert!(!data.is_empty(), "shannon_entropy called with empty buffer");

    let mut histogram = [0u32; 256];
    for &byte in data {
        histogram[byte as usize] += 1;
    }

    let len = data.len() as f64;
    histogram.iter().fold(0.0, |entropy, &count| {
        if count == 0 {
            entropy
        } else {
            let p = f64::from(count) / len;
            entropy - p * p.log2()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_bytes_have_zero_entropy() {
        assert_eq!(shannon_entropy(&[0u8; 1000]), 0.0);
    }

    #[test]
    fn all_byte_values_approach_max_entropy() {
        let data: Vec<u8> = (0..=255u8).cycle().take(256 * 4).collect();
        assert!(shannon_entropy(&data) > 7.9);
    }

    #[test]
    fn plaintext_has_low_entropy() {
        let data = "hello world ".repeat(200);
        assert!(shannon_entropy(data.as_bytes()) < 5.0);
    }

    #[test]
    fn random_bytes_have_high_entropy() {
        use rand::RngCore;
        let mut data = vec![0u8; 4096];
        rand::thread_rng().fill_bytes(&mut data);
        assert!(shannon_entropy(&data) > 7.5);
    }

    #[test]
    fn entropy_is_always_in_bounds() {
        let cases: &[&[u8]] = &[&[0u8; 1], &[1, 2, 3, 4, 5], &[255u8; 64]];
        for data in cases {
            let e = shannon_entropy(data);
            assert!((0.0..=8.0).contains(&e), "entropy {} out of bounds", e);
        }
    }
}
