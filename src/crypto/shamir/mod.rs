//! Shamir secret sharing for backup of string secrets
//!
//! Each byte of the UTF-8 secret gets its own random polynomial of degree
//! `threshold - 1` over GF(256); share `x` holds the evaluations at `x`.
//!
//! Share wire form (hex, lowercase):
//! ```text
//!   [1 byte: threshold][1 byte: x-coordinate][secret length bytes: y values]
//! ```
//! The encoding is private to this module; callers only pass the strings
//! around.

mod field;

use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;
use zeroize::Zeroizing;

use field::Gf256;

/// Smallest accepted threshold
pub const MIN_THRESHOLD: usize = 2;

/// Largest number of shares one split can produce
pub const MAX_SHARES: usize = 255;

const HEADER_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShareError {
    #[error("threshold must be at least 2, got {0}")]
    ThresholdTooSmall(usize),

    #[error("share count must be at most 255, got {0}")]
    TooManyShares(usize),

    #[error("threshold {threshold} exceeds share count {shares}")]
    ThresholdExceedsShares { threshold: usize, shares: usize },

    #[error("secret must not be empty")]
    EmptySecret,

    #[error("at least 2 shares are required, got {0}")]
    NotEnoughShares(usize),

    #[error("{provided} shares provided but the threshold is {threshold}")]
    BelowThreshold { provided: usize, threshold: usize },

    #[error("share {index} is malformed: {reason}")]
    MalformedShare { index: usize, reason: String },

    #[error("shares {first} and {second} are the same share")]
    DuplicateShare { first: usize, second: usize },

    #[error("shares do not come from the same split")]
    InconsistentShares,

    #[error("reconstructed secret is not valid UTF-8")]
    InvalidUtf8,
}

/// Split `secret` into `shares` shares, any `threshold` of which recover it
///
/// Requires `2 <= threshold <= shares <= 255`. Parameters are checked before
/// any randomness is drawn. Every call uses fresh coefficients, so two splits
/// of the same secret share nothing.
pub fn split(secret: &str, shares: usize, threshold: usize) -> Result<Vec<String>, ShareError> {
    if threshold < MIN_THRESHOLD {
        return Err(ShareError::ThresholdTooSmall(threshold));
    }
    if shares > MAX_SHARES {
        return Err(ShareError::TooManyShares(shares));
    }
    if threshold > shares {
        return Err(ShareError::ThresholdExceedsShares { threshold, shares });
    }
    if secret.is_empty() {
        return Err(ShareError::EmptySecret);
    }

    let secret = secret.as_bytes();
    let mut outputs: Vec<Zeroizing<Vec<u8>>> = (1..=shares)
        .map(|x| {
            let mut share = Zeroizing::new(Vec::with_capacity(HEADER_LEN + secret.len()));
            // Both fit: threshold <= shares <= 255
            share.push(threshold as u8);
            share.push(x as u8);
            share
        })
        .collect();

    let mut coeffs = Zeroizing::new(vec![0u8; threshold]);
    for &byte in secret {
        coeffs[0] = byte;
        OsRng.fill_bytes(&mut coeffs[1..]);
        for share in outputs.iter_mut() {
            let x = Gf256(share[1]);
            share.push(Gf256::eval_poly(&coeffs, x).0);
        }
    }

    Ok(outputs.iter().map(|share| hex::encode(share.as_slice())).collect())
}

/// Recover the secret from shares produced by one [`split`] call
///
/// Needs at least two shares and at least as many as the split's threshold.
/// Any qualifying subset yields the same secret. Extra shares beyond the
/// threshold are validated but not used.
pub fn combine<S: AsRef<str>>(shares: &[S]) -> Result<String, ShareError> {
    if shares.len() < MIN_THRESHOLD {
        return Err(ShareError::NotEnoughShares(shares.len()));
    }

    let decoded = shares
        .iter()
        .enumerate()
        .map(|(index, share)| decode_share(index, share.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    let threshold = decoded[0][0] as usize;
    let secret_len = decoded[0].len() - HEADER_LEN;
    for (index, share) in decoded.iter().enumerate() {
        if share[0] as usize != threshold || share.len() - HEADER_LEN != secret_len {
            return Err(ShareError::InconsistentShares);
        }
        if let Some(first) = decoded[..index].iter().position(|other| other[1] == share[1]) {
            return Err(ShareError::DuplicateShare {
                first,
                second: index,
            });
        }
    }
    if decoded.len() < threshold {
        return Err(ShareError::BelowThreshold {
            provided: decoded.len(),
            threshold,
        });
    }

    let used = &decoded[..threshold];
    let mut points = vec![(Gf256::ZERO, Gf256::ZERO); threshold];
    let mut secret = Zeroizing::new(Vec::with_capacity(secret_len));
    for offset in HEADER_LEN..HEADER_LEN + secret_len {
        for (point, share) in points.iter_mut().zip(used) {
            *point = (Gf256(share[1]), Gf256(share[offset]));
        }
        secret.push(Gf256::interpolate_at_zero(&points).0);
    }

    String::from_utf8(secret.to_vec()).map_err(|e| {
        drop(Zeroizing::new(e.into_bytes()));
        ShareError::InvalidUtf8
    })
}

fn decode_share(index: usize, share: &str) -> Result<Zeroizing<Vec<u8>>, ShareError> {
    let malformed = |reason: &str| ShareError::MalformedShare {
        index,
        reason: reason.to_string(),
    };

    let bytes = Zeroizing::new(hex::decode(share.trim()).map_err(|e| malformed(&e.to_string()))?);
    if bytes.len() <= HEADER_LEN {
        return Err(malformed("too short"));
    }
    if (bytes[0] as usize) < MIN_THRESHOLD {
        return Err(malformed("threshold below 2"));
    }
    if bytes[1] == 0 {
        return Err(malformed("x-coordinate is zero"));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str =
        "abandon ability able about above absent absorb abstract absurd abuse access accident";

    fn pick(shares: &[String], indices: &[usize]) -> Vec<String> {
        indices.iter().map(|&i| shares[i].clone()).collect()
    }

    #[test]
    fn test_five_shares_threshold_three() {
        let shares = split(SECRET, 5, 3).unwrap();
        assert_eq!(shares.len(), 5);

        assert_eq!(combine(&pick(&shares, &[0, 2, 4])).unwrap(), SECRET);
        assert_eq!(combine(&pick(&shares, &[1, 3, 4])).unwrap(), SECRET);
        assert_eq!(combine(&shares).unwrap(), SECRET);
    }

    #[test]
    fn test_every_threshold_subset_recovers() {
        let shares = split("correct horse battery staple", 6, 3).unwrap();
        for a in 0..6 {
            for b in a + 1..6 {
                for c in b + 1..6 {
                    let subset = pick(&shares, &[c, a, b]);
                    assert_eq!(combine(&subset).unwrap(), "correct horse battery staple");
                }
            }
        }
    }

    #[test]
    fn test_below_threshold_never_returns_secret() {
        let shares = split("x", 5, 4).unwrap();
        for indices in [[0, 1, 2], [1, 2, 3], [2, 3, 4], [0, 2, 4]] {
            assert_eq!(
                combine(&pick(&shares, &indices)),
                Err(ShareError::BelowThreshold {
                    provided: 3,
                    threshold: 4
                })
            );
        }
    }

    #[test]
    fn test_threshold_greater_than_shares_rejected() {
        assert_eq!(
            split(SECRET, 3, 4),
            Err(ShareError::ThresholdExceedsShares {
                threshold: 4,
                shares: 3
            })
        );
        let message = split(SECRET, 3, 4).unwrap_err().to_string();
        assert!(message.contains("threshold 4 exceeds share count 3"));
    }

    #[test]
    fn test_parameter_bounds() {
        assert_eq!(split(SECRET, 5, 1), Err(ShareError::ThresholdTooSmall(1)));
        assert_eq!(split(SECRET, 256, 2), Err(ShareError::TooManyShares(256)));
        assert_eq!(split("", 3, 2), Err(ShareError::EmptySecret));
    }

    #[test]
    fn test_combine_needs_two_shares() {
        let shares = split(SECRET, 3, 2).unwrap();
        assert_eq!(combine(&shares[..1]), Err(ShareError::NotEnoughShares(1)));
        assert_eq!(combine::<String>(&[]), Err(ShareError::NotEnoughShares(0)));
    }

    #[test]
    fn test_splits_are_randomized() {
        let a = split(SECRET, 4, 2).unwrap();
        let b = split(SECRET, 4, 2).unwrap();
        assert_ne!(a, b);
        // Shares from different splits do not combine into the secret
        assert_ne!(combine(&[a[0].clone(), b[1].clone()]).ok().as_deref(), Some(SECRET));
    }

    #[test]
    fn test_unicode_secret() {
        let secret = "ключ 🔑 鍵";
        let shares = split(secret, 3, 2).unwrap();
        assert_eq!(combine(&shares[1..]).unwrap(), secret);
    }

    #[test]
    fn test_maximum_share_count() {
        let shares = split("max", 255, 255).unwrap();
        assert_eq!(shares.len(), 255);
        let mut reversed = shares.clone();
        reversed.reverse();
        assert_eq!(combine(&reversed).unwrap(), "max");
    }

    #[test]
    fn test_duplicate_and_malformed_shares() {
        let shares = split(SECRET, 3, 2).unwrap();
        assert_eq!(
            combine(&[shares[0].clone(), shares[0].clone()]),
            Err(ShareError::DuplicateShare {
                first: 0,
                second: 1
            })
        );
        assert!(matches!(
            combine(&[shares[0].as_str(), "zz"]),
            Err(ShareError::MalformedShare { index: 1, .. })
        ));
        assert!(matches!(
            combine(&[shares[0].as_str(), "0201"]),
            Err(ShareError::MalformedShare { index: 1, .. })
        ));

        let other = split("different length", 3, 2).unwrap();
        assert_eq!(
            combine(&[shares[0].clone(), other[1].clone()]),
            Err(ShareError::InconsistentShares)
        );
    }
}
