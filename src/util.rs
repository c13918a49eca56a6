//! Small scalar helpers shared by the proof modules.
use crate::errors::{ProofError, ProofResult};
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;

/// An iterator over the powers `1, x, x^2, ...`
pub(crate) struct ScalarExp {
    x: Scalar,
    next_exp_x: Scalar,
}

impl Iterator for ScalarExp {
    type Item = Scalar;

    fn next(&mut self) -> Option<Scalar> {
        let exp_x = self.next_exp_x;
        self.next_exp_x *= self.x;
        Some(exp_x)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

pub(crate) fn exp_iter(x: Scalar) -> ScalarExp {
    ScalarExp {
        x,
        next_exp_x: Scalar::ONE,
    }
}

pub(crate) fn scalar_exp(base: Scalar, exp: usize) -> Scalar {
    let mut res = Scalar::ONE;
    for _ in 0..exp {
        res *= base;
    }
    res
}

/// `1 + x + ... + x^(n-1)`
pub(crate) fn sum_of_powers(x: &Scalar, n: usize) -> Scalar {
    exp_iter(*x).take(n).sum()
}

pub(crate) fn inner_product(a: &[Scalar], b: &[Scalar]) -> Scalar {
    a.iter().zip(b.iter()).map(|(a, b)| a * b).sum()
}

/// Little-endian base `n` digits of `v`, exactly `m` of them.
pub(crate) fn digits(v: usize, n: usize, m: usize) -> Vec<usize> {
    let mut v = v;
    let mut out = Vec::with_capacity(m);
    for _ in 0..m {
        out.push(v % n);
        v /= n;
    }
    out
}

pub(crate) fn delta(a: usize, b: usize) -> Scalar {
    if a == b {
        Scalar::ONE
    } else {
        Scalar::ZERO
    }
}

/// Decode a canonical 32 byte scalar.
pub(crate) fn read_scalar(bytes: &[u8]) -> ProofResult<Scalar> {
    let bytes: [u8; 32] = bytes.try_into().map_err(|_| ProofError::FormatError)?;
    Option::<Scalar>::from(Scalar::from_canonical_bytes(bytes))
        .ok_or_else(|| ProofError::InvalidScalar(Scalar::from_bytes_mod_order(bytes)))
}

/// Decode a compressed ristretto point.
pub(crate) fn read_point(bytes: &[u8]) -> ProofResult<RistrettoPoint> {
    let bytes: [u8; 32] = bytes.try_into().map_err(|_| ProofError::FormatError)?;
    CompressedRistretto(bytes)
        .decompress()
        .ok_or(ProofError::InvalidPoint)
}
