#![allow(non_snake_case)]
//! Protocol parameters and the common reference string.
//!
//! All generators besides the ristretto basepoint `g` are derived by hashing
//! to the group, so no discrete log relation between any two of them is
//! known to anyone.
use crate::errors::{ProofError, ProofResult};
use curve25519_dalek::constants;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::MultiscalarMul;
use serde::{Deserialize, Serialize};
use sha3::Sha3_512;

/// Upper bound on every public amount that enters the balance equation.
pub const MAX_MONEY: u64 = 21_400_000 * 100_000_000;

/// Largest padded anonymity set a parameter set may describe.
const MAX_SET_SIZE: usize = 1 << 24;

/// Protocol constants. The defaults are the deployed Lelantus constants: base
/// 16 digits over 4 levels, 64 bit range proofs aggregating at most 16
/// outputs, and coin groups closing at 65000 members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamsConfig {
    pub sigma_n: usize,
    pub sigma_m: usize,
    pub range_bits: usize,
    pub max_outputs: usize,
    pub max_group_size: usize,
}

impl Default for ParamsConfig {
    fn default() -> Self {
        ParamsConfig {
            sigma_n: 16,
            sigma_m: 4,
            range_bits: 64,
            max_outputs: 16,
            max_group_size: 65000,
        }
    }
}

impl ParamsConfig {
    /// A configuration for base `n`, `m` level membership proofs, whose coin
    /// groups close once the padded set size `n^m` is reached.
    pub fn new(n: usize, m: usize) -> ParamsConfig {
        let max_group_size = u32::try_from(m)
            .ok()
            .and_then(|m| n.checked_pow(m))
            .unwrap_or(MAX_SET_SIZE);
        ParamsConfig {
            sigma_n: n,
            sigma_m: m,
            max_group_size,
            ..ParamsConfig::default()
        }
    }
}

/// Generators and sizes shared by every prover and verifier.
///
/// Only the configuration is serialized. Deserializing validates it and
/// derives the generators again.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ParamsConfig", into = "ParamsConfig")]
pub struct Params {
    config: ParamsConfig,
    max_set_size: usize,
    g: RistrettoPoint,
    h0: RistrettoPoint,
    h1: RistrettoPoint,
    sigma_H: Vec<RistrettoPoint>,
    bp_G: Vec<RistrettoPoint>,
    bp_H: Vec<RistrettoPoint>,
}

impl Params {
    /// Validate `config` and derive all generators it calls for.
    ///
    /// ```
    /// # use lelantus::params::{Params, ParamsConfig};
    /// // Sets of up to 4^3 = 64 coins
    /// let params = Params::new(ParamsConfig::new(4, 3)).unwrap();
    /// assert_eq!(params.max_set_size(), 64);
    /// ```
    pub fn new(config: ParamsConfig) -> ProofResult<Params> {
        if config.sigma_n < 2 || config.sigma_m < 1 {
            return Err(ProofError::SetIsTooSmall);
        }
        let max_set_size = u32::try_from(config.sigma_m)
            .ok()
            .and_then(|m| config.sigma_n.checked_pow(m))
            .filter(|&size| size <= MAX_SET_SIZE)
            .ok_or(ProofError::SetIsTooLarge)?;
        if ![8, 16, 32, 64].contains(&config.range_bits) {
            return Err(ProofError::InvalidParameters("range width must be 8, 16, 32 or 64"));
        }
        if !config.max_outputs.is_power_of_two() {
            return Err(ProofError::InvalidParameters("output limit must be a power of two"));
        }
        if config.max_group_size == 0 || config.max_group_size > max_set_size {
            return Err(ProofError::InvalidParameters("group size must fit the padded set"));
        }

        let h = derive_generators(b"lelantus-h", 2);
        let bp_len = config.range_bits * config.max_outputs;
        Ok(Params {
            max_set_size,
            g: constants::RISTRETTO_BASEPOINT_POINT,
            h0: h[0],
            h1: h[1],
            sigma_H: derive_generators(b"lelantus-sigma", config.sigma_n * config.sigma_m),
            bp_G: derive_generators(b"lelantus-bulletproof-G", bp_len),
            bp_H: derive_generators(b"lelantus-bulletproof-H", bp_len),
            config,
        })
    }

    pub fn config(&self) -> &ParamsConfig {
        &self.config
    }

    /// Generator for serial numbers.
    pub fn g(&self) -> &RistrettoPoint {
        &self.g
    }

    /// Generator for blinding randomness.
    pub fn h0(&self) -> &RistrettoPoint {
        &self.h0
    }

    /// Generator for values.
    pub fn h1(&self) -> &RistrettoPoint {
        &self.h1
    }

    pub fn sigma_n(&self) -> usize {
        self.config.sigma_n
    }

    pub fn sigma_m(&self) -> usize {
        self.config.sigma_m
    }

    /// Size every anonymity set is padded to, `n^m`.
    pub fn max_set_size(&self) -> usize {
        self.max_set_size
    }

    pub fn range_bits(&self) -> usize {
        self.config.range_bits
    }

    pub fn max_outputs(&self) -> usize {
        self.config.max_outputs
    }

    pub fn max_group_size(&self) -> usize {
        self.config.max_group_size
    }

    pub(crate) fn sigma_gens(&self) -> &[RistrettoPoint] {
        &self.sigma_H
    }

    /// Bulletproof vector generators for an aggregation of `m` values.
    pub(crate) fn bulletproof_gens(&self, m: usize) -> (&[RistrettoPoint], &[RistrettoPoint]) {
        let len = self.config.range_bits * m;
        (&self.bp_G[..len], &self.bp_H[..len])
    }

    /// `serial*g + value*h1 + randomness*h0`
    pub fn double_commit(
        &self,
        serial: &Scalar,
        value: &Scalar,
        randomness: &Scalar,
    ) -> RistrettoPoint {
        RistrettoPoint::multiscalar_mul(
            &[*serial, *value, *randomness],
            &[self.g, self.h1, self.h0],
        )
    }
}

impl TryFrom<ParamsConfig> for Params {
    type Error = ProofError;

    fn try_from(config: ParamsConfig) -> ProofResult<Params> {
        Params::new(config)
    }
}

impl From<Params> for ParamsConfig {
    fn from(params: Params) -> ParamsConfig {
        params.config
    }
}

impl Default for Params {
    fn default() -> Self {
        // The default configuration is statically valid
        Params::new(ParamsConfig::default()).unwrap()
    }
}

// gen[0] = hash(label || g), gen[i] = hash(gen[i-1])
fn derive_generators(label: &[u8], count: usize) -> Vec<RistrettoPoint> {
    let mut seed = label.to_vec();
    seed.extend_from_slice(constants::RISTRETTO_BASEPOINT_COMPRESSED.as_bytes());

    let mut gens = Vec::with_capacity(count);
    let mut next = RistrettoPoint::hash_from_bytes::<Sha3_512>(&seed);
    for _ in 0..count {
        gens.push(next);
        next = RistrettoPoint::hash_from_bytes::<Sha3_512>(next.compress().as_bytes());
    }
    gens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_params() {
        assert!(Params::new(ParamsConfig::new(2, 3)).is_ok());
        assert_eq!(
            Params::new(ParamsConfig::new(1, 3)).unwrap_err(),
            ProofError::SetIsTooSmall
        );
        assert_eq!(
            Params::new(ParamsConfig::new(4, 0)).unwrap_err(),
            ProofError::SetIsTooSmall
        );
        assert_eq!(
            Params::new(ParamsConfig::new(16, 7)).unwrap_err(),
            ProofError::SetIsTooLarge
        );

        let mut config = ParamsConfig::new(2, 2);
        config.range_bits = 12;
        assert!(Params::new(config).is_err());

        let mut config = ParamsConfig::new(2, 2);
        config.max_outputs = 3;
        assert!(Params::new(config).is_err());

        let mut config = ParamsConfig::new(2, 2);
        config.max_group_size = 5;
        assert!(Params::new(config).is_err());
    }

    #[test]
    fn set_sizes() {
        assert_eq!(Params::new(ParamsConfig::new(2, 5)).unwrap().max_set_size(), 32);
        assert_eq!(Params::new(ParamsConfig::new(3, 2)).unwrap().max_set_size(), 9);
        assert_eq!(ParamsConfig::default().max_group_size, 65000);
        assert_eq!(ParamsConfig::new(16, 4).max_group_size, 65536);
    }

    #[test]
    fn generators_are_distinct_and_reproducible() {
        let a = Params::new(ParamsConfig::new(2, 2)).unwrap();
        let b = Params::new(ParamsConfig::new(2, 2)).unwrap();
        assert_eq!(a.h0(), b.h0());
        assert_eq!(a.sigma_gens(), b.sigma_gens());

        let mut all = vec![*a.g(), *a.h0(), *a.h1()];
        all.extend_from_slice(a.sigma_gens());
        let (G, H) = a.bulletproof_gens(a.max_outputs());
        all.extend_from_slice(G);
        all.extend_from_slice(H);
        let compressed = all.iter().map(|p| p.compress()).collect::<Vec<_>>();
        for i in 0..compressed.len() {
            for j in (i + 1)..compressed.len() {
                assert_ne!(compressed[i], compressed[j]);
            }
        }
    }

    #[test]
    fn params_serialize_as_config() {
        let mut config = ParamsConfig::new(3, 2);
        config.max_outputs = 2;
        let params = Params::new(config.clone()).unwrap();

        let bytes = serde_cbor::to_vec(&params).unwrap();
        assert_eq!(bytes, serde_cbor::to_vec(&config).unwrap());
        let decoded: Params = serde_cbor::from_slice(&bytes).unwrap();
        assert_eq!(decoded.config(), &config);
        assert_eq!(decoded.h1(), params.h1());
        assert_eq!(decoded.sigma_gens(), params.sigma_gens());
        assert_eq!(decoded.bulletproof_gens(2), params.bulletproof_gens(2));

        // Invalid configurations are rejected on the way in
        let mut bad = config.clone();
        bad.max_outputs = 3;
        let bytes = serde_cbor::to_vec(&bad).unwrap();
        assert!(serde_cbor::from_slice::<Params>(&bytes).is_err());
        let mut bad = config;
        bad.sigma_n = 1;
        let bytes = serde_cbor::to_vec(&bad).unwrap();
        assert!(serde_cbor::from_slice::<Params>(&bytes).is_err());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let mut config = ParamsConfig::new(4, 2);
        config.max_outputs = 4;
        let bytes = serde_cbor::to_vec(&config).unwrap();
        let decoded: ParamsConfig = serde_cbor::from_slice(&bytes).unwrap();
        assert_eq!(decoded, config);
    }
}
