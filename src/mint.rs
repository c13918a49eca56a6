#![allow(non_snake_case)]
//! Mint outputs: a new coin with a public value, and a proof that the coin
//! commits to that value.
//!
//! The proof is a [`SchnorrProof`] of knowledge of the serial number and
//! randomness opening `C - v*h1` over `(g, h0)`.
use crate::coin::{PrivateCoin, PublicCoin};
use crate::errors::{ProofError, ProofResult};
use crate::params::{Params, MAX_MONEY};
use crate::schnorr::{SchnorrProof, SCHNORR_PROOF_SIZE};
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use merlin::Transcript;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// Leading byte of a mint script.
pub const MINT_OPCODE: u8 = 0xc5;

/// Opcode, coin, Schnorr proof and uniqueness tag.
pub const MINT_SCRIPT_SIZE: usize = 1 + 32 + SCHNORR_PROOF_SIZE + 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintOutput {
    coin: PublicCoin,
    proof: SchnorrProof,
    tag: [u8; 32],
}

impl MintOutput {
    /// Create the output for a freshly minted `coin`.
    pub fn generate<R: RngCore + CryptoRng>(
        params: &Params,
        coin: &PrivateCoin,
        rng: &mut R,
    ) -> ProofResult<MintOutput> {
        if coin.value() > MAX_MONEY {
            return Err(ProofError::ValueOutOfRange);
        }
        let public_coin = *coin.public_coin();
        let Y = blinding_point(params, &public_coin, coin.value());
        let proof = SchnorrProof::prove(
            &mut mint_transcript(&public_coin, coin.value()),
            params.g(),
            params.h0(),
            coin.serial_number(),
            coin.randomness(),
            &Y,
            rng,
        )?;
        Ok(MintOutput {
            coin: public_coin,
            proof,
            tag: public_coin.value_hash(),
        })
    }

    pub fn coin(&self) -> &PublicCoin {
        &self.coin
    }

    pub fn proof(&self) -> &SchnorrProof {
        &self.proof
    }

    pub fn tag(&self) -> &[u8; 32] {
        &self.tag
    }

    /// Check that the output mints exactly `value`.
    pub fn verify(&self, params: &Params, value: u64) -> bool {
        if value > MAX_MONEY || !self.coin.validate() || self.tag != self.coin.value_hash() {
            return false;
        }
        let Y = blinding_point(params, &self.coin, value);
        self.proof
            .verify(
                &mut mint_transcript(&self.coin, value),
                params.g(),
                params.h0(),
                &Y,
            )
            .is_ok()
    }

    pub fn to_script(&self) -> [u8; MINT_SCRIPT_SIZE] {
        let mut script = [0u8; MINT_SCRIPT_SIZE];
        script[0] = MINT_OPCODE;
        script[1..33].copy_from_slice(&self.coin.to_bytes());
        script[33..33 + SCHNORR_PROOF_SIZE].copy_from_slice(&self.proof.to_bytes());
        script[33 + SCHNORR_PROOF_SIZE..].copy_from_slice(&self.tag);
        script
    }

    /// Parse a mint script. The tag is taken as given, [`MintOutput::verify`]
    /// checks it against the coin.
    pub fn from_script(script: &[u8]) -> ProofResult<MintOutput> {
        if script.len() != MINT_SCRIPT_SIZE || script[0] != MINT_OPCODE {
            return Err(ProofError::FormatError);
        }
        let mut tag = [0u8; 32];
        tag.copy_from_slice(&script[33 + SCHNORR_PROOF_SIZE..]);
        Ok(MintOutput {
            coin: PublicCoin::from_bytes(&script[1..33])?,
            proof: SchnorrProof::from_bytes(&script[33..33 + SCHNORR_PROOF_SIZE])?,
            tag,
        })
    }
}

fn mint_transcript(coin: &PublicCoin, value: u64) -> Transcript {
    let mut transcript = Transcript::new(b"lelantus-mint");
    transcript.append_u64(b"value", value);
    transcript.append_message(b"coin", &coin.to_bytes());
    transcript
}

// C - v*h1
fn blinding_point(params: &Params, coin: &PublicCoin, value: u64) -> RistrettoPoint {
    coin.value() - Scalar::from(value) * params.h1()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamsConfig;
    use rand::rngs::OsRng;

    fn params() -> Params {
        Params::new(ParamsConfig::new(2, 2)).unwrap()
    }

    #[test]
    fn generate_and_verify() {
        let params = params();
        let coin = PrivateCoin::mint(&params, 1_000, &mut OsRng);
        let output = MintOutput::generate(&params, &coin, &mut OsRng).unwrap();

        assert!(output.verify(&params, 1_000));
        assert!(!output.verify(&params, 999));
        assert!(!output.verify(&params, MAX_MONEY + 1));
        assert_eq!(output.coin(), coin.public_coin());
        assert_eq!(output.tag(), &coin.public_coin().value_hash());

        // Proof of a different coin
        let other = PrivateCoin::mint(&params, 1_000, &mut OsRng);
        let mut swapped = output.clone();
        swapped.coin = *other.public_coin();
        swapped.tag = other.public_coin().value_hash();
        assert!(!swapped.verify(&params, 1_000));

        // Stale tag
        let mut stale = output.clone();
        stale.tag = [0u8; 32];
        assert!(!stale.verify(&params, 1_000));
    }

    #[test]
    fn value_above_max_money() {
        let params = params();
        let coin = PrivateCoin::mint(&params, MAX_MONEY + 1, &mut OsRng);
        assert_eq!(
            MintOutput::generate(&params, &coin, &mut OsRng).unwrap_err(),
            ProofError::ValueOutOfRange
        );
    }

    #[test]
    fn script() {
        let params = params();
        let coin = PrivateCoin::mint(&params, 42, &mut OsRng);
        let output = MintOutput::generate(&params, &coin, &mut OsRng).unwrap();

        let script = output.to_script();
        assert_eq!(script.len(), 161);
        assert_eq!(script[0], MINT_OPCODE);
        assert_eq!(&script[1..33], &coin.public_coin().to_bytes());
        assert_eq!(&script[129..], &coin.public_coin().value_hash());

        let parsed = MintOutput::from_script(&script).unwrap();
        assert_eq!(parsed, output);
        assert!(parsed.verify(&params, 42));

        let mut bad = script;
        bad[0] = 0xc6;
        assert_eq!(
            MintOutput::from_script(&bad).unwrap_err(),
            ProofError::FormatError
        );
        assert_eq!(
            MintOutput::from_script(&script[..160]).unwrap_err(),
            ProofError::FormatError
        );
    }
}
