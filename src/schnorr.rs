#![allow(non_snake_case)]
//! Proof of knowledge of a two generator opening `Y = P*a + T*b`.
use crate::errors::{ProofError, ProofResult};
use crate::transcript::TranscriptProtocol;
use crate::util::{read_point, read_scalar};
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::{IsIdentity, MultiscalarMul, VartimeMultiscalarMul};
use merlin::Transcript;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// Encoded size: one point and two scalars.
pub const SCHNORR_PROOF_SIZE: usize = 96;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchnorrProof {
    u: RistrettoPoint,
    P1: Scalar,
    T1: Scalar,
}

impl SchnorrProof {
    /// Prove knowledge of `P` and `T` such that `Y = P*a + T*b`.
    ///
    /// The nonces are drawn from a transcript RNG rekeyed with the witness,
    /// seeded by `rng`.
    pub fn prove<R: RngCore + CryptoRng>(
        transcript: &mut Transcript,
        a: &RistrettoPoint,
        b: &RistrettoPoint,
        P: &Scalar,
        T: &Scalar,
        Y: &RistrettoPoint,
        rng: &mut R,
    ) -> ProofResult<SchnorrProof> {
        transcript.schnorr_proof_domain_sep();
        transcript.append_point(b"a", &a.compress());
        transcript.append_point(b"b", &b.compress());
        transcript.append_point(b"Y", &Y.compress());

        let mut rng = transcript
            .build_rng()
            .rekey_with_witness_bytes(b"P", P.as_bytes())
            .rekey_with_witness_bytes(b"T", T.as_bytes())
            .finalize(rng);

        let r1 = Scalar::random(&mut rng);
        let r2 = Scalar::random(&mut rng);
        let u = RistrettoPoint::multiscalar_mul(&[r1, r2], &[*a, *b]);
        transcript.validate_and_append_point(b"u", &u.compress())?;

        let c = transcript.challenge_scalar(b"schnorr-challenge");
        Ok(SchnorrProof {
            u,
            P1: r1 + c * P,
            T1: r2 + c * T,
        })
    }

    /// Check `P1*a + T1*b == u + c*Y`.
    pub fn verify(
        &self,
        transcript: &mut Transcript,
        a: &RistrettoPoint,
        b: &RistrettoPoint,
        Y: &RistrettoPoint,
    ) -> ProofResult<()> {
        transcript.schnorr_proof_domain_sep();
        transcript.append_point(b"a", &a.compress());
        transcript.append_point(b"b", &b.compress());
        transcript.append_point(b"Y", &Y.compress());
        transcript.validate_and_append_point(b"u", &self.u.compress())?;

        let c = transcript.challenge_scalar(b"schnorr-challenge");
        let check = RistrettoPoint::vartime_multiscalar_mul(
            &[self.P1, self.T1, -Scalar::ONE, -c],
            &[*a, *b, self.u, *Y],
        );
        if check.is_identity() {
            Ok(())
        } else {
            Err(ProofError::VerificationFailed)
        }
    }

    pub fn to_bytes(&self) -> [u8; SCHNORR_PROOF_SIZE] {
        let mut bytes = [0u8; SCHNORR_PROOF_SIZE];
        bytes[..32].copy_from_slice(self.u.compress().as_bytes());
        bytes[32..64].copy_from_slice(self.P1.as_bytes());
        bytes[64..].copy_from_slice(self.T1.as_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> ProofResult<SchnorrProof> {
        if bytes.len() != SCHNORR_PROOF_SIZE {
            return Err(ProofError::InvalidProofSize);
        }
        Ok(SchnorrProof {
            u: read_point(&bytes[..32])?,
            P1: read_scalar(&bytes[32..64])?,
            T1: read_scalar(&bytes[64..])?,
        })
    }
}
