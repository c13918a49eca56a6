//! Defines a `TranscriptProtocol` trait for using a Merlin transcript.
use crate::errors::{ProofError, ProofResult};

use curve25519_dalek::ristretto::CompressedRistretto;
use curve25519_dalek::scalar::Scalar;

use merlin::Transcript;

pub trait TranscriptProtocol {
    /// Append a domain separator for a one-of-many proof over a base `n`,
    /// `m` digit set, bound to the hash of that set.
    fn sigma_proof_domain_sep(&mut self, n: u64, m: u64, set_hash: &[u8; 32]);

    /// Append a domain separator for an `n`-ary, `m` digit commitment proof.
    fn digit_proof_domain_sep(&mut self, n: u64, m: u64);

    /// Append a domain separator for an aggregated `n` bit range proof over
    /// `m` commitments.
    fn range_proof_domain_sep(&mut self, n: u64, m: u64);

    /// Append a domain separator for a length-`n` inner product proof.
    fn inner_product_domain_sep(&mut self, n: u64);

    /// Append a domain separator for a two-generator Schnorr proof.
    fn schnorr_proof_domain_sep(&mut self);

    /// Append a domain separator for a join-split spending `inputs` coins and
    /// minting `outputs` coins.
    fn joinsplit_domain_sep(&mut self, inputs: u64, outputs: u64);

    /// Append a `scalar` with the given `label`.
    fn append_scalar(&mut self, label: &'static [u8], scalar: &Scalar);

    /// Append a `point` with the given `label`.
    fn append_point(&mut self, label: &'static [u8], point: &CompressedRistretto);

    /// Check that a point is not the identity, then append it to the
    /// transcript.  Otherwise, return an error.
    fn validate_and_append_point(
        &mut self,
        label: &'static [u8],
        point: &CompressedRistretto,
    ) -> ProofResult<()>;

    /// Compute a `label`ed challenge variable.
    fn challenge_scalar(&mut self, label: &'static [u8]) -> Scalar;
}

impl TranscriptProtocol for Transcript {
    fn sigma_proof_domain_sep(&mut self, n: u64, m: u64, set_hash: &[u8; 32]) {
        self.append_message(b"dom-sep", b"sigma-proof v1");
        self.append_u64(b"n", n);
        self.append_u64(b"m", m);
        self.append_message(b"set-hash", set_hash);
    }

    fn digit_proof_domain_sep(&mut self, n: u64, m: u64) {
        self.append_message(b"dom-sep", b"digit-proof v1");
        self.append_u64(b"n", n);
        self.append_u64(b"m", m);
    }

    fn range_proof_domain_sep(&mut self, n: u64, m: u64) {
        self.append_message(b"dom-sep", b"range-proof v1");
        self.append_u64(b"n", n);
        self.append_u64(b"m", m);
    }

    fn inner_product_domain_sep(&mut self, n: u64) {
        self.append_message(b"dom-sep", b"ipp v1");
        self.append_u64(b"n", n);
    }

    fn schnorr_proof_domain_sep(&mut self) {
        self.append_message(b"dom-sep", b"schnorr-proof v1");
    }

    fn joinsplit_domain_sep(&mut self, inputs: u64, outputs: u64) {
        self.append_message(b"dom-sep", b"lelantus-joinsplit v1");
        self.append_u64(b"inputs", inputs);
        self.append_u64(b"outputs", outputs);
    }

    fn append_scalar(&mut self, label: &'static [u8], scalar: &Scalar) {
        self.append_message(label, scalar.as_bytes());
    }

    fn append_point(&mut self, label: &'static [u8], point: &CompressedRistretto) {
        self.append_message(label, point.as_bytes());
    }

    fn validate_and_append_point(
        &mut self,
        label: &'static [u8],
        point: &CompressedRistretto,
    ) -> ProofResult<()> {
        use curve25519_dalek::traits::IsIdentity;

        if point.is_identity() {
            Err(ProofError::VerificationError)
        } else {
            self.append_message(label, point.as_bytes());
            Ok(())
        }
    }

    fn challenge_scalar(&mut self, label: &'static [u8]) -> Scalar {
        let mut buf = [0u8; 64];
        self.challenge_bytes(label, &mut buf);

        Scalar::from_bytes_mod_order_wide(&buf)
    }
}
