#![allow(non_snake_case)]
//! Aggregated range proof over coin commitments.
//!
//! Every commitment `V_j = v_j*h1 + s_j*g + r_j*h0` is a public coin, with the
//! value on `h1` and two blinding factors. The proof follows the aggregated
//! Bulletproof construction with a second blinding response `t_x_blinding_h0`
//! for the extra generator. The number of commitments is padded to a power of
//! two with commitments to zero under zero blinding, which are the identity.
use crate::coin::{PrivateCoin, PublicCoin};
use crate::errors::{ProofError, ProofResult};
use crate::inner_product::InnerProductProof;
use crate::params::Params;
use crate::transcript::TranscriptProtocol;
use crate::util::{exp_iter, inner_product, read_point, read_scalar, sum_of_powers};
use core::iter;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::{Identity, IsIdentity, MultiscalarMul, VartimeMultiscalarMul};
use merlin::Transcript;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeProof {
    /// Commitment to the bits of the values
    A: RistrettoPoint,
    /// Commitment to the blinding vectors
    S: RistrettoPoint,
    T_1: RistrettoPoint,
    T_2: RistrettoPoint,
    t_x: Scalar,
    t_x_blinding_g: Scalar,
    t_x_blinding_h0: Scalar,
    e_blinding: Scalar,
    ipp_proof: InnerProductProof,
}

impl RangeProof {
    /// Prove that the value of every coin lies in `[0, 2^range_bits)`. The
    /// statement is the list of the coins' public commitments.
    pub fn prove<R: RngCore + CryptoRng>(
        params: &Params,
        transcript: &mut Transcript,
        coins: &[PrivateCoin],
        rng: &mut R,
    ) -> ProofResult<RangeProof> {
        let bits = params.range_bits();
        if coins.iter().any(|c| bits < 64 && c.value() >> bits != 0) {
            return Err(ProofError::ValueOutOfRange);
        }
        let values = coins.iter().map(|c| c.value_scalar()).collect::<Vec<_>>();
        let serials = coins.iter().map(|c| *c.serial_number()).collect::<Vec<_>>();
        let randomness = coins.iter().map(|c| *c.randomness()).collect::<Vec<_>>();
        RangeProof::prove_openings(params, transcript, &values, &serials, &randomness, rng)
    }

    // Values are taken as scalars so that out of range openings can be
    // exercised. Only the low `range_bits` bits of each value are committed
    // in `A`.
    pub(crate) fn prove_openings<R: RngCore + CryptoRng>(
        params: &Params,
        transcript: &mut Transcript,
        values: &[Scalar],
        serials: &[Scalar],
        randomness: &[Scalar],
        rng: &mut R,
    ) -> ProofResult<RangeProof> {
        if values.is_empty() || values.len() != serials.len() || values.len() != randomness.len() {
            return Err(ProofError::InvalidInputLength);
        }
        let m = padded_len(params, values.len())?;
        let n = params.range_bits();
        let nm = n * m;
        let (G_vec, H_vec) = params.bulletproof_gens(m);

        let pad = |v: &[Scalar]| -> Vec<Scalar> {
            v.iter()
                .copied()
                .chain(iter::repeat(Scalar::ZERO))
                .take(m)
                .collect()
        };
        let (values, serials, randomness) = (pad(values), pad(serials), pad(randomness));
        let commitments = values
            .iter()
            .zip(serials.iter().zip(randomness.iter()))
            .map(|(v, (s, r))| params.double_commit(s, v, r))
            .collect::<Vec<_>>();

        transcript.range_proof_domain_sep(n as u64, m as u64);
        for V in &commitments {
            transcript.append_point(b"V", &V.compress());
        }

        let mut rng = {
            let mut builder = transcript.build_rng();
            for (v, r) in values.iter().zip(randomness.iter()) {
                builder = builder.rekey_with_witness_bytes(b"v", v.as_bytes());
                builder = builder.rekey_with_witness_bytes(b"r", r.as_bytes());
            }
            builder.finalize(rng)
        };

        // a_L holds the bits of every value, a_R = a_L - 1
        let a_L = values
            .iter()
            .flat_map(|v| {
                let bytes = v.to_bytes();
                (0..n).map(move |i| Scalar::from((bytes[i / 8] >> (i % 8)) & 1))
            })
            .collect::<Vec<Scalar>>();
        let a_R = a_L.iter().map(|a| a - Scalar::ONE).collect::<Vec<_>>();

        let a_blinding = Scalar::random(&mut rng);
        let s_blinding = Scalar::random(&mut rng);
        let s_L = (0..nm).map(|_| Scalar::random(&mut rng)).collect::<Vec<_>>();
        let s_R = (0..nm).map(|_| Scalar::random(&mut rng)).collect::<Vec<_>>();

        let A = RistrettoPoint::multiscalar_mul(
            iter::once(&a_blinding).chain(a_L.iter()).chain(a_R.iter()),
            iter::once(params.h0()).chain(G_vec.iter()).chain(H_vec.iter()),
        );
        let S = RistrettoPoint::multiscalar_mul(
            iter::once(&s_blinding).chain(s_L.iter()).chain(s_R.iter()),
            iter::once(params.h0()).chain(G_vec.iter()).chain(H_vec.iter()),
        );

        transcript.validate_and_append_point(b"A", &A.compress())?;
        transcript.validate_and_append_point(b"S", &S.compress())?;

        let y = transcript.challenge_scalar(b"y");
        let z = transcript.challenge_scalar(b"z");

        // l(x) = l_0 + l_1*x and r(x) = r_0 + r_1*x
        let mut l_0 = Vec::with_capacity(nm);
        let mut r_0 = Vec::with_capacity(nm);
        let mut r_1 = Vec::with_capacity(nm);
        let mut exp_y = Scalar::ONE;
        let mut exp_z = z * z;
        let mut i = 0;
        for _ in 0..m {
            let mut exp_2 = Scalar::ONE;
            for _ in 0..n {
                l_0.push(a_L[i] - z);
                r_0.push(exp_y * (a_R[i] + z) + exp_z * exp_2);
                r_1.push(exp_y * s_R[i]);

                exp_y *= y;
                exp_2 = exp_2 + exp_2;
                i += 1;
            }
            exp_z *= z;
        }
        let l_1 = s_L;

        let t_1 = inner_product(&l_0, &r_1) + inner_product(&l_1, &r_0);
        let t_2 = inner_product(&l_1, &r_1);

        let t_1_blinding_g = Scalar::random(&mut rng);
        let t_1_blinding_h0 = Scalar::random(&mut rng);
        let t_2_blinding_g = Scalar::random(&mut rng);
        let t_2_blinding_h0 = Scalar::random(&mut rng);
        let T_1 = params.double_commit(&t_1_blinding_g, &t_1, &t_1_blinding_h0);
        let T_2 = params.double_commit(&t_2_blinding_g, &t_2, &t_2_blinding_h0);

        transcript.validate_and_append_point(b"T_1", &T_1.compress())?;
        transcript.validate_and_append_point(b"T_2", &T_2.compress())?;

        let x = transcript.challenge_scalar(b"x");

        let l_vec = l_0
            .iter()
            .zip(l_1.iter())
            .map(|(l_0, l_1)| l_0 + l_1 * x)
            .collect::<Vec<_>>();
        let r_vec = r_0
            .iter()
            .zip(r_1.iter())
            .map(|(r_0, r_1)| r_0 + r_1 * x)
            .collect::<Vec<_>>();
        let t_x = inner_product(&l_vec, &r_vec);

        // Each commitment enters the check weighted by z^(2+j)
        let z_weights = exp_iter(z).skip(2).take(m).collect::<Vec<_>>();
        let t_x_blinding_g =
            inner_product(&z_weights, &serials) + x * t_1_blinding_g + x * x * t_2_blinding_g;
        let t_x_blinding_h0 =
            inner_product(&z_weights, &randomness) + x * t_1_blinding_h0 + x * x * t_2_blinding_h0;
        let e_blinding = a_blinding + x * s_blinding;

        transcript.append_scalar(b"t_x", &t_x);
        transcript.append_scalar(b"t_x_blinding_g", &t_x_blinding_g);
        transcript.append_scalar(b"t_x_blinding_h0", &t_x_blinding_h0);
        transcript.append_scalar(b"e_blinding", &e_blinding);

        let w = transcript.challenge_scalar(b"w");
        let Q = w * params.h1();

        // H'_i = y^-i * H_i
        let H_prime = H_vec
            .iter()
            .zip(exp_iter(y.invert()))
            .map(|(H, y_inv)| y_inv * H)
            .collect::<Vec<_>>();
        let ipp_proof =
            InnerProductProof::create(transcript, &Q, G_vec.to_vec(), H_prime, l_vec, r_vec)?;

        // Keep the transcript in step with the verifier
        batch_challenge(transcript, &ipp_proof);

        Ok(RangeProof {
            A,
            S,
            T_1,
            T_2,
            t_x,
            t_x_blinding_g,
            t_x_blinding_h0,
            e_blinding,
            ipp_proof,
        })
    }

    /// Verify the proof against the given coin commitments.
    pub fn verify(
        &self,
        params: &Params,
        transcript: &mut Transcript,
        commitments: &[PublicCoin],
    ) -> ProofResult<()> {
        if commitments.is_empty() {
            return Err(ProofError::InvalidInputLength);
        }
        let m = padded_len(params, commitments.len())?;
        let n = params.range_bits();
        let nm = n * m;
        let (G_vec, H_vec) = params.bulletproof_gens(m);

        let commitments = commitments
            .iter()
            .map(|c| *c.value())
            .chain(iter::repeat(RistrettoPoint::identity()))
            .take(m)
            .collect::<Vec<_>>();

        transcript.range_proof_domain_sep(n as u64, m as u64);
        for V in &commitments {
            transcript.append_point(b"V", &V.compress());
        }

        transcript.validate_and_append_point(b"A", &self.A.compress())?;
        transcript.validate_and_append_point(b"S", &self.S.compress())?;

        let y = transcript.challenge_scalar(b"y");
        let z = transcript.challenge_scalar(b"z");
        let zz = z * z;
        let minus_z = -z;

        transcript.validate_and_append_point(b"T_1", &self.T_1.compress())?;
        transcript.validate_and_append_point(b"T_2", &self.T_2.compress())?;

        let x = transcript.challenge_scalar(b"x");

        transcript.append_scalar(b"t_x", &self.t_x);
        transcript.append_scalar(b"t_x_blinding_g", &self.t_x_blinding_g);
        transcript.append_scalar(b"t_x_blinding_h0", &self.t_x_blinding_h0);
        transcript.append_scalar(b"e_blinding", &self.e_blinding);

        let w = transcript.challenge_scalar(b"w");

        let (x_sq, x_inv_sq, s) = self.ipp_proof.verification_scalars(nm, transcript)?;
        let s_inv = s.iter().rev();

        // Combines the polynomial check with the inner product check
        let c = batch_challenge(transcript, &self.ipp_proof);

        let a = self.ipp_proof.a();
        let b = self.ipp_proof.b();

        // z^0 * 2^n || z^1 * 2^n || ... || z^(m-1) * 2^n
        let powers_of_2 = exp_iter(Scalar::from(2u64)).take(n).collect::<Vec<_>>();
        let concat_z_and_2 = exp_iter(z)
            .take(m)
            .flat_map(|exp_z| powers_of_2.iter().map(move |exp_2| exp_2 * exp_z))
            .collect::<Vec<_>>();

        let g = s.iter().map(|s_i| minus_z - a * s_i);
        let h = s_inv
            .zip(exp_iter(y.invert()))
            .zip(concat_z_and_2.iter())
            .map(|((s_i_inv, exp_y_inv), z_and_2)| z + exp_y_inv * (zz * z_and_2 - b * s_i_inv));

        let value_commitment_scalars = exp_iter(z).take(m).map(|z_exp| c * zz * z_exp);
        let h1_scalar = w * (self.t_x - a * b) + c * (delta(n, m, &y, &z) - self.t_x);

        let mega_check = RistrettoPoint::vartime_multiscalar_mul(
            iter::once(Scalar::ONE)
                .chain(iter::once(x))
                .chain(iter::once(c * x))
                .chain(iter::once(c * x * x))
                .chain(x_sq.iter().cloned())
                .chain(x_inv_sq.iter().cloned())
                .chain(iter::once(-self.e_blinding - c * self.t_x_blinding_h0))
                .chain(iter::once(-c * self.t_x_blinding_g))
                .chain(iter::once(h1_scalar))
                .chain(g)
                .chain(h)
                .chain(value_commitment_scalars),
            iter::once(&self.A)
                .chain(iter::once(&self.S))
                .chain(iter::once(&self.T_1))
                .chain(iter::once(&self.T_2))
                .chain(self.ipp_proof.L_vec().iter())
                .chain(self.ipp_proof.R_vec().iter())
                .chain(iter::once(params.h0()))
                .chain(iter::once(params.g()))
                .chain(iter::once(params.h1()))
                .chain(G_vec.iter())
                .chain(H_vec.iter())
                .chain(commitments.iter()),
        );

        if mega_check.is_identity() {
            Ok(())
        } else {
            Err(ProofError::VerificationFailed)
        }
    }

    /// Serializes the proof into `2*lg(n) + 10` 32-byte elements, where `n`
    /// is the total number of proven bits.
    ///
    /// The layout is four points `A, S, T_1, T_2`, four scalars `t_x`,
    /// `t_x_blinding_g`, `t_x_blinding_h0`, `e_blinding`, then the inner
    /// product proof.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 * 32 + self.ipp_proof.serialized_size());
        buf.extend_from_slice(self.A.compress().as_bytes());
        buf.extend_from_slice(self.S.compress().as_bytes());
        buf.extend_from_slice(self.T_1.compress().as_bytes());
        buf.extend_from_slice(self.T_2.compress().as_bytes());
        buf.extend_from_slice(self.t_x.as_bytes());
        buf.extend_from_slice(self.t_x_blinding_g.as_bytes());
        buf.extend_from_slice(self.t_x_blinding_h0.as_bytes());
        buf.extend_from_slice(self.e_blinding.as_bytes());
        buf.extend(self.ipp_proof.to_bytes());
        buf
    }

    pub fn from_bytes(slice: &[u8]) -> ProofResult<RangeProof> {
        if slice.len() % 32 != 0 || slice.len() < 8 * 32 {
            return Err(ProofError::FormatError);
        }
        Ok(RangeProof {
            A: read_point(&slice[0..32])?,
            S: read_point(&slice[32..64])?,
            T_1: read_point(&slice[64..96])?,
            T_2: read_point(&slice[96..128])?,
            t_x: read_scalar(&slice[128..160])?,
            t_x_blinding_g: read_scalar(&slice[160..192])?,
            t_x_blinding_h0: read_scalar(&slice[192..224])?,
            e_blinding: read_scalar(&slice[224..256])?,
            ipp_proof: InnerProductProof::from_bytes(&slice[256..])?,
        })
    }
}

fn padded_len(params: &Params, len: usize) -> ProofResult<usize> {
    if len > params.max_outputs() {
        return Err(ProofError::TooManyOutputs);
    }
    Ok(len.next_power_of_two())
}

fn batch_challenge(transcript: &mut Transcript, ipp_proof: &InnerProductProof) -> Scalar {
    transcript.append_scalar(b"a", ipp_proof.a());
    transcript.append_scalar(b"b", ipp_proof.b());
    transcript.challenge_scalar(b"c")
}

/// Compute
/// `delta(y,z) = (z - z^2) * <1, y^(n*m)> - sum_{j=0}^{m-1} z^(j+3) * <1, 2^n>`
fn delta(n: usize, m: usize, y: &Scalar, z: &Scalar) -> Scalar {
    let sum_y = sum_of_powers(y, n * m);
    let sum_2 = sum_of_powers(&Scalar::from(2u64), n);
    let sum_z = sum_of_powers(z, m);

    (z - z * z) * sum_y - z * z * z * sum_2 * sum_z
}
