#![allow(non_snake_case)]
//! Logarithmic inner product argument, used to compress range proofs.
use crate::errors::{ProofError, ProofResult};
use crate::transcript::TranscriptProtocol;
use crate::util::{inner_product, read_point, read_scalar};
use core::iter;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::MultiscalarMul;
use merlin::Transcript;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnerProductProof {
    L_vec: Vec<RistrettoPoint>,
    R_vec: Vec<RistrettoPoint>,
    a: Scalar,
    b: Scalar,
}

impl InnerProductProof {
    /// Prove knowledge of `a_vec` and `b_vec` such that
    /// `P = <a_vec, G_vec> + <b_vec, H_vec> + <a_vec, b_vec>*Q`.
    ///
    /// Any weighting of the generators must already be applied. All vectors
    /// must share one power of two length.
    pub(crate) fn create(
        transcript: &mut Transcript,
        Q: &RistrettoPoint,
        mut G_vec: Vec<RistrettoPoint>,
        mut H_vec: Vec<RistrettoPoint>,
        mut a_vec: Vec<Scalar>,
        mut b_vec: Vec<Scalar>,
    ) -> ProofResult<InnerProductProof> {
        let mut n = G_vec.len();
        if !n.is_power_of_two() || H_vec.len() != n || a_vec.len() != n || b_vec.len() != n {
            return Err(ProofError::InvalidInputLength);
        }

        transcript.inner_product_domain_sep(n as u64);

        let lg_n = n.trailing_zeros() as usize;
        let mut L_vec = Vec::with_capacity(lg_n);
        let mut R_vec = Vec::with_capacity(lg_n);

        while n != 1 {
            n /= 2;
            let (a_L, a_R) = a_vec.split_at_mut(n);
            let (b_L, b_R) = b_vec.split_at_mut(n);
            let (G_L, G_R) = G_vec.split_at_mut(n);
            let (H_L, H_R) = H_vec.split_at_mut(n);

            let c_L = inner_product(a_L, b_R);
            let c_R = inner_product(a_R, b_L);

            let L = RistrettoPoint::multiscalar_mul(
                a_L.iter().chain(b_R.iter()).chain(iter::once(&c_L)),
                G_R.iter().chain(H_L.iter()).chain(iter::once(Q)),
            );
            let R = RistrettoPoint::multiscalar_mul(
                a_R.iter().chain(b_L.iter()).chain(iter::once(&c_R)),
                G_L.iter().chain(H_R.iter()).chain(iter::once(Q)),
            );

            transcript.validate_and_append_point(b"L", &L.compress())?;
            transcript.validate_and_append_point(b"R", &R.compress())?;
            L_vec.push(L);
            R_vec.push(R);

            let u = transcript.challenge_scalar(b"u");
            let u_inv = u.invert();

            for i in 0..n {
                a_L[i] = a_L[i] * u + u_inv * a_R[i];
                b_L[i] = b_L[i] * u_inv + u * b_R[i];
                G_L[i] = RistrettoPoint::multiscalar_mul(&[u_inv, u], &[G_L[i], G_R[i]]);
                H_L[i] = RistrettoPoint::multiscalar_mul(&[u, u_inv], &[H_L[i], H_R[i]]);
            }

            a_vec.truncate(n);
            b_vec.truncate(n);
            G_vec.truncate(n);
            H_vec.truncate(n);
        }

        Ok(InnerProductProof {
            L_vec,
            R_vec,
            a: a_vec[0],
            b: b_vec[0],
        })
    }

    pub(crate) fn a(&self) -> &Scalar {
        &self.a
    }

    pub(crate) fn b(&self) -> &Scalar {
        &self.b
    }

    pub(crate) fn L_vec(&self) -> &[RistrettoPoint] {
        &self.L_vec
    }

    pub(crate) fn R_vec(&self) -> &[RistrettoPoint] {
        &self.R_vec
    }

    /// Replay the challenges of a proof over vectors of length `n` and return
    /// `(u^2, u^-2, s)`, where `s` are the coefficients of the folded `G`
    /// generators. The folded `H` coefficients are `s` reversed.
    pub(crate) fn verification_scalars(
        &self,
        n: usize,
        transcript: &mut Transcript,
    ) -> ProofResult<(Vec<Scalar>, Vec<Scalar>, Vec<Scalar>)> {
        let lg_n = self.L_vec.len();
        if lg_n >= 32 || !n.is_power_of_two() || n != 1 << lg_n || self.R_vec.len() != lg_n {
            return Err(ProofError::InvalidProofSize);
        }

        transcript.inner_product_domain_sep(n as u64);

        let mut challenges = Vec::with_capacity(lg_n);
        for (L, R) in self.L_vec.iter().zip(self.R_vec.iter()) {
            transcript.validate_and_append_point(b"L", &L.compress())?;
            transcript.validate_and_append_point(b"R", &R.compress())?;
            challenges.push(transcript.challenge_scalar(b"u"));
        }

        let mut challenges_inv = challenges.clone();
        let allinv = Scalar::batch_invert(&mut challenges_inv);

        let challenges_sq = challenges.iter().map(|u| u * u).collect::<Vec<_>>();
        let challenges_inv_sq = challenges_inv.iter().map(|u| u * u).collect::<Vec<_>>();

        // s_i is the product of u_j^{+-1} chosen by the bits of i, built
        // from s_{i - 2^lg(i)} with the challenges stored in creation order
        let mut s = Vec::with_capacity(n);
        s.push(allinv);
        for i in 1..n {
            let lg_i = (usize::BITS - 1 - i.leading_zeros()) as usize;
            let k = 1 << lg_i;
            let u_lg_i_sq = challenges_sq[(lg_n - 1) - lg_i];
            s.push(s[i - k] * u_lg_i_sq);
        }

        Ok((challenges_sq, challenges_inv_sq, s))
    }

    /// Encoded size in bytes.
    pub fn serialized_size(&self) -> usize {
        (self.L_vec.len() * 2 + 2) * 32
    }

    /// `L_0, R_0, ..., L_{k-1}, R_{k-1}, a, b`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.serialized_size());
        for (L, R) in self.L_vec.iter().zip(self.R_vec.iter()) {
            buf.extend_from_slice(L.compress().as_bytes());
            buf.extend_from_slice(R.compress().as_bytes());
        }
        buf.extend_from_slice(self.a.as_bytes());
        buf.extend_from_slice(self.b.as_bytes());
        buf
    }

    pub fn from_bytes(slice: &[u8]) -> ProofResult<InnerProductProof> {
        let b = slice.len();
        if b % 32 != 0 {
            return Err(ProofError::FormatError);
        }
        let num_elements = b / 32;
        if num_elements < 2 || num_elements % 2 != 0 {
            return Err(ProofError::FormatError);
        }
        let lg_n = (num_elements - 2) / 2;
        if lg_n >= 32 {
            return Err(ProofError::FormatError);
        }

        let mut L_vec = Vec::with_capacity(lg_n);
        let mut R_vec = Vec::with_capacity(lg_n);
        for i in 0..lg_n {
            let pos = 2 * i * 32;
            L_vec.push(read_point(&slice[pos..pos + 32])?);
            R_vec.push(read_point(&slice[pos + 32..pos + 64])?);
        }

        let pos = 2 * lg_n * 32;
        let a = read_scalar(&slice[pos..pos + 32])?;
        let b = read_scalar(&slice[pos + 32..pos + 64])?;

        Ok(InnerProductProof { L_vec, R_vec, a, b })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{Params, ParamsConfig};
    use crate::util::exp_iter;
    use curve25519_dalek::traits::{IsIdentity, VartimeMultiscalarMul};
    use rand::rngs::OsRng;

    // Check P + sum u^2 L + sum u^-2 R == a*<s, G> + b*<s^-1, H> + a*b*Q
    fn verify(
        proof: &InnerProductProof,
        transcript: &mut Transcript,
        P: &RistrettoPoint,
        Q: &RistrettoPoint,
        G: &[RistrettoPoint],
        H: &[RistrettoPoint],
    ) -> ProofResult<()> {
        let (u_sq, u_inv_sq, s) = proof.verification_scalars(G.len(), transcript)?;
        let g = s.iter().map(|s_i| -(proof.a * s_i));
        let h = s.iter().rev().map(|s_i_inv| -(proof.b * s_i_inv));
        let check = RistrettoPoint::vartime_multiscalar_mul(
            iter::once(Scalar::ONE)
                .chain(u_sq.into_iter())
                .chain(u_inv_sq.into_iter())
                .chain(iter::once(-(proof.a * proof.b)))
                .chain(g)
                .chain(h),
            iter::once(P)
                .chain(proof.L_vec.iter())
                .chain(proof.R_vec.iter())
                .chain(iter::once(Q))
                .chain(G.iter())
                .chain(H.iter()),
        );
        if check.is_identity() {
            Ok(())
        } else {
            Err(ProofError::VerificationFailed)
        }
    }

    fn test_helper_create(n: usize) {
        let params = Params::new(ParamsConfig::new(2, 2)).unwrap();
        let (G, H) = params.bulletproof_gens(params.max_outputs());
        let G = G[..n].to_vec();

        // Weight H as the range proof does
        let y_inv = Scalar::random(&mut OsRng);
        let H = H[..n]
            .iter()
            .zip(exp_iter(y_inv))
            .map(|(H, y)| y * H)
            .collect::<Vec<_>>();
        let Q = RistrettoPoint::random(&mut OsRng);

        let a = (0..n).map(|_| Scalar::random(&mut OsRng)).collect::<Vec<_>>();
        let b = (0..n).map(|_| Scalar::random(&mut OsRng)).collect::<Vec<_>>();
        let c = inner_product(&a, &b);
        let P = RistrettoPoint::vartime_multiscalar_mul(
            a.iter().chain(b.iter()).chain(iter::once(&c)),
            G.iter().chain(H.iter()).chain(iter::once(&Q)),
        );

        let t = Transcript::new(b"innerproducttest");
        let proof = InnerProductProof::create(
            &mut t.clone(),
            &Q,
            G.clone(),
            H.clone(),
            a.clone(),
            b.clone(),
        )
        .unwrap();
        assert_eq!(proof.L_vec.len(), n.trailing_zeros() as usize);
        assert!(verify(&proof, &mut t.clone(), &P, &Q, &G, &H).is_ok());

        let decoded = InnerProductProof::from_bytes(&proof.to_bytes()).unwrap();
        assert_eq!(decoded, proof);
        assert_eq!(proof.to_bytes().len(), proof.serialized_size());

        // A different inner product
        let P2 = P + Q;
        assert_eq!(
            verify(&proof, &mut t.clone(), &P2, &Q, &G, &H).unwrap_err(),
            ProofError::VerificationFailed
        );
    }

    #[test]
    fn make_ipp_1() {
        test_helper_create(1);
    }

    #[test]
    fn make_ipp_2() {
        test_helper_create(2);
    }

    #[test]
    fn make_ipp_4() {
        test_helper_create(4);
    }

    #[test]
    fn make_ipp_64() {
        test_helper_create(64);
    }

    #[test]
    fn make_ipp_128() {
        test_helper_create(128);
    }

    #[test]
    fn bad_lengths() {
        let t = Transcript::new(b"innerproducttest");
        let Q = RistrettoPoint::random(&mut OsRng);
        let G = (0..3).map(|_| RistrettoPoint::random(&mut OsRng)).collect::<Vec<_>>();
        let s = vec![Scalar::ONE; 3];
        assert_eq!(
            InnerProductProof::create(&mut t.clone(), &Q, G.clone(), G, s.clone(), s).unwrap_err(),
            ProofError::InvalidInputLength
        );
        assert_eq!(
            InnerProductProof::from_bytes(&[0u8; 33]).unwrap_err(),
            ProofError::FormatError
        );
        assert_eq!(
            InnerProductProof::from_bytes(&[0u8; 96]).unwrap_err(),
            ProofError::FormatError
        );
    }
}
