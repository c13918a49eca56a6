#![allow(non_snake_case)]
use crate::coin::{set_hash, PrivateCoin, PublicCoin};
use crate::errors::{ProofError, ProofResult};
use crate::params::Params;
use crate::transcript::TranscriptProtocol;
use crate::util::{delta, digits, exp_iter, scalar_exp};
use core::borrow::Borrow;
use core::iter;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::{IsIdentity, MultiscalarMul, VartimeMultiscalarMul};
use merlin::Transcript;
use polynomials::Polynomial;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// A digit commitment proof. This is used as part of a [`SigmaProof`] and not
/// meant for use on its own. A zero knowledge proof that the prover knows the
/// openings of commitments to the base `n` digits of its index, one indicator
/// per digit value and level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitProof {
    A: RistrettoPoint,
    C: RistrettoPoint,
    D: RistrettoPoint,
    f: Vec<Scalar>,
    z_A: Scalar,
    z_C: Scalar,
}

/// A zero knowledge proof of membership in a set of coins. A prover can
/// convince a verifier that it knows the index and the opening of one coin
/// within the set, and that this coin carries a given serial number, without
/// revealing the coin or its location within the set.
///
/// Besides the index argument, the proof carries the double blinded
/// responses `z_V` and `z_R`. Together with the `Q_k` commitments they let a
/// join-split tie the hidden value of the spent coin into a balance equation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigmaProof {
    B: RistrettoPoint,
    digit_proof: DigitProof,
    G_k: Vec<RistrettoPoint>,
    Q_k: Vec<RistrettoPoint>,
    z_V: Scalar,
    z_R: Scalar,
}

/// Prover state between the commitment round and the response round of a
/// [`SigmaProof`]. Holds secrets; it should be consumed by
/// [`SigmaCommitment::respond`] once the challenge is known.
pub struct SigmaCommitment {
    n: usize,
    m: usize,
    value: Scalar,
    randomness: Scalar,
    sigma: Vec<Scalar>,
    a: Vec<Scalar>,
    r_A: Scalar,
    r_B: Scalar,
    r_C: Scalar,
    r_D: Scalar,
    rho: Vec<Scalar>,
    tau: Vec<Scalar>,
    gamma: Vec<Scalar>,
    A: RistrettoPoint,
    B: RistrettoPoint,
    C: RistrettoPoint,
    D: RistrettoPoint,
    G_k: Vec<RistrettoPoint>,
    Q_k: Vec<RistrettoPoint>,
}

impl SigmaCommitment {
    /// Append every commitment of this round to `transcript`.
    pub fn append_to_transcript(&self, transcript: &mut Transcript) -> ProofResult<()> {
        append_commitments(
            transcript,
            self.n,
            self.m,
            &self.A,
            &self.B,
            &self.C,
            &self.D,
            &self.G_k,
            &self.Q_k,
        )
    }

    /// Blinding factors of the `Q_k` commitments on `h0`. A join-split needs
    /// them to open its balance relation.
    pub fn gamma(&self) -> &[Scalar] {
        &self.gamma
    }

    /// Compute the responses to challenge `x`.
    pub fn respond(self, x: &Scalar) -> SigmaProof {
        let n = self.n;
        let f = (0..self.m)
            .flat_map(|j| (1..n).map(move |i| j * n + i))
            .map(|idx| self.sigma[idx] * x + self.a[idx])
            .collect();
        let z_A = self.r_B * x + self.r_A;
        let z_C = self.r_C * x + self.r_D;

        let x_m = scalar_exp(*x, self.m);
        let x_k = exp_iter(*x).take(self.m).collect::<Vec<_>>();
        let z_V = self.value * x_m
            - x_k
                .iter()
                .zip(self.rho.iter())
                .map(|(x, rho)| x * rho)
                .sum::<Scalar>();
        let z_R = self.randomness * x_m
            - x_k
                .iter()
                .zip(self.tau.iter().zip(self.gamma.iter()))
                .map(|(x, (tau, gamma))| x * (tau + gamma))
                .sum::<Scalar>();

        SigmaProof {
            B: self.B,
            digit_proof: DigitProof {
                A: self.A,
                C: self.C,
                D: self.D,
                f,
                z_A,
                z_C,
            },
            G_k: self.G_k,
            Q_k: self.Q_k,
            z_V,
            z_R,
        }
    }
}

impl SigmaProof {
    /// Append every commitment of this proof to `transcript`, rejecting the
    /// identity.
    pub fn append_to_transcript(
        &self,
        params: &Params,
        transcript: &mut Transcript,
    ) -> ProofResult<()> {
        if self.G_k.len() != params.sigma_m() || self.Q_k.len() != params.sigma_m() {
            return Err(ProofError::InvalidProofSize);
        }
        append_commitments(
            transcript,
            params.sigma_n(),
            params.sigma_m(),
            &self.digit_proof.A,
            &self.B,
            &self.digit_proof.C,
            &self.digit_proof.D,
            &self.G_k,
            &self.Q_k,
        )
    }

    pub fn Q_k(&self) -> &[RistrettoPoint] {
        &self.Q_k
    }

    pub fn z_V(&self) -> &Scalar {
        &self.z_V
    }

    pub fn z_R(&self) -> &Scalar {
        &self.z_R
    }

    fn check_shape(&self, params: &Params) -> ProofResult<()> {
        let (n, m) = (params.sigma_n(), params.sigma_m());
        if self.digit_proof.f.len() != m * (n - 1) || self.G_k.len() != m || self.Q_k.len() != m {
            return Err(ProofError::InvalidProofSize);
        }
        let points = [&self.B, &self.digit_proof.A, &self.digit_proof.C, &self.digit_proof.D];
        if points
            .into_iter()
            .chain(self.G_k.iter())
            .chain(self.Q_k.iter())
            .any(|P| P.is_identity())
        {
            return Err(ProofError::VerificationError);
        }
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn append_commitments(
    transcript: &mut Transcript,
    n: usize,
    m: usize,
    A: &RistrettoPoint,
    B: &RistrettoPoint,
    C: &RistrettoPoint,
    D: &RistrettoPoint,
    G_k: &[RistrettoPoint],
    Q_k: &[RistrettoPoint],
) -> ProofResult<()> {
    transcript.digit_proof_domain_sep(n as u64, m as u64);
    transcript.validate_and_append_point(b"A", &A.compress())?;
    transcript.validate_and_append_point(b"B", &B.compress())?;
    transcript.validate_and_append_point(b"C", &C.compress())?;
    transcript.validate_and_append_point(b"D", &D.compress())?;
    for G in G_k {
        transcript.validate_and_append_point(b"G_k", &G.compress())?;
    }
    for Q in Q_k {
        transcript.validate_and_append_point(b"Q_k", &Q.compress())?;
    }
    Ok(())
}

pub trait OneOfManyProofs {
    //! Trait for computing and verifying one-of-many membership proofs over a
    //! set of coins. A prover should know the opening of one coin in the set
    //! and the index of that coin within the set. The serial number of that
    //! coin is public, and the proof shows that the hidden coin carries it.
    //!
    //! Sets smaller than `n^m` are padded by repeating their last member, so
    //! any set of `1..=n^m` coins is accepted.
    //!
    //! ```
    //! # use rand::rngs::OsRng;
    //! # use lelantus::coin::PrivateCoin;
    //! # use lelantus::params::{Params, ParamsConfig};
    //! # use lelantus::sigma::OneOfManyProofs;
    //! # use merlin::Transcript;
    //! let params = Params::new(ParamsConfig::new(3, 2)).unwrap();
    //!
    //! // A set of 7 coins, the prover owns the coin at index 4
    //! let coins = (0..7)
    //!     .map(|v| PrivateCoin::mint(&params, v, &mut OsRng))
    //!     .collect::<Vec<_>>();
    //! let set = coins.iter().map(|c| *c.public_coin()).collect::<Vec<_>>();
    //!
    //! let t = Transcript::new(b"doctest example");
    //! let proof = set.prove(&params, &mut t.clone(), 4, &coins[4]).unwrap();
    //!
    //! // The verifier learns the serial number, but not the index
    //! let serial = coins[4].serial_number();
    //! assert!(set.verify(&params, &mut t.clone(), serial, &proof).is_ok());
    //! ```

    /// Prove knowledge of the coin at index `l`, with its own challenge. The
    /// transcript is bound to the set hash and to the serial number.
    fn prove(
        &self,
        params: &Params,
        transcript: &mut Transcript,
        l: usize,
        coin: &PrivateCoin,
    ) -> ProofResult<SigmaProof>;

    /// Verify a proof from [`OneOfManyProofs::prove`].
    fn verify(
        &self,
        params: &Params,
        transcript: &mut Transcript,
        serial: &Scalar,
        proof: &SigmaProof,
    ) -> ProofResult<()>;

    /// First round of a proof whose challenge is shared with other proofs.
    /// Commitments must be appended to the shared transcript with
    /// [`SigmaCommitment::append_to_transcript`] before the challenge is drawn.
    fn commit<R: RngCore + CryptoRng>(
        &self,
        params: &Params,
        l: usize,
        coin: &PrivateCoin,
        rng: &mut R,
    ) -> ProofResult<SigmaCommitment>;

    /// Verify a single proof against an externally derived challenge `x`.
    fn verify_with_challenge(
        &self,
        params: &Params,
        x: &Scalar,
        serial: &Scalar,
        proof: &SigmaProof,
    ) -> ProofResult<()>;

    /// Batch verification of several proofs over this set sharing challenge
    /// `x`. The random weights of the batch are drawn from `transcript`.
    fn verify_batch_with_challenge(
        &self,
        params: &Params,
        transcript: &mut Transcript,
        x: &Scalar,
        serials: &[Scalar],
        proofs: &[&SigmaProof],
    ) -> ProofResult<()>;
}

impl OneOfManyProofs for [PublicCoin] {
    fn prove(
        &self,
        params: &Params,
        transcript: &mut Transcript,
        l: usize,
        coin: &PrivateCoin,
    ) -> ProofResult<SigmaProof> {
        transcript.sigma_proof_domain_sep(
            params.sigma_n() as u64,
            params.sigma_m() as u64,
            &set_hash(self),
        );
        transcript.append_scalar(b"serial", coin.serial_number());

        // Create a `TranscriptRng` from the high-level witness data
        let mut rng = {
            let mut builder = transcript.build_rng();
            builder = builder.rekey_with_witness_bytes(b"l", Scalar::from(l as u64).as_bytes());
            builder = builder.rekey_with_witness_bytes(b"r", coin.randomness().as_bytes());

            use rand::thread_rng;
            builder.finalize(&mut thread_rng())
        };

        let commitment = self.commit(params, l, coin, &mut rng)?;
        commitment.append_to_transcript(transcript)?;
        let x = transcript.challenge_scalar(b"sigma-challenge");
        Ok(commitment.respond(&x))
    }

    fn verify(
        &self,
        params: &Params,
        transcript: &mut Transcript,
        serial: &Scalar,
        proof: &SigmaProof,
    ) -> ProofResult<()> {
        transcript.sigma_proof_domain_sep(
            params.sigma_n() as u64,
            params.sigma_m() as u64,
            &set_hash(self),
        );
        transcript.append_scalar(b"serial", serial);
        proof.append_to_transcript(params, transcript)?;
        let x = transcript.challenge_scalar(b"sigma-challenge");
        self.verify_with_challenge(params, &x, serial, proof)
    }

    fn commit<R: RngCore + CryptoRng>(
        &self,
        params: &Params,
        l: usize,
        coin: &PrivateCoin,
        rng: &mut R,
    ) -> ProofResult<SigmaCommitment> {
        let (n, m) = (params.sigma_n(), params.sigma_m());
        check_set_size(params, self.len())?;
        if l >= self.len() {
            return Err(ProofError::IndexOutOfBounds);
        }
        if !coin.opens(params, &self[l]) {
            return Err(ProofError::OpeningMismatch);
        }

        let l_j = digits(l, n, m);
        let sigma = (0..m)
            .flat_map(|j| (0..n).map(move |i| (j, i)))
            .map(|(j, i)| delta(l_j[j], i))
            .collect::<Vec<Scalar>>();

        // a_{j,0} balances each level so that the responses f_{j,0} can be
        // reconstructed by the verifier
        let mut a = Vec::with_capacity(n * m);
        for _ in 0..m {
            let a_ji = (1..n).map(|_| Scalar::random(rng)).collect::<Vec<_>>();
            a.push(-a_ji.iter().sum::<Scalar>());
            a.extend(a_ji);
        }

        let r_A = Scalar::random(rng);
        let r_B = Scalar::random(rng);
        let r_C = Scalar::random(rng);
        let r_D = Scalar::random(rng);
        let A = a.iter().commit(params, &r_A)?;
        let B = sigma.iter().commit(params, &r_B)?;
        let C = a
            .iter()
            .zip(sigma.iter())
            .map(|(a, s)| a * (Scalar::ONE - Scalar::from(2u32) * s))
            .commit(params, &r_C)?;
        let D = a.iter().map(|a| -a * a).commit(params, &r_D)?;

        let rho = (0..m).map(|_| Scalar::random(rng)).collect::<Vec<_>>();
        let tau = (0..m).map(|_| Scalar::random(rng)).collect::<Vec<_>>();
        let gamma = (0..m).map(|_| Scalar::random(rng)).collect::<Vec<_>>();

        // Coefficients p_{i,k} of every padded set member, folded onto the
        // coins they repeat
        let mut p_k = vec![vec![Scalar::ZERO; self.len()]; m];
        for i in 0..params.max_set_size() {
            let p_i = compute_p_i(&digits(i, n, m), &l_j, &a, n);
            let c = i.min(self.len() - 1);
            for (k, p) in p_i.into_iter().enumerate() {
                p_k[k][c] += p;
            }
        }
        let G_k = p_k
            .iter()
            .zip(tau.iter())
            .map(|(p, tau)| {
                RistrettoPoint::multiscalar_mul(
                    p.iter().chain(iter::once(tau)),
                    self.iter().map(|c| c.value()).chain(iter::once(params.h0())),
                )
            })
            .collect::<Vec<_>>();
        let Q_k = rho
            .iter()
            .zip(gamma.iter())
            .map(|(rho, gamma)| {
                RistrettoPoint::multiscalar_mul(&[*rho, *gamma], &[*params.h1(), *params.h0()])
            })
            .collect::<Vec<_>>();

        Ok(SigmaCommitment {
            n,
            m,
            value: coin.value_scalar(),
            randomness: *coin.randomness(),
            sigma,
            a,
            r_A,
            r_B,
            r_C,
            r_D,
            rho,
            tau,
            gamma,
            A,
            B,
            C,
            D,
            G_k,
            Q_k,
        })
    }

    fn verify_with_challenge(
        &self,
        params: &Params,
        x: &Scalar,
        serial: &Scalar,
        proof: &SigmaProof,
    ) -> ProofResult<()> {
        verify_weighted(self, params, x, &[*serial], &[proof], &[Scalar::ONE])
    }

    fn verify_batch_with_challenge(
        &self,
        params: &Params,
        transcript: &mut Transcript,
        x: &Scalar,
        serials: &[Scalar],
        proofs: &[&SigmaProof],
    ) -> ProofResult<()> {
        if serials.len() != proofs.len() {
            return Err(ProofError::InvalidInputLength);
        }
        transcript.append_u64(b"batch", proofs.len() as u64);
        let weights = proofs
            .iter()
            .map(|p| {
                transcript.append_scalar(b"z_V", &p.z_V);
                transcript.append_scalar(b"z_R", &p.z_R);
                transcript.challenge_scalar(b"sigma-batch-weight")
            })
            .collect::<Vec<_>>();
        verify_weighted(self, params, x, serials, proofs, &weights)
    }
}

fn check_set_size(params: &Params, size: usize) -> ProofResult<()> {
    if size == 0 {
        Err(ProofError::SetIsTooSmall)
    } else if size > params.max_set_size() {
        Err(ProofError::SetIsTooLarge)
    } else {
        Ok(())
    }
}

// Check relation R1 for one proof and return the full response vector,
// including the reconstructed f_{j,0}.
fn verify_digits(params: &Params, x: &Scalar, proof: &SigmaProof) -> ProofResult<Vec<Scalar>> {
    let n = params.sigma_n();
    let digit_proof = &proof.digit_proof;
    let f = digit_proof
        .f
        .chunks(n - 1)
        .flat_map(|f_j| iter::once(x - f_j.iter().sum::<Scalar>()).chain(f_j.iter().copied()))
        .collect::<Vec<Scalar>>();

    if x * proof.B + digit_proof.A != f.iter().commit(params, &digit_proof.z_A)? {
        return Err(ProofError::VerificationFailed);
    }
    let r1 = f.iter().map(|f| f * (x - f)).commit(params, &digit_proof.z_C)?;
    if x * digit_proof.C + digit_proof.D != r1 {
        return Err(ProofError::VerificationFailed);
    }
    Ok(f)
}

fn verify_weighted(
    coins: &[PublicCoin],
    params: &Params,
    x: &Scalar,
    serials: &[Scalar],
    proofs: &[&SigmaProof],
    weights: &[Scalar],
) -> ProofResult<()> {
    check_set_size(params, coins.len())?;
    if proofs.is_empty() || serials.len() != proofs.len() || weights.len() != proofs.len() {
        return Err(ProofError::InvalidInputLength);
    }
    for p in proofs {
        p.check_shape(params)?;
    }

    let m = params.sigma_m();
    let x_m = scalar_exp(*x, m);
    let x_k = exp_iter(*x).take(m).collect::<Vec<_>>();

    // Batch verification strategy inspired by https://eprint.iacr.org/2019/373.pdf
    let mut coin_coeffs = vec![Scalar::ZERO; coins.len()];
    let mut g_coeff = Scalar::ZERO;
    let mut h0_coeff = Scalar::ZERO;
    let mut h1_coeff = Scalar::ZERO;
    let mut scalars = Vec::with_capacity(proofs.len() * 2 * m);
    let mut points = Vec::with_capacity(proofs.len() * 2 * m);
    for ((proof, serial), w) in proofs.iter().zip(serials.iter()).zip(weights.iter()) {
        let f = verify_digits(params, x, proof)?;
        for (i, f_i) in SetCoefficientIterator::new(f, params).enumerate() {
            coin_coeffs[i.min(coins.len() - 1)] += w * f_i;
        }
        g_coeff -= w * x_m * serial;
        h0_coeff -= w * proof.z_R;
        h1_coeff -= w * proof.z_V;
        for (k, x) in x_k.iter().enumerate() {
            scalars.push(-(w * x));
            points.push(proof.G_k[k]);
            scalars.push(-(w * x));
            points.push(proof.Q_k[k]);
        }
    }

    let check = RistrettoPoint::vartime_multiscalar_mul(
        coin_coeffs
            .iter()
            .chain([g_coeff, h0_coeff, h1_coeff].iter())
            .chain(scalars.iter()),
        coins
            .iter()
            .map(|c| c.value())
            .chain([params.g(), params.h0(), params.h1()])
            .chain(points.iter()),
    );
    if check.is_identity() {
        Ok(())
    } else {
        Err(ProofError::VerificationFailed)
    }
}

trait VectorCommit {
    fn commit(self, params: &Params, r: &Scalar) -> ProofResult<RistrettoPoint>;
}

impl<I, T> VectorCommit for I
where
    I: Iterator<Item = T>,
    T: Borrow<Scalar>,
{
    // r*h0 + v[0]*H[0] + ... + v[nm-1]*H[nm-1]
    fn commit(self, params: &Params, r: &Scalar) -> ProofResult<RistrettoPoint> {
        let gens = params.sigma_gens();
        let scalars = iter::once(*r)
            .chain(self.map(|v| *v.borrow()))
            .collect::<Vec<Scalar>>();
        if scalars.len() > gens.len() + 1 {
            return Err(ProofError::SetIsTooLarge);
        }
        let len = scalars.len();
        Ok(RistrettoPoint::multiscalar_mul(
            scalars,
            iter::once(params.h0()).chain(gens.iter()).take(len),
        ))
    }
}

// Iterate over the coefficient f_i = prod_j f_{j,i_j} of every index of the
// padded set, counting through the base n digits of i.
#[derive(Clone)]
struct SetCoefficientIterator {
    f: Vec<Scalar>,
    n: usize,
    digits: Vec<usize>,
    idx: usize,
    max_idx: usize,
}

impl SetCoefficientIterator {
    fn new(f: Vec<Scalar>, params: &Params) -> SetCoefficientIterator {
        SetCoefficientIterator {
            f,
            n: params.sigma_n(),
            digits: vec![0; params.sigma_m()],
            idx: 0,
            max_idx: params.max_set_size(),
        }
    }
}

impl Iterator for SetCoefficientIterator {
    type Item = Scalar;

    #[inline]
    fn next(&mut self) -> Option<Scalar> {
        if self.idx >= self.max_idx {
            return None;
        }
        let coeff = self
            .digits
            .iter()
            .enumerate()
            .map(|(j, &i)| self.f[j * self.n + i])
            .product::<Scalar>();

        self.idx += 1;
        for d in self.digits.iter_mut() {
            *d += 1;
            if *d < self.n {
                break;
            }
            *d = 0;
        }
        Some(coeff)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.max_idx - self.idx;
        (remaining, Some(remaining))
    }
}

// Coefficients of prod_j (delta(l_j, i_j)*x + a_{j,i_j}) below x^m
fn compute_p_i(i_j: &[usize], l_j: &[usize], a: &[Scalar], n: usize) -> Vec<Scalar> {
    let m = l_j.len();

    let mut p = Polynomial::from(Vec::with_capacity(m + 1));
    p.push(Scalar::ONE);
    for j in 0..m {
        let mut f = Polynomial::new();
        f.push(a[j * n + i_j[j]]);
        if i_j[j] == l_j[j] {
            f.push(Scalar::ONE);
        }
        p *= f;
    }

    // Only the prover's own index reaches degree m, and that term is dropped
    let mut v: Vec<Scalar> = p.into();
    v.resize_with(m, || Scalar::ZERO);
    v
}
