#![allow(non_snake_case)]
//! Join-split proofs: spend coins from anonymity sets and mint new coins in
//! one balanced transaction.
//!
//! Every spent coin gets a [`SigmaProof`] of membership in its group's set.
//! All of them share a single challenge `x`, so no sub-proof can be lifted
//! into another transaction. Minted coins are covered by one aggregated
//! [`RangeProof`], and a [`SchnorrProof`] over `(g, h0)` shows that
//!
//! ```text
//! sum(spent values) + vin == sum(minted values) + vout + fee
//! ```
//!
//! holds without revealing any of the hidden values.
//!
//! Proofs are bound to a caller supplied context, normally the hash of the
//! transaction that carries them. Coins minted from an auxiliary key also
//! carry a [`KeyBinding`]: a signature of knowledge of that key over the
//! context and the statement.
use crate::coin::{set_hash, PrivateCoin, PublicCoin};
use crate::errors::{ProofError, ProofResult};
use crate::params::{Params, MAX_MONEY};
use crate::range::RangeProof;
use crate::schnorr::SchnorrProof;
use crate::sigma::{OneOfManyProofs, SigmaProof};
use crate::transcript::TranscriptProtocol;
use crate::util::{exp_iter, scalar_exp};
use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::VartimeMultiscalarMul;
use merlin::Transcript;
use rand::{CryptoRng, RngCore};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// The coins of one group as of some block height, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymitySet {
    group_id: u32,
    coins: Vec<PublicCoin>,
}

impl AnonymitySet {
    pub fn new(group_id: u32, coins: Vec<PublicCoin>) -> AnonymitySet {
        AnonymitySet { group_id, coins }
    }

    pub fn group_id(&self) -> u32 {
        self.group_id
    }

    pub fn coins(&self) -> &[PublicCoin] {
        &self.coins
    }

    pub fn set_hash(&self) -> [u8; 32] {
        set_hash(&self.coins)
    }
}

/// Public side of a join-split: everything the verifier checks the proof
/// against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSplitStatement {
    serials: Vec<Scalar>,
    group_ids: Vec<u32>,
    /// One entry per referenced group, ordered by group id
    set_hashes: Vec<(u32, [u8; 32])>,
    outputs: Vec<PublicCoin>,
    vin: u64,
    vout: u64,
    fee: u64,
}

impl JoinSplitStatement {
    /// Assemble a statement from its parts, e.g. as parsed from a
    /// transaction. `set_hashes` holds one entry per group referenced by
    /// `group_ids`, ordered by group id.
    pub fn new(
        serials: Vec<Scalar>,
        group_ids: Vec<u32>,
        set_hashes: Vec<(u32, [u8; 32])>,
        outputs: Vec<PublicCoin>,
        vin: u64,
        vout: u64,
        fee: u64,
    ) -> JoinSplitStatement {
        JoinSplitStatement {
            serials,
            group_ids,
            set_hashes,
            outputs,
            vin,
            vout,
            fee,
        }
    }

    /// Serial numbers revealed by the spends. These go into the spent
    /// serial set once the transaction is accepted.
    pub fn serials(&self) -> &[Scalar] {
        &self.serials
    }

    pub fn group_ids(&self) -> &[u32] {
        &self.group_ids
    }

    pub fn set_hashes(&self) -> &[(u32, [u8; 32])] {
        &self.set_hashes
    }

    pub fn outputs(&self) -> &[PublicCoin] {
        &self.outputs
    }

    pub fn vin(&self) -> u64 {
        self.vin
    }

    pub fn vout(&self) -> u64 {
        self.vout
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    fn append_to_transcript(&self, transcript: &mut Transcript, context: &[u8]) {
        transcript.joinsplit_domain_sep(self.serials.len() as u64, self.outputs.len() as u64);
        transcript.append_message(b"context", context);
        transcript.append_u64(b"vin", self.vin);
        transcript.append_u64(b"vout", self.vout);
        transcript.append_u64(b"fee", self.fee);
        for (id, hash) in &self.set_hashes {
            transcript.append_u64(b"group", u64::from(*id));
            transcript.append_message(b"set-hash", hash);
        }
        for (serial, id) in self.serials.iter().zip(self.group_ids.iter()) {
            transcript.append_scalar(b"serial", serial);
            transcript.append_u64(b"serial-group", u64::from(*id));
        }
        for coin in &self.outputs {
            transcript.append_point(b"C_out", &coin.value().compress());
        }
    }

    // Input positions per referenced group
    fn groups(&self) -> BTreeMap<u32, Vec<usize>> {
        let mut groups = BTreeMap::<u32, Vec<usize>>::new();
        for (i, id) in self.group_ids.iter().enumerate() {
            groups.entry(*id).or_default().push(i);
        }
        groups
    }

    fn check_amounts(&self) -> ProofResult<()> {
        if [self.vin, self.vout, self.fee].iter().any(|&a| a > MAX_MONEY) {
            Err(ProofError::ValueOutOfRange)
        } else {
            Ok(())
        }
    }
}

/// Proof of knowledge of the auxiliary key a spent coin's serial number was
/// derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBinding {
    pubkey: RistrettoPoint,
    proof: SchnorrProof,
}

impl KeyBinding {
    pub fn pubkey(&self) -> &RistrettoPoint {
        &self.pubkey
    }

    pub fn proof(&self) -> &SchnorrProof {
        &self.proof
    }
}

/// A join-split proof. It holds exactly one Sigma proof and one optional key
/// binding per spent coin, a range proof if the transaction mints coins, and
/// the balance proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LelantusProof {
    sigma_proofs: Vec<SigmaProof>,
    key_bindings: Vec<Option<KeyBinding>>,
    range_proof: Option<RangeProof>,
    schnorr_proof: SchnorrProof,
}

impl LelantusProof {
    pub fn sigma_proofs(&self) -> &[SigmaProof] {
        &self.sigma_proofs
    }

    pub fn key_bindings(&self) -> &[Option<KeyBinding>] {
        &self.key_bindings
    }

    pub fn range_proof(&self) -> Option<&RangeProof> {
        self.range_proof.as_ref()
    }

    pub fn schnorr_proof(&self) -> &SchnorrProof {
        &self.schnorr_proof
    }
}

pub struct LelantusProver<'a> {
    params: &'a Params,
}

impl<'a> LelantusProver<'a> {
    pub fn new(params: &'a Params) -> LelantusProver<'a> {
        LelantusProver { params }
    }

    /// Build a join-split under `context` spending `inputs`, each given with
    /// the id of its group and its position `indexes[i]` within that group's
    /// set, and minting `outputs`. Inputs holding an auxiliary key get a
    /// [`KeyBinding`].
    ///
    /// Caller mistakes are returned as errors: mismatched lengths, unknown
    /// groups, bad indexes, openings that do not match the set or the
    /// auxiliary key, amounts above [`MAX_MONEY`] and too many outputs. The
    /// balance itself is not checked here. An unbalanced proof is built all
    /// the same, and the verifier rejects it.
    ///
    /// ```
    /// # use rand::rngs::OsRng;
    /// # use lelantus::coin::PrivateCoin;
    /// # use lelantus::joinsplit::{AnonymitySet, LelantusProver, LelantusVerifier};
    /// # use lelantus::params::{Params, ParamsConfig};
    /// let params = Params::new(ParamsConfig::new(2, 2)).unwrap();
    /// let coins = [7, 3]
    ///     .iter()
    ///     .map(|&v| PrivateCoin::mint(&params, v, &mut OsRng))
    ///     .collect::<Vec<_>>();
    /// let set = AnonymitySet::new(0, coins.iter().map(|c| *c.public_coin()).collect());
    ///
    /// // Spend the coin worth 7 into a change coin of 5 and 2 in fees
    /// let change = PrivateCoin::mint(&params, 5, &mut OsRng);
    /// let sets = [set];
    /// let inputs = [(coins[0].clone(), 0)];
    /// let (statement, proof) = LelantusProver::new(&params)
    ///     .proof(b"tx", &sets, 0, &inputs, &[0], 0, &[change], 2, &mut OsRng)
    ///     .unwrap();
    ///
    /// let verifier = LelantusVerifier::new(&params);
    /// assert!(verifier.verify(b"tx", &sets, &statement, &proof));
    /// assert!(!verifier.verify(b"another tx", &sets, &statement, &proof));
    /// ```
    #[allow(clippy::too_many_arguments)]
    pub fn proof<R: RngCore + CryptoRng>(
        &self,
        context: &[u8],
        sets: &[AnonymitySet],
        vin: u64,
        inputs: &[(PrivateCoin, u32)],
        indexes: &[usize],
        vout: u64,
        outputs: &[PrivateCoin],
        fee: u64,
        rng: &mut R,
    ) -> ProofResult<(JoinSplitStatement, LelantusProof)> {
        let params = self.params;
        if inputs.is_empty() || inputs.len() != indexes.len() {
            return Err(ProofError::InvalidInputLength);
        }
        if outputs.len() > params.max_outputs() {
            return Err(ProofError::TooManyOutputs);
        }
        if outputs.iter().any(|c| c.value() > MAX_MONEY) {
            return Err(ProofError::ValueOutOfRange);
        }

        let mut input_sets = Vec::with_capacity(inputs.len());
        for ((coin, id), &l) in inputs.iter().zip(indexes.iter()) {
            let set = find_set(sets, *id)?;
            if l >= set.coins.len() {
                return Err(ProofError::IndexOutOfBounds);
            }
            if !coin.opens(params, &set.coins[l]) {
                return Err(ProofError::OpeningMismatch);
            }
            input_sets.push(set);
        }

        let group_ids = inputs.iter().map(|(_, id)| *id).collect::<Vec<_>>();
        let set_hashes = group_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|id| find_set(sets, id).map(|set| (id, set.set_hash())))
            .collect::<ProofResult<Vec<_>>>()?;
        let statement = JoinSplitStatement::new(
            inputs.iter().map(|(c, _)| *c.serial_number()).collect(),
            group_ids,
            set_hashes,
            outputs.iter().map(|c| *c.public_coin()).collect(),
            vin,
            vout,
            fee,
        );
        statement.check_amounts()?;
        check_distinct(&statement.serials)?;

        let mut keys = Vec::with_capacity(inputs.len());
        for (coin, _) in inputs {
            let key = coin.ecdsa_scalar().map(|k| (k, RistrettoPoint::mul_base(&k)));
            if let Some((_, pubkey)) = &key {
                let serial = PrivateCoin::serial_from_public_key(&pubkey.compress())?;
                if &serial != coin.serial_number() {
                    return Err(ProofError::OpeningMismatch);
                }
            }
            keys.push(key);
        }

        let mut transcript = Transcript::new(b"lelantus-joinsplit");
        statement.append_to_transcript(&mut transcript, context);
        append_pubkeys(&mut transcript, keys.iter().map(|key| key.map(|(_, pk)| pk)));

        let mut key_bindings = Vec::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            let binding = match key {
                Some((k, pubkey)) => Some(KeyBinding {
                    pubkey: *pubkey,
                    proof: SchnorrProof::prove(
                        &mut binding_transcript(&transcript, i),
                        &RISTRETTO_BASEPOINT_POINT,
                        params.h0(),
                        k,
                        &Scalar::ZERO,
                        pubkey,
                        rng,
                    )?,
                }),
                None => None,
            };
            key_bindings.push(binding);
        }

        let range_proof = if outputs.is_empty() {
            None
        } else {
            Some(RangeProof::prove(params, &mut transcript, outputs, rng)?)
        };

        // Create a `TranscriptRng` from the openings of the spent coins
        let mut rng = {
            let mut builder = transcript.build_rng();
            for (coin, _) in inputs {
                builder = builder.rekey_with_witness_bytes(b"s", coin.serial_number().as_bytes());
                builder = builder.rekey_with_witness_bytes(b"r", coin.randomness().as_bytes());
            }
            builder.finalize(rng)
        };

        let commitments = inputs
            .iter()
            .zip(indexes.iter())
            .zip(input_sets.iter())
            .map(|(((coin, _), &l), set)| set.coins.commit(params, l, coin, &mut rng))
            .collect::<ProofResult<Vec<_>>>()?;
        for commitment in &commitments {
            commitment.append_to_transcript(&mut transcript)?;
        }
        let x = transcript.challenge_scalar(b"joinsplit-challenge");

        let m = params.sigma_m();
        let x_m = scalar_exp(x, m);
        let x_k = exp_iter(x).take(m).collect::<Vec<_>>();
        let gamma_sum = commitments
            .iter()
            .flat_map(|c| c.gamma().iter().zip(x_k.iter()).map(|(gamma, x)| gamma * x))
            .sum::<Scalar>();

        let sigma_proofs = commitments
            .into_iter()
            .map(|c| c.respond(&x))
            .collect::<Vec<_>>();
        append_responses(&mut transcript, &sigma_proofs);

        // Opening of Y on (g, h0). The h1 term vanishes exactly when the
        // transaction balances.
        let Y = balance_point(params, &statement, &sigma_proofs, &x);
        let P = -(x_m * outputs.iter().map(|c| c.serial_number()).sum::<Scalar>());
        let T = gamma_sum - x_m * outputs.iter().map(|c| c.randomness()).sum::<Scalar>();
        let schnorr_proof =
            SchnorrProof::prove(&mut transcript, params.g(), params.h0(), &P, &T, &Y, &mut rng)?;

        Ok((
            statement,
            LelantusProof {
                sigma_proofs,
                key_bindings,
                range_proof,
                schnorr_proof,
            },
        ))
    }
}

pub struct LelantusVerifier<'a> {
    params: &'a Params,
}

impl<'a> LelantusVerifier<'a> {
    pub fn new(params: &'a Params) -> LelantusVerifier<'a> {
        LelantusVerifier { params }
    }

    /// Check `proof` against `statement`, the `context` it was made for and
    /// the anonymity sets it references. Every failure is reported as
    /// `false`.
    ///
    /// Serial numbers are not checked against previous spends here. That is
    /// up to the caller, see [`crate::state::LelantusState::add_serials`].
    pub fn verify(
        &self,
        context: &[u8],
        sets: &[AnonymitySet],
        statement: &JoinSplitStatement,
        proof: &LelantusProof,
    ) -> bool {
        self.check(context, sets, statement, proof).is_ok()
    }

    /// Verify independent join-splits, each with its own context, in
    /// parallel. True only if all of them pass.
    pub fn verify_batch(
        &self,
        sets: &[AnonymitySet],
        joinsplits: &[(&[u8], &JoinSplitStatement, &LelantusProof)],
    ) -> bool {
        joinsplits
            .par_iter()
            .all(|(context, statement, proof)| self.verify(context, sets, statement, proof))
    }

    fn check(
        &self,
        context: &[u8],
        sets: &[AnonymitySet],
        statement: &JoinSplitStatement,
        proof: &LelantusProof,
    ) -> ProofResult<()> {
        let params = self.params;
        statement.check_amounts()?;
        let inputs = statement.serials.len();
        if inputs == 0
            || statement.group_ids.len() != inputs
            || proof.sigma_proofs.len() != inputs
            || proof.key_bindings.len() != inputs
        {
            return Err(ProofError::InvalidInputLength);
        }
        if statement.outputs.len() > params.max_outputs() {
            return Err(ProofError::TooManyOutputs);
        }
        check_distinct(&statement.serials)?;
        if statement.outputs.iter().any(|c| !c.validate()) {
            return Err(ProofError::VerificationError);
        }

        let groups = statement.groups();
        if statement.set_hashes.len() != groups.len()
            || statement
                .set_hashes
                .iter()
                .zip(groups.keys())
                .any(|((id, _), group)| id != group)
        {
            return Err(ProofError::InvalidInputLength);
        }
        let mut group_sets = Vec::with_capacity(groups.len());
        for (id, hash) in &statement.set_hashes {
            let set = find_set(sets, *id)?;
            if set.coins.len() > params.max_set_size() {
                return Err(ProofError::SetIsTooLarge);
            }
            if &set.set_hash() != hash {
                return Err(ProofError::SetHashMismatch(*id));
            }
            group_sets.push(set);
        }

        let mut transcript = Transcript::new(b"lelantus-joinsplit");
        statement.append_to_transcript(&mut transcript, context);
        append_pubkeys(
            &mut transcript,
            proof.key_bindings.iter().map(|b| b.as_ref().map(|b| b.pubkey)),
        );
        for (i, (binding, serial)) in proof
            .key_bindings
            .iter()
            .zip(statement.serials.iter())
            .enumerate()
        {
            if let Some(binding) = binding {
                if &PrivateCoin::serial_from_public_key(&binding.pubkey.compress())? != serial {
                    return Err(ProofError::VerificationFailed);
                }
                binding.proof.verify(
                    &mut binding_transcript(&transcript, i),
                    &RISTRETTO_BASEPOINT_POINT,
                    params.h0(),
                    &binding.pubkey,
                )?;
            }
        }

        match (&proof.range_proof, statement.outputs.is_empty()) {
            (Some(range_proof), false) => {
                range_proof.verify(params, &mut transcript, &statement.outputs)?
            }
            (None, true) => {}
            _ => return Err(ProofError::InvalidProofSize),
        }

        for sigma_proof in &proof.sigma_proofs {
            sigma_proof.append_to_transcript(params, &mut transcript)?;
        }
        let x = transcript.challenge_scalar(b"joinsplit-challenge");
        append_responses(&mut transcript, &proof.sigma_proofs);

        for ((id, _), set) in statement.set_hashes.iter().zip(group_sets) {
            let members = &groups[id];
            let serials = members
                .iter()
                .map(|&i| statement.serials[i])
                .collect::<Vec<_>>();
            let proofs = members
                .iter()
                .map(|&i| &proof.sigma_proofs[i])
                .collect::<Vec<_>>();

            // Batch weights come from a per-group fork of the transcript
            let mut group_transcript = transcript.clone();
            group_transcript.append_u64(b"group", u64::from(*id));
            set.coins.verify_batch_with_challenge(
                params,
                &mut group_transcript,
                &x,
                &serials,
                &proofs,
            )?;
        }

        let Y = balance_point(params, statement, &proof.sigma_proofs, &x);
        proof
            .schnorr_proof
            .verify(&mut transcript, params.g(), params.h0(), &Y)
    }
}

fn find_set(sets: &[AnonymitySet], group_id: u32) -> ProofResult<&AnonymitySet> {
    sets.iter()
        .find(|set| set.group_id == group_id)
        .ok_or(ProofError::UnknownGroup(group_id))
}

fn check_distinct(serials: &[Scalar]) -> ProofResult<()> {
    let mut seen = HashSet::with_capacity(serials.len());
    if serials.iter().all(|s| seen.insert(s.to_bytes())) {
        Ok(())
    } else {
        Err(ProofError::DuplicateSerial)
    }
}

// Presence of each input's key binding, and its public key
fn append_pubkeys<I>(transcript: &mut Transcript, pubkeys: I)
where
    I: Iterator<Item = Option<RistrettoPoint>>,
{
    for pubkey in pubkeys {
        match pubkey {
            Some(pubkey) => {
                transcript.append_u64(b"key-binding", 1);
                transcript.append_point(b"pubkey", &pubkey.compress());
            }
            None => transcript.append_u64(b"key-binding", 0),
        }
    }
}

fn binding_transcript(transcript: &Transcript, input: usize) -> Transcript {
    let mut binding = transcript.clone();
    binding.append_u64(b"key-binding-input", input as u64);
    binding
}

fn append_responses(transcript: &mut Transcript, sigma_proofs: &[SigmaProof]) {
    for proof in sigma_proofs {
        transcript.append_scalar(b"z_V", proof.z_V());
        transcript.append_scalar(b"z_R", proof.z_R());
    }
}

// (sum z_V + x^m*(vin - vout - fee))*h1 - x^m*sum(C_out) + sum_j sum_k x^k*Q_{j,k}
fn balance_point(
    params: &Params,
    statement: &JoinSplitStatement,
    sigma_proofs: &[SigmaProof],
    x: &Scalar,
) -> RistrettoPoint {
    let m = params.sigma_m();
    let x_m = scalar_exp(*x, m);
    let x_k = exp_iter(*x).take(m).collect::<Vec<_>>();

    let public =
        Scalar::from(statement.vin) - Scalar::from(statement.vout) - Scalar::from(statement.fee);
    let h1_scalar = sigma_proofs.iter().map(|p| p.z_V()).sum::<Scalar>() + x_m * public;

    let mut scalars = vec![h1_scalar];
    let mut points = vec![*params.h1()];
    for coin in &statement.outputs {
        scalars.push(-x_m);
        points.push(*coin.value());
    }
    for proof in sigma_proofs {
        for (x, Q) in x_k.iter().zip(proof.Q_k().iter()) {
            scalars.push(*x);
            points.push(*Q);
        }
    }
    RistrettoPoint::vartime_multiscalar_mul(scalars, points)
}
