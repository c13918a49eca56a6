//! In-memory tracker for coin groups and spent serial numbers.
//!
//! Minted coins are appended to numbered groups, and every group is a
//! growing anonymity set. A group is closed once it would grow past the
//! maximum group size, and the next block of mints opens a new group. Spent
//! serial numbers are kept by hash.
//!
//! All state sits behind one `RwLock`. Readers always see whole blocks of
//! mints, and serial numbers of a join-split are inserted with a single
//! compare-and-insert under the write lock.
use crate::coin::{serial_hash, PublicCoin};
use crate::errors::{StateError, StateResult};
use crate::joinsplit::AnonymitySet;
use crate::params::Params;
use curve25519_dalek::scalar::Scalar;
use log::{debug, info};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
struct CoinGroup {
    /// Coins with the height they were minted at, in insertion order
    coins: Vec<(PublicCoin, u32)>,
}

#[derive(Debug, Default)]
struct StateInner {
    groups: Vec<CoinGroup>,
    /// Coin tag to (height, group id)
    mints: HashMap<[u8; 32], (u32, u32)>,
    /// Serial hash to spend height
    serials: HashMap<[u8; 32], u32>,
    last_height: u32,
}

impl StateInner {
    fn latest_group_id(&self) -> u32 {
        self.groups.len().saturating_sub(1) as u32
    }
}

pub struct LelantusState {
    max_group_size: usize,
    inner: RwLock<StateInner>,
}

impl LelantusState {
    pub fn new(params: &Params) -> LelantusState {
        LelantusState::with_max_group_size(params.max_group_size())
    }

    pub fn with_max_group_size(max_group_size: usize) -> LelantusState {
        LelantusState {
            max_group_size,
            inner: RwLock::new(StateInner::default()),
        }
    }

    pub fn max_group_size(&self) -> usize {
        self.max_group_size
    }

    /// Append the mints of one block at `height` and return the id of the
    /// group they joined. Either every coin is added or none is.
    pub fn add_mints(&self, height: u32, coins: &[PublicCoin]) -> StateResult<u32> {
        let mut inner = self.inner.write();
        if height < inner.last_height {
            return Err(StateError::HeightRegression {
                height,
                last: inner.last_height,
            });
        }

        let mut seen = HashSet::with_capacity(coins.len());
        let mut tags = Vec::with_capacity(coins.len());
        for coin in coins {
            if !coin.validate() {
                return Err(StateError::InvalidCoin);
            }
            let tag = coin.value_hash();
            if inner.mints.contains_key(&tag) || !seen.insert(tag) {
                return Err(StateError::DuplicateCoin(tag));
            }
            tags.push(tag);
        }

        inner.last_height = height;
        if coins.is_empty() {
            return Ok(inner.latest_group_id());
        }

        let full = inner
            .groups
            .last()
            .map_or(true, |g| g.coins.len() + coins.len() > self.max_group_size);
        if full {
            inner.groups.push(CoinGroup::default());
            info!(
                "Opened coin group {} at height {}",
                inner.latest_group_id(),
                height
            );
        }

        let group_id = inner.latest_group_id();
        for tag in tags {
            inner.mints.insert(tag, (height, group_id));
        }
        if let Some(group) = inner.groups.last_mut() {
            group.coins.extend(coins.iter().map(|c| (*c, height)));
            debug!(
                "Added {} mints to group {} at height {}, group size {}",
                coins.len(),
                group_id,
                height,
                group.coins.len()
            );
        }
        Ok(group_id)
    }

    /// The members of group `group_id` minted at or below `height_cutoff`.
    pub fn get_coin_set_for_spend(
        &self,
        group_id: u32,
        height_cutoff: u32,
    ) -> StateResult<AnonymitySet> {
        let inner = self.inner.read();
        let group = inner
            .groups
            .get(group_id as usize)
            .ok_or(StateError::UnknownGroup(group_id))?;
        Ok(snapshot(group_id, group, height_cutoff))
    }

    /// A consistent snapshot of every group as of `height_cutoff`.
    pub fn anonymity_sets(&self, height_cutoff: u32) -> Vec<AnonymitySet> {
        let inner = self.inner.read();
        inner
            .groups
            .iter()
            .enumerate()
            .map(|(id, group)| snapshot(id as u32, group, height_cutoff))
            .collect()
    }

    /// Height and group id of a minted coin.
    pub fn get_minted_coin_height_and_id(&self, coin: &PublicCoin) -> Option<(u32, u32)> {
        self.inner.read().mints.get(&coin.value_hash()).copied()
    }

    pub fn has_coin(&self, coin: &PublicCoin) -> bool {
        self.inner.read().mints.contains_key(&coin.value_hash())
    }

    /// Look up a spent serial by its [`serial_hash`].
    pub fn has_serial(&self, serial_hash: &[u8; 32]) -> bool {
        self.inner.read().serials.contains_key(serial_hash)
    }

    /// Mark the serial numbers revealed by one join-split as spent. Fails
    /// without changes if any of them is already spent or repeated.
    pub fn add_serials(&self, serials: &[Scalar], height: u32) -> StateResult<()> {
        let hashes = serials.iter().map(serial_hash).collect::<Vec<_>>();
        let mut inner = self.inner.write();

        let mut seen = HashSet::with_capacity(hashes.len());
        if hashes
            .iter()
            .any(|h| inner.serials.contains_key(h) || !seen.insert(*h))
        {
            return Err(StateError::SerialAlreadySpent);
        }
        for hash in hashes {
            inner.serials.insert(hash, height);
        }
        debug!("Recorded {} spent serials at height {}", serials.len(), height);
        Ok(())
    }

    /// Id of the group new mints go to. Zero before the first mint.
    pub fn latest_group_id(&self) -> u32 {
        self.inner.read().latest_group_id()
    }

    pub fn group_ids(&self) -> Vec<u32> {
        (0..self.inner.read().groups.len() as u32).collect()
    }
}

fn snapshot(group_id: u32, group: &CoinGroup, height_cutoff: u32) -> AnonymitySet {
    AnonymitySet::new(
        group_id,
        group
            .coins
            .iter()
            .take_while(|(_, height)| *height <= height_cutoff)
            .map(|(coin, _)| *coin)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coin::PrivateCoin;
    use crate::errors::ProofError;
    use crate::joinsplit::{LelantusProver, LelantusVerifier};
    use crate::params::ParamsConfig;
    use curve25519_dalek::ristretto::RistrettoPoint;
    use curve25519_dalek::traits::Identity;
    use rand::rngs::OsRng;

    fn params() -> Params {
        let mut config = ParamsConfig::new(2, 3);
        config.range_bits = 32;
        config.max_outputs = 4;
        Params::new(config).unwrap()
    }

    fn mint(params: &Params, values: &[u64]) -> Vec<PrivateCoin> {
        values
            .iter()
            .map(|&v| PrivateCoin::mint(params, v, &mut OsRng))
            .collect()
    }

    fn public(coins: &[PrivateCoin]) -> Vec<PublicCoin> {
        coins.iter().map(|c| *c.public_coin()).collect()
    }

    #[test]
    fn mints_and_queries() {
        let params = params();
        let state = LelantusState::new(&params);
        assert_eq!(state.latest_group_id(), 0);
        assert!(state.group_ids().is_empty());
        assert_eq!(
            state.get_coin_set_for_spend(0, 10).unwrap_err(),
            StateError::UnknownGroup(0)
        );

        let block_1 = public(&mint(&params, &[10, 20]));
        let block_2 = public(&mint(&params, &[5]));
        assert_eq!(state.add_mints(1, &block_1).unwrap(), 0);
        assert_eq!(state.add_mints(2, &block_2).unwrap(), 0);

        let set = state.get_coin_set_for_spend(0, 2).unwrap();
        assert_eq!(set.coins(), &[block_1[0], block_1[1], block_2[0]]);
        let set = state.get_coin_set_for_spend(0, 1).unwrap();
        assert_eq!(set.coins(), &block_1[..]);
        assert!(state.get_coin_set_for_spend(0, 0).unwrap().coins().is_empty());

        assert_eq!(state.get_minted_coin_height_and_id(&block_2[0]), Some((2, 0)));
        assert!(state.has_coin(&block_1[1]));
        let stranger = *PrivateCoin::mint(&params, 1, &mut OsRng).public_coin();
        assert!(!state.has_coin(&stranger));
        assert_eq!(state.get_minted_coin_height_and_id(&stranger), None);
    }

    #[test]
    fn group_rollover() {
        let params = params();
        let state = LelantusState::with_max_group_size(4);
        assert_eq!(state.add_mints(1, &public(&mint(&params, &[1, 2, 3]))).unwrap(), 0);
        assert_eq!(state.add_mints(2, &public(&mint(&params, &[4]))).unwrap(), 0);

        // A block never straddles two groups
        let block = public(&mint(&params, &[5, 6]));
        assert_eq!(state.add_mints(3, &block).unwrap(), 1);
        assert_eq!(state.latest_group_id(), 1);
        assert_eq!(state.group_ids(), vec![0, 1]);
        assert_eq!(state.get_coin_set_for_spend(0, 3).unwrap().coins().len(), 4);
        assert_eq!(state.get_coin_set_for_spend(1, 3).unwrap().coins(), &block[..]);
        assert_eq!(state.get_minted_coin_height_and_id(&block[1]), Some((3, 1)));

        // An oversized block fills a group of its own
        let big = public(&mint(&params, &[1, 1, 1, 1, 1, 1]));
        assert_eq!(state.add_mints(4, &big).unwrap(), 2);
        assert_eq!(state.get_coin_set_for_spend(2, 4).unwrap().coins().len(), 6);

        let sets = state.anonymity_sets(3);
        assert_eq!(sets.len(), 3);
        assert!(sets[2].coins().is_empty());
        assert_eq!(sets[1].group_id(), 1);
    }

    #[test]
    fn rejected_mints() {
        let params = params();
        let state = LelantusState::new(&params);
        let coins = public(&mint(&params, &[1, 2]));
        state.add_mints(5, &coins[..1]).unwrap();

        assert_eq!(
            state.add_mints(4, &coins[1..]).unwrap_err(),
            StateError::HeightRegression { height: 4, last: 5 }
        );
        assert_eq!(
            state.add_mints(6, &coins).unwrap_err(),
            StateError::DuplicateCoin(coins[0].value_hash())
        );
        assert_eq!(
            state.add_mints(6, &[coins[1], coins[1]]).unwrap_err(),
            StateError::DuplicateCoin(coins[1].value_hash())
        );
        assert_eq!(
            state
                .add_mints(6, &[coins[1], PublicCoin::new(RistrettoPoint::identity())])
                .unwrap_err(),
            StateError::InvalidCoin
        );

        // Nothing of the rejected blocks was kept
        assert!(!state.has_coin(&coins[1]));
        assert_eq!(state.get_coin_set_for_spend(0, 10).unwrap().coins().len(), 1);
        state.add_mints(6, &coins[1..]).unwrap();
        assert_eq!(state.get_coin_set_for_spend(0, 10).unwrap().coins().len(), 2);
    }

    #[test]
    fn serials() {
        let params = params();
        let state = LelantusState::new(&params);
        let coins = mint(&params, &[1, 2, 3]);
        let serials = coins.iter().map(|c| *c.serial_number()).collect::<Vec<_>>();

        state.add_serials(&serials[..2], 7).unwrap();
        assert!(state.has_serial(&serial_hash(&serials[0])));
        assert!(state.has_serial(&serial_hash(&serials[1])));
        assert!(!state.has_serial(&serial_hash(&serials[2])));

        // All or nothing
        assert_eq!(
            state.add_serials(&serials[1..], 8).unwrap_err(),
            StateError::SerialAlreadySpent
        );
        assert!(!state.has_serial(&serial_hash(&serials[2])));
        assert_eq!(
            state.add_serials(&[serials[2], serials[2]], 8).unwrap_err(),
            StateError::SerialAlreadySpent
        );
        state.add_serials(&serials[2..], 8).unwrap();
        assert!(state.has_serial(&serial_hash(&serials[2])));
    }

    #[test]
    fn concurrent_spends() {
        let params = params();
        let state = LelantusState::new(&params);
        let serial = *PrivateCoin::mint(&params, 1, &mut OsRng).serial_number();

        let accepted = std::thread::scope(|s| {
            let handles = (0..8)
                .map(|_| s.spawn(|| state.add_serials(&[serial], 1).is_ok()))
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count()
        });
        assert_eq!(accepted, 1);
    }

    #[test]
    fn double_spend_across_sets() {
        let params = params();
        let state = LelantusState::new(&params);
        let coins = mint(&params, &[5, 10, 7]);
        state.add_mints(1, &public(&coins[..2])).unwrap();
        state.add_mints(2, &public(&coins[2..])).unwrap();

        // The same coin spent against two overlapping snapshots of group 0
        let prover = LelantusProver::new(&params);
        let verifier = LelantusVerifier::new(&params);
        let spend = |cutoff: u32| {
            let sets = state.anonymity_sets(cutoff);
            let change = [PrivateCoin::mint(&params, 9, &mut OsRng)];
            let input = [(coins[1].clone(), 0)];
            let (statement, proof) = prover
                .proof(b"tx", &sets, 0, &input, &[1], 0, &change, 1, &mut OsRng)
                .unwrap();
            (sets, statement, proof)
        };
        let (sets_1, statement_1, proof_1) = spend(1);
        let (sets_2, statement_2, proof_2) = spend(2);
        assert_eq!(sets_1[0].coins().len(), 2);
        assert_eq!(sets_2[0].coins().len(), 3);

        assert!(verifier.verify(b"tx", &sets_1, &statement_1, &proof_1));
        assert!(verifier.verify(b"tx", &sets_2, &statement_2, &proof_2));
        assert_eq!(statement_1.serials(), statement_2.serials());
        assert!(!verifier.verify(b"tx", &sets_2, &statement_1, &proof_1));

        state.add_serials(statement_1.serials(), 3).unwrap();
        assert_eq!(
            state.add_serials(statement_2.serials(), 3).unwrap_err(),
            StateError::SerialAlreadySpent
        );
    }

    #[test]
    fn spend_from_unknown_group() {
        let params = params();
        let state = LelantusState::new(&params);
        let coins = mint(&params, &[5]);
        state.add_mints(1, &public(&coins)).unwrap();
        let sets = state.anonymity_sets(1);
        assert_eq!(
            LelantusProver::new(&params)
                .proof(b"tx", &sets, 0, &[(coins[0].clone(), 1)], &[0], 4, &[], 1, &mut OsRng)
                .unwrap_err(),
            ProofError::UnknownGroup(1)
        );
    }
}
