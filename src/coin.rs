//! Coins are double commitments `serial*g + value*h1 + randomness*h0`.
//!
//! A [`PrivateCoin`] holds the opening, and its [`PublicCoin`] is the
//! commitment that enters the anonymity set. Revealing the serial number at
//! spend time marks the coin as used.
use crate::errors::{ProofError, ProofResult};
use crate::params::Params;
use crate::util::read_point;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::IsIdentity;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::fmt;

const PUBCOIN_HASH_DOMAIN: &[u8] = b"LELANTUS_PUBCOIN_VALUE_HASH";
const SERIAL_HASH_DOMAIN: &[u8] = b"LELANTUS_SERIAL_HASH";
const SET_HASH_DOMAIN: &[u8] = b"LELANTUS_ANONYMITY_SET";
const PUBLICKEY_TO_SERIALNUMBER: &[u8] = b"PUBLICKEY_TO_SERIALNUMBER";

/// Version of coins minted by this crate.
pub const COIN_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicCoin {
    value: RistrettoPoint,
}

impl PublicCoin {
    pub fn new(value: RistrettoPoint) -> PublicCoin {
        PublicCoin { value }
    }

    pub fn value(&self) -> &RistrettoPoint {
        &self.value
    }

    /// A coin may only join the anonymity set if it is not the identity.
    pub fn validate(&self) -> bool {
        !self.value.is_identity()
    }

    /// Uniqueness tag of this coin.
    pub fn value_hash(&self) -> [u8; 32] {
        let mut hasher = Sha3_256::new();
        hasher.update(PUBCOIN_HASH_DOMAIN);
        hasher.update(self.value.compress().as_bytes());
        hasher.finalize().into()
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.value.compress().to_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> ProofResult<PublicCoin> {
        read_point(bytes).map(PublicCoin::new)
    }
}

/// The owner's view of a coin.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateCoin {
    serial_number: Scalar,
    value: u64,
    randomness: Scalar,
    version: u32,
    ecdsa_seckey: [u8; 32],
    public_coin: PublicCoin,
}

impl PrivateCoin {
    pub fn new(
        params: &Params,
        serial_number: Scalar,
        value: u64,
        randomness: Scalar,
        version: u32,
    ) -> PrivateCoin {
        let public_coin = PublicCoin::new(params.double_commit(
            &serial_number,
            &Scalar::from(value),
            &randomness,
        ));
        PrivateCoin {
            serial_number,
            value,
            randomness,
            version,
            ecdsa_seckey: [0u8; 32],
            public_coin,
        }
    }

    /// Mint a fresh coin of `value` with uniformly random serial number and
    /// blinding factor.
    pub fn mint<R: RngCore + CryptoRng>(params: &Params, value: u64, rng: &mut R) -> PrivateCoin {
        let serial_number = Scalar::random(rng);
        let randomness = Scalar::random(rng);
        PrivateCoin::new(params, serial_number, value, randomness, COIN_VERSION)
    }

    /// Deterministic mint: the serial number is derived from the public key
    /// belonging to the auxiliary secret key `seckey`.
    pub fn from_ecdsa_seckey(
        params: &Params,
        value: u64,
        seckey: [u8; 32],
        randomness: Scalar,
        version: u32,
    ) -> ProofResult<PrivateCoin> {
        let pubkey = RistrettoPoint::mul_base(&Scalar::from_bytes_mod_order(seckey));
        let serial = PrivateCoin::serial_from_public_key(&pubkey.compress())?;
        let mut coin = PrivateCoin::new(params, serial, value, randomness, version);
        coin.ecdsa_seckey = seckey;
        Ok(coin)
    }

    /// Derive a serial number from an auxiliary public key.
    ///
    /// The key is evaluated as a Diffie-Hellman shared point with the scalar
    /// one, using constant time scalar multiplication, and only the hash of
    /// that point is used.
    pub fn serial_from_public_key(pubkey: &CompressedRistretto) -> ProofResult<Scalar> {
        let point = pubkey.decompress().ok_or(ProofError::InvalidPoint)?;
        if point.is_identity() {
            return Err(ProofError::InvalidPoint);
        }
        let shared = point * Scalar::ONE;
        let shared_hash = Sha3_256::digest(shared.compress().as_bytes());

        let mut hasher = Sha3_256::new();
        hasher.update(PUBLICKEY_TO_SERIALNUMBER);
        hasher.update(shared_hash);
        Ok(Scalar::from_bytes_mod_order(hasher.finalize().into()))
    }

    pub fn public_coin(&self) -> &PublicCoin {
        &self.public_coin
    }

    pub fn serial_number(&self) -> &Scalar {
        &self.serial_number
    }

    pub fn randomness(&self) -> &Scalar {
        &self.randomness
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn value_scalar(&self) -> Scalar {
        Scalar::from(self.value)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn ecdsa_seckey(&self) -> &[u8; 32] {
        &self.ecdsa_seckey
    }

    /// Public key of the auxiliary key, if the coin has one. A key of all
    /// zero bytes means none is set.
    pub fn ecdsa_public_key(&self) -> Option<RistrettoPoint> {
        self.ecdsa_scalar().map(|k| RistrettoPoint::mul_base(&k))
    }

    pub(crate) fn ecdsa_scalar(&self) -> Option<Scalar> {
        if self.ecdsa_seckey == [0u8; 32] {
            None
        } else {
            Some(Scalar::from_bytes_mod_order(self.ecdsa_seckey))
        }
    }

    pub fn set_ecdsa_seckey(&mut self, seckey: &[u8]) -> ProofResult<()> {
        self.ecdsa_seckey = seckey.try_into().map_err(|_| ProofError::InvalidKeyLength)?;
        Ok(())
    }

    pub fn set_serial_number(&mut self, params: &Params, serial_number: Scalar) {
        self.serial_number = serial_number;
        self.recommit(params);
    }

    pub fn set_randomness(&mut self, params: &Params, randomness: Scalar) {
        self.randomness = randomness;
        self.recommit(params);
    }

    pub fn set_value(&mut self, params: &Params, value: u64) {
        self.value = value;
        self.recommit(params);
    }

    pub fn set_version(&mut self, version: u32) {
        self.version = version;
    }

    /// True if this opening commits to `coin` under `params`.
    pub fn opens(&self, params: &Params, coin: &PublicCoin) -> bool {
        let commitment =
            params.double_commit(&self.serial_number, &self.value_scalar(), &self.randomness);
        commitment == coin.value
    }

    fn recommit(&mut self, params: &Params) {
        self.public_coin = PublicCoin::new(params.double_commit(
            &self.serial_number,
            &self.value_scalar(),
            &self.randomness,
        ));
    }
}

// Openings stay out of logs
impl fmt::Debug for PrivateCoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateCoin")
            .field("value", &self.value)
            .field("version", &self.version)
            .field("public_coin", &self.public_coin)
            .finish_non_exhaustive()
    }
}

/// Key of a revealed serial number in the spent serial set.
pub fn serial_hash(serial: &Scalar) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(SERIAL_HASH_DOMAIN);
    hasher.update(serial.as_bytes());
    hasher.finalize().into()
}

/// Hash of an ordered list of coins. Proofs are bound to the set through it,
/// so any change of membership or order changes the hash.
pub fn set_hash(coins: &[PublicCoin]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(SET_HASH_DOMAIN);
    hasher.update((coins.len() as u64).to_le_bytes());
    for coin in coins {
        hasher.update(coin.value.compress().as_bytes());
    }
    hasher.finalize().into()
}
