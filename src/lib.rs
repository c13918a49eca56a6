//! Lelantus join-split proofs over the ristretto255 group.
//!
//! Coins are double blinded commitments `s*g + v*h1 + r*h0` to a serial
//! number `s`, a value `v` and a randomness `r`. Minting publishes the
//! commitment. A join-split spends coins anonymously: it proves membership
//! of each spent coin in an anonymity set with a one-out-of-many proof,
//! reveals only the serial numbers, and proves that the hidden input values
//! cover the new outputs, the transparent amounts and the fee.
//!
//! # Examples
//! Spend two coins of a group into one change coin:
//! ```
//! # use rand::rngs::OsRng; // You should use a more secure RNG
//! # use lelantus::coin::PrivateCoin;
//! # use lelantus::joinsplit::{LelantusProver, LelantusVerifier};
//! # use lelantus::params::{Params, ParamsConfig};
//! # use lelantus::state::LelantusState;
//! #
//! // Sets of up to 2^3 coins
//! let params = Params::new(ParamsConfig::new(2, 3)).unwrap();
//! let state = LelantusState::new(&params);
//!
//! // Mint three coins at height 1
//! let coins = [10, 20, 5]
//!     .iter()
//!     .map(|&v| PrivateCoin::mint(&params, v, &mut OsRng))
//!     .collect::<Vec<_>>();
//! let public = coins.iter().map(|c| *c.public_coin()).collect::<Vec<_>>();
//! let group = state.add_mints(1, &public).unwrap();
//!
//! // Spend the coins worth 20 and 5, keep 24 as change and pay a fee of 1
//! let sets = state.anonymity_sets(1);
//! let inputs = [(coins[1].clone(), group), (coins[2].clone(), group)];
//! let change = [PrivateCoin::mint(&params, 24, &mut OsRng)];
//! // The proof is bound to the transaction carrying it
//! let tx_hash = [7u8; 32];
//! let (statement, proof) = LelantusProver::new(&params)
//!     .proof(&tx_hash, &sets, 0, &inputs, &[1, 2], 0, &change, 1, &mut OsRng)
//!     .unwrap();
//!
//! // The verifier learns the serial numbers, but not which coins were spent
//! let verifier = LelantusVerifier::new(&params);
//! assert!(verifier.verify(&tx_hash, &sets, &statement, &proof));
//!
//! // Accepting the spend marks the serial numbers as used
//! state.add_serials(statement.serials(), 2).unwrap();
//! assert!(state.add_serials(statement.serials(), 3).is_err());
//! ```
//!
//! # Performance
//! All group arithmetic runs on [curve25519-dalek](https://docs.rs/curve25519-dalek).
//! Building for the host CPU lets dalek pick its SIMD backend:
//! ```bash
//! export RUSTFLAGS="-C target_cpu=native"
//! ```
//!
//! Sigma batch verification and join-split verification are benchmarked with
//! [criterion.rs](https://docs.rs/criterion):
//! ```bash
//! cargo bench
//! ```
//!
//! # References
//! * [One-out-of-Many Proofs: Or How to Leak a Secret and Spend a
//!   Coin](https://eprint.iacr.org/2014/764)
//! * [Short Accountable Ring Signatures Based on DDH](https://eprint.iacr.org/2015/643)
//! * [Lelantus: Towards Confidentiality and Anonymity of Blockchain
//!   Transactions From Standard Assumptions](https://eprint.iacr.org/2019/373)
//! * [Bulletproofs: Short Proofs for Confidential Transactions and
//!   More](https://eprint.iacr.org/2017/1066)

//-----------------------------------------------------------------------------
// Public modules
//-----------------------------------------------------------------------------
pub mod coin;
pub mod errors;
pub mod inner_product;
pub mod joinsplit;
pub mod mint;
pub mod params;
pub mod range;
pub mod schnorr;
pub mod sigma;
pub mod state;

//-----------------------------------------------------------------------------
// Internal modules
//-----------------------------------------------------------------------------
pub(crate) mod transcript;
pub(crate) mod util;
