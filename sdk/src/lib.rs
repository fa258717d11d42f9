//! Umbrella crate re-exporting the keel Solana client building blocks under
//! a single dependency, the way `solana-sdk` aggregates its own ecosystem of
//! single-purpose crates.
//!
//! Pull in individual `keel-*` crates directly if you only need one piece
//! (e.g. just `keel-pubkey` for address handling in a `no_std` context).

pub use keel_hash as hash;
pub use keel_instruction as instruction;
pub use keel_keypair as keypair;
pub use keel_message as message;
pub use keel_pubkey as pubkey;
pub use keel_sanitize as sanitize;
pub use keel_sdk_ids as sdk_ids;
pub use keel_short_vec as short_vec;
pub use keel_signature as signature;
pub use keel_signer as signer;
pub use keel_system_interface as system_instruction;
pub use keel_transaction as transaction;

#[cfg(feature = "rpc-client")]
pub use keel_rpc_client as rpc_client;
#[cfg(feature = "rpc-client")]
pub use keel_rpc_client_api as rpc_client_api;
#[cfg(feature = "rpc-client")]
pub use keel_signature_tracker as signature_tracker;
#[cfg(feature = "token")]
pub use keel_token as token_instruction;
#[cfg(feature = "associated-token-account")]
pub use keel_associated_token_account as associated_token_account;
#[cfg(feature = "token-swap")]
pub use keel_token_swap as token_swap_instruction;

pub use keel_pubkey::Address;
pub use keel_signature::Signature;
pub use keel_signer::Signer;
