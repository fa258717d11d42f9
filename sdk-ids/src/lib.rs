//! Fixed addresses of native programs and sysvars, the same 32-byte
//! constants every Solana cluster agrees on.

/// Declares an `ID` const, a `const fn id()` and a `check_id()` helper for
/// a fixed base58 address.
#[macro_export]
macro_rules! declare_id {
    ($address:expr) => {
        pub const ID: $crate::Address = $crate::Address::from_str_const($address);

        pub fn check_id(id: &$crate::Address) -> bool {
            id == &ID
        }

        pub const fn id() -> $crate::Address {
            ID
        }

        #[cfg(test)]
        #[test]
        fn test_id() {
            assert!(check_id(&id()));
        }
    };
}

pub use keel_pubkey::Address;

pub mod bpf_loader_upgradeable {
    crate::declare_id!("BPFLoaderUpgradeab1e11111111111111111111111");
}

pub mod system_program {
    crate::declare_id!("11111111111111111111111111111111");
}

pub mod spl_token {
    crate::declare_id!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
}

pub mod spl_associated_token_account {
    crate::declare_id!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");
}

pub mod spl_token_swap {
    crate::declare_id!("SwapsVeCiPHMUAtzQWZw7RjsKjgCjhwU55QGu4U1Szw");
}

pub mod sysvar {
    crate::declare_id!("Sysvar1111111111111111111111111111111111111");

    pub mod rent {
        crate::declare_id!("SysvarRent111111111111111111111111111111111");
    }
    pub mod recent_blockhashes {
        crate::declare_id!("SysvarRecentB1ockHashes11111111111111111111");
    }
}
