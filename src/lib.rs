#![allow(clippy::len_zero)]
#![allow(clippy::needless_return)]
// src/lib.rs

pub mod core;

// Hardware wallet abstraction
pub mod hardware;

pub use crate::core::errors::{WalletError, WalletResult};
