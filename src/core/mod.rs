pub mod config;
pub mod errors;
pub mod logging;

pub use config::{BusyPolicy, WalletConfig};
pub use errors::{WalletError, WalletResult};
