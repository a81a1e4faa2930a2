use thiserror::Error;

/// Shared error taxonomy for every hardware wallet operation.
///
/// Validation failures (`UnknownCoin`, `InvalidRequest`, `UnsupportedOperation`)
/// are raised before the transport is touched. Everything else originates from
/// a device round-trip and has been classified exactly once by
/// [`crate::hardware::status`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// The coin name is not registered in the catalog.
    #[error("Unknown coin: {0}")]
    UnknownCoin(String),

    /// Capability negotiation failed before any transport call.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Malformed request caught by local validation.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The transport succeeded but returned malformed or inconsistent data.
    #[error("Invalid device response: {0}")]
    DeviceResponseInvalid(String),

    /// No application is open on the device.
    #[error("Select the {coin} app on your {vendor}")]
    SelectApp { vendor: String, coin: String },

    /// The wrong application is open on the device.
    #[error("Wrong app open on your {vendor}, switch to the {coin} app")]
    WrongApp { vendor: String, coin: String },

    /// The user rejected the action on the device.
    #[error("Action cancelled on device")]
    ActionCancelled,

    /// Catch-all vendor or transport failure.
    #[error("Device operation failed: {message}")]
    DeviceOperationFailed {
        message: String,
        payload: Option<String>,
    },
}

impl WalletError {
    /// Shorthand for a transport/vendor failure.
    pub fn device_failed(message: impl Into<String>, payload: Option<String>) -> Self {
        Self::DeviceOperationFailed {
            message: message.into(),
            payload,
        }
    }

    /// Errors raised by local validation, before any device round-trip.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WalletError::UnknownCoin(_)
                | WalletError::InvalidRequest(_)
                | WalletError::UnsupportedOperation(_)
        )
    }

    /// Errors the user can resolve by switching the app on the device.
    pub fn needs_user_action(&self) -> bool {
        matches!(
            self,
            WalletError::SelectApp { .. } | WalletError::WrongApp { .. }
        )
    }

    /// Raw vendor diagnostic carried by a generic device failure.
    pub fn raw_payload(&self) -> Option<&str> {
        match self {
            WalletError::DeviceOperationFailed { payload, .. } => payload.as_deref(),
            _ => None,
        }
    }
}

pub type WalletResult<T> = Result<T, WalletError>;
