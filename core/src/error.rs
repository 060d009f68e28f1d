use thiserror::Error;

/// Rejected connection-state transitions on an [`crate::EventHub`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    #[error("bluetooth is not available")]
    BluetoothUnavailable,

    #[error("peripheral {uuid} is already connected")]
    AlreadyConnected { uuid: String },

    #[error("no peripheral is connected")]
    NotConnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_error_display() {
        assert_eq!(
            HubError::BluetoothUnavailable.to_string(),
            "bluetooth is not available"
        );

        let err = HubError::AlreadyConnected {
            uuid: "6E400001".to_string(),
        };
        assert_eq!(err.to_string(), "peripheral 6E400001 is already connected");

        assert_eq!(HubError::NotConnected.to_string(), "no peripheral is connected");
    }
}
