use shopfloor_allocation::{FetchError, LedgerError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Parse(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl From<ClientError> for FetchError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Network(msg) | ClientError::Config(msg) => FetchError::Unavailable(msg),
            ClientError::Api { status, message } if is_gateway_status(status) => {
                FetchError::Unavailable(message)
            }
            ClientError::Api { status, message } => FetchError::Api {
                status,
                body: message,
            },
            ClientError::Parse(msg) => FetchError::Invalid(msg),
        }
    }
}

/// Gateway statuses mean the ledger itself never answered.
fn is_gateway_status(status: u16) -> bool {
    matches!(status, 502..=504)
}

/// Anything the ledger answered is a rejection carrying its message; a missing
/// answer (transport failure or gateway status) counts as unavailable.
impl From<ClientError> for LedgerError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Network(msg) | ClientError::Config(msg) => LedgerError::Unavailable(msg),
            ClientError::Api { status, message } if is_gateway_status(status) => {
                LedgerError::Unavailable(message)
            }
            ClientError::Api { message, .. } => LedgerError::Rejected(message),
            ClientError::Parse(msg) => LedgerError::Rejected(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, message: &str) -> ClientError {
        ClientError::Api {
            status,
            message: message.into(),
        }
    }

    #[test]
    fn gateway_statuses_are_unavailable_for_the_ledger() {
        for status in [502, 503, 504] {
            assert_eq!(
                LedgerError::from(api(status, "upstream down")),
                LedgerError::Unavailable("upstream down".into())
            );
        }
    }

    #[test]
    fn gateway_statuses_are_unavailable_for_fetches() {
        assert_eq!(
            FetchError::from(api(503, "maintenance")),
            FetchError::Unavailable("maintenance".into())
        );
        assert_eq!(
            FetchError::from(api(404, "no such page")),
            FetchError::Api {
                status: 404,
                body: "no such page".into(),
            }
        );
    }

    #[test]
    fn other_statuses_are_rejections() {
        assert_eq!(
            LedgerError::from(api(409, "insufficient stock")),
            LedgerError::Rejected("insufficient stock".into())
        );
        assert_eq!(
            LedgerError::from(api(500, "ledger crashed")),
            LedgerError::Rejected("ledger crashed".into())
        );
    }
}
