pub mod proposals;
pub mod season;
pub mod simulate;
pub mod system;

pub use proposals::*;
pub use season::*;
pub use simulate::*;
pub use system::*;

use axum::http::StatusCode;

use crate::error::{BridgeError, YieldWarsError};

pub(crate) type ApiError = (StatusCode, String);

pub(crate) fn error_response(err: YieldWarsError) -> ApiError {
    let status = match &err {
        YieldWarsError::InvalidStateTransition { .. } | YieldWarsError::Validation(_) => {
            StatusCode::CONFLICT
        }
        YieldWarsError::UnknownAgent(_) | YieldWarsError::InvalidPool(_) => StatusCode::NOT_FOUND,
        YieldWarsError::Bridge(inner) => return bridge_error_response(inner.clone()),
        YieldWarsError::SimulationFailed(_) | YieldWarsError::Http(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

pub(crate) fn bridge_error_response(err: BridgeError) -> ApiError {
    let status = match &err {
        BridgeError::NoProposal { .. } | BridgeError::MissingContract { .. } => {
            StatusCode::NOT_FOUND
        }
        BridgeError::Disabled | BridgeError::WalletUnavailable | BridgeError::AlreadyInFlight { .. } => {
            StatusCode::CONFLICT
        }
        BridgeError::DemoCapReached { .. } => StatusCode::TOO_MANY_REQUESTS,
        BridgeError::PreflightRejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        BridgeError::TransactionFailed(_) | BridgeError::CounterNotAdvanced { .. } => {
            StatusCode::BAD_GATEWAY
        }
    };
    (status, err.reason())
}
