//! Shared response handling for the REST-backed stores.

use std::time::Duration;

use coldvault_core::{ColdVaultError, ColdVaultResult, StorageError, StoreKind};
use reqwest::{Client, Response, StatusCode};

/// Build a client with the configured request timeout.
pub(crate) fn build_client(store: StoreKind, timeout: Duration) -> ColdVaultResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| StorageError::unavailable(store, format!("HTTP client setup failed: {}", e)).into())
}

/// Map a transport failure. Nothing reached the server or no answer came back.
pub(crate) fn transport_error(store: StoreKind, e: reqwest::Error) -> ColdVaultError {
    StorageError::unavailable(store, format!("HTTP request failed: {}", e)).into()
}

/// Map a non-success status.
///
/// 404 is NotFound for `key`. 408, 429 and 5xx are treated as transient and
/// reported as Unavailable; every other status is a Rejected request.
pub(crate) fn status_error(store: StoreKind, key: &str, status: StatusCode, body: String) -> ColdVaultError {
    let reason = if body.is_empty() {
        status.canonical_reason().unwrap_or("Unknown error").to_string()
    } else {
        body
    };

    match status {
        StatusCode::NOT_FOUND => StorageError::not_found(store, key).into(),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            StorageError::unavailable(store, format!("{}: {}", status.as_u16(), reason)).into()
        }
        s if s.is_server_error() => {
            StorageError::unavailable(store, format!("{}: {}", status.as_u16(), reason)).into()
        }
        _ => StorageError::Rejected {
            store,
            status: status.as_u16(),
            reason,
        }
        .into(),
    }
}

/// Pass a successful response through, otherwise map its status.
pub(crate) async fn check(store: StoreKind, key: &str, response: Response) -> ColdVaultResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(store, key, status, body))
}
