use crate::error::{AppError, Result};
use hyper_util::client::legacy::connect::HttpConnector;
use std::path::Path;
use tracing::{debug, instrument};
use yup_oauth2::{
    ServiceAccountAuthenticator, authenticator::Authenticator, hyper_rustls::HttpsConnector,
};

pub type ServiceAccountAuth = Authenticator<HttpsConnector<HttpConnector>>;

/// Build a service account authenticator from a key file.
///
/// Tokens are minted lazily for the scopes each API call asks for, so this
/// performs no network I/O and writes nothing to disk.
#[instrument(name = "Loading service account key", skip_all)]
pub(super) async fn from_key_file(key_path: &Path) -> Result<ServiceAccountAuth> {
    let key = yup_oauth2::read_service_account_key(key_path)
        .await
        .map_err(|e| {
            AppError::Config(format!(
                "Failed to load service account key from {:?}: {}",
                key_path, e
            ))
        })?;

    debug!(client_email = %key.client_email, "Loaded service account key");

    let auth = ServiceAccountAuthenticator::builder(key)
        .build()
        .await
        .map_err(|e| AppError::Config(format!("Invalid service account key: {}", e)))?;

    Ok(auth)
}
