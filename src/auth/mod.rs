mod oauth;
mod service_account;

pub use oauth::StoredCredential;
pub use oauth::clear_tokens as clear_oauth_tokens;
pub use service_account::ServiceAccountAuth;

use crate::config::GoogleConfig;
use crate::error::Result;
use clap::ValueEnum;
use oauth::InstalledFlow;
use std::fmt;
use tracing::instrument;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Interactive consent in the browser, token cached on disk
    #[value(name = "oauth2")]
    OAuth2,
    /// Service account key, no user interaction
    ServiceAccount,
}

pub enum Credential {
    OAuth2(StoredCredential),
    ServiceAccount(ServiceAccountAuth),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::OAuth2(stored) => f
                .debug_struct("OAuth2")
                .field("expires_at", &stored.expires_at)
                .finish_non_exhaustive(),
            Credential::ServiceAccount(_) => {
                f.debug_struct("ServiceAccount").finish_non_exhaustive()
            }
        }
    }
}

pub struct CredentialProvider<'a> {
    config: &'a GoogleConfig,
}

impl<'a> CredentialProvider<'a> {
    pub fn new(config: &'a GoogleConfig) -> Self {
        Self { config }
    }

    pub async fn credential(&self, mode: AuthMode) -> Result<Credential> {
        match mode {
            AuthMode::OAuth2 => self.get_oauth2_credential().await,
            AuthMode::ServiceAccount => self.get_service_account_credential().await,
        }
    }

    /// Obtain a user credential, asking for consent only when no usable
    /// credential is cached.
    #[instrument(name = "Authenticating with OAuth2", skip_all)]
    pub async fn get_oauth2_credential(&self) -> Result<Credential> {
        let flow = InstalledFlow::new(self.config).await?;
        let stored = flow.authorize().await?;
        Ok(Credential::OAuth2(stored))
    }

    #[instrument(name = "Authenticating with service account", skip_all)]
    pub async fn get_service_account_credential(&self) -> Result<Credential> {
        let key_path = self.config.service_account_key_path()?;
        let auth = service_account::from_key_file(&key_path).await?;
        Ok(Credential::ServiceAccount(auth))
    }
}

#[cfg(test)]
mod tests {
    use super::oauth::test_helpers::{
        cache_credential, mock_credential, write_client_secret, write_client_secret_with_token_uri,
    };
    use super::*;
    use crate::error::AppError;
    use std::net::TcpListener;
    use std::thread;
    use tiny_http::{Header, Response, Server};

    const SERVICE_ACCOUNT_KEY: &str = include_str!("testdata/service.json");

    fn test_config(dir: &std::path::Path, port: u16) -> GoogleConfig {
        GoogleConfig {
            client_secret: Some(dir.join("client_secret.json")),
            service_account_key: Some(dir.join("service.json")),
            token_cache_dir: Some(dir.join("tokens")),
            callback_port: port,
            ..Default::default()
        }
    }

    // Holding the port makes any attempt to start the callback listener fail.
    fn occupy_port() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[test]
    fn test_auth_mode_names() {
        assert_eq!(AuthMode::from_str("oauth2", false).unwrap(), AuthMode::OAuth2);
        assert_eq!(
            AuthMode::from_str("service-account", false).unwrap(),
            AuthMode::ServiceAccount
        );
        assert!(AuthMode::from_str("api-key", false).is_err());
    }

    #[tokio::test]
    async fn test_oauth2_missing_client_secret() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), 8080);

        let result = CredentialProvider::new(&config).get_oauth2_credential().await;

        assert!(matches!(result, Err(AppError::Config(_))));
        assert!(!dir.path().join("tokens").exists());
    }

    #[tokio::test]
    async fn test_oauth2_malformed_client_secret() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("client_secret.json"), "{\"installed\": 42}").unwrap();
        let config = test_config(dir.path(), 8080);

        let result = CredentialProvider::new(&config).get_oauth2_credential().await;

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_oauth2_cached_credential_skips_consent() {
        let dir = tempfile::tempdir().unwrap();
        write_client_secret(dir.path());
        let cached = mock_credential(3600, Some("1//refresh"));
        cache_credential(&dir.path().join("tokens"), &cached);
        let (_listener, port) = occupy_port();
        let config = test_config(dir.path(), port);

        let credential = CredentialProvider::new(&config)
            .credential(AuthMode::OAuth2)
            .await
            .unwrap();

        match credential {
            Credential::OAuth2(stored) => assert_eq!(stored, cached),
            other => panic!("expected OAuth2 credential, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_oauth2_expired_credential_requests_consent() {
        let dir = tempfile::tempdir().unwrap();
        write_client_secret(dir.path());
        cache_credential(&dir.path().join("tokens"), &mock_credential(-60, None));
        let (_listener, port) = occupy_port();
        let config = test_config(dir.path(), port);

        let result = CredentialProvider::new(&config).get_oauth2_credential().await;

        // Consent needs the callback listener, which can't bind here
        match result {
            Err(AppError::Auth(msg)) => assert!(msg.contains("Failed to bind")),
            other => panic!("expected bind failure, got {:?}", other),
        }
    }

    // Nothing listens on the returned port once the listener is dropped.
    fn closed_port() -> u16 {
        let (listener, port) = occupy_port();
        drop(listener);
        port
    }

    /// Serve one token response, as Google does for a refresh grant.
    fn serve_token_once(body: &'static str) -> (thread::JoinHandle<()>, u16) {
        let server = Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let handle = thread::spawn(move || {
            let request = server.recv().unwrap();
            let content_type =
                Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
            request
                .respond(Response::from_string(body).with_header(content_type))
                .unwrap();
        });
        (handle, port)
    }

    #[tokio::test]
    async fn test_oauth2_expired_credential_is_refreshed() {
        let dir = tempfile::tempdir().unwrap();
        let (token_server, token_port) = serve_token_once(
            r#"{"access_token":"ya29.refreshed","expires_in":3600,"token_type":"Bearer"}"#,
        );
        write_client_secret_with_token_uri(
            dir.path(),
            &format!("http://127.0.0.1:{}/token", token_port),
        );
        cache_credential(
            &dir.path().join("tokens"),
            &mock_credential(-60, Some("1//refresh")),
        );
        let (_listener, port) = occupy_port();
        let config = test_config(dir.path(), port);

        let credential = CredentialProvider::new(&config)
            .get_oauth2_credential()
            .await
            .unwrap();
        token_server.join().unwrap();

        let stored = match credential {
            Credential::OAuth2(stored) => stored,
            other => panic!("expected OAuth2 credential, got {:?}", other),
        };
        assert_eq!(stored.access_token, "ya29.refreshed");
        assert_eq!(stored.refresh_token.as_deref(), Some("1//refresh"));
        assert!(!stored.is_expired());

        let saved = std::fs::read_to_string(dir.path().join("tokens").join("user.json")).unwrap();
        let saved: StoredCredential = serde_json::from_str(&saved).unwrap();
        assert_eq!(saved, stored, "refreshed credential should be persisted");
    }

    #[tokio::test]
    async fn test_oauth2_failed_refresh_falls_back_to_consent() {
        let dir = tempfile::tempdir().unwrap();
        write_client_secret_with_token_uri(
            dir.path(),
            &format!("http://127.0.0.1:{}/token", closed_port()),
        );
        cache_credential(
            &dir.path().join("tokens"),
            &mock_credential(-60, Some("1//refresh")),
        );
        let (_listener, port) = occupy_port();
        let config = test_config(dir.path(), port);

        let result = CredentialProvider::new(&config).get_oauth2_credential().await;

        match result {
            Err(AppError::Auth(msg)) => assert!(msg.contains("Failed to bind")),
            other => panic!("expected bind failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_service_account_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), 8080);

        let result = CredentialProvider::new(&config)
            .credential(AuthMode::ServiceAccount)
            .await;

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_service_account_malformed_key() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("service.json"), "{\"type\": \"service_account\"}")
            .unwrap();
        let config = test_config(dir.path(), 8080);

        let result = CredentialProvider::new(&config)
            .get_service_account_credential()
            .await;

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_service_account_builds_without_oauth_resources() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("service.json"), SERVICE_ACCOUNT_KEY).unwrap();
        write_client_secret(dir.path());
        let (_listener, port) = occupy_port();
        let config = test_config(dir.path(), port);

        let credential = CredentialProvider::new(&config)
            .credential(AuthMode::ServiceAccount)
            .await
            .unwrap();

        assert!(matches!(credential, Credential::ServiceAccount(_)));
        assert!(!dir.path().join("tokens").exists());
    }

    #[tokio::test]
    async fn test_service_account_never_uses_oauth_resources() {
        let dir = tempfile::tempdir().unwrap();
        // A valid OAuth setup is present but must be ignored
        write_client_secret(dir.path());
        let (_listener, port) = occupy_port();
        let config = test_config(dir.path(), port);

        let result = CredentialProvider::new(&config)
            .credential(AuthMode::ServiceAccount)
            .await;

        match result {
            Err(AppError::Config(msg)) => assert!(msg.contains("service account")),
            other => panic!("expected service account config error, got {:?}", other),
        }
        assert!(!dir.path().join("tokens").exists());
    }
}
