use crate::config::GoogleConfig;
use crate::error::{AppError, Result};
use crate::sheets::AUTH_SCOPE;
use oauth2::{
    AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, PkceCodeChallenge, RedirectUrl, RefreshToken, Scope, StandardRevocableToken,
    TokenResponse, TokenUrl,
    basic::{
        BasicClient, BasicErrorResponse, BasicRevocationErrorResponse,
        BasicTokenIntrospectionResponse, BasicTokenResponse,
    },
};
use reqwest::redirect::Policy;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tiny_http::{Response, Server};
use tracing::{debug, info, instrument};
use url::Url;

// Credentials are cached per user; this tool only ever authorizes one.
const USER_ID: &str = "user";
const CALLBACK_PATH: &str = "/Callback";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StoredCredential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Expiry time as seconds since Unix epoch
    pub expires_at: i64,
}

impl StoredCredential {
    /// Check if the access token is expired or about to expire (within 5 minutes)
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.expires_at < (now + 300)
    }
}

/// File-backed credential store, one JSON file per user id.
pub(super) struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    pub(super) fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub(super) fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", user_id))
    }

    pub(super) fn load(&self, user_id: &str) -> Result<Option<StoredCredential>> {
        let path = self.path(user_id);

        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| AppError::Auth(format!("Failed to read credential file: {}", e)))?;

        let credential: StoredCredential = serde_json::from_str(&contents)
            .map_err(|e| AppError::Auth(format!("Failed to parse credential file: {}", e)))?;

        Ok(Some(credential))
    }

    pub(super) fn save(&self, user_id: &str, credential: &StoredCredential) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            AppError::Auth(format!("Failed to create token cache directory: {}", e))
        })?;

        let contents = serde_json::to_string_pretty(credential)
            .map_err(|e| AppError::Auth(format!("Failed to serialize credential: {}", e)))?;

        // Owner-only from creation
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(0o600)
            .open(self.path(user_id))
            .map_err(|e| AppError::Auth(format!("Failed to create credential file: {}", e)))?;

        file.write_all(contents.as_bytes())
            .map_err(|e| AppError::Auth(format!("Failed to write credential file: {}", e)))?;

        Ok(())
    }

    /// Returns whether a cached credential was removed
    pub(super) fn clear(&self, user_id: &str) -> Result<bool> {
        let path = self.path(user_id);

        if !path.exists() {
            return Ok(false);
        }

        fs::remove_file(&path)
            .map_err(|e| AppError::Auth(format!("Failed to delete credential file: {}", e)))?;

        Ok(true)
    }
}

// Type alias for the client when Auth and Token URLs are set
type ConfiguredClient = Client<
    BasicErrorResponse,
    BasicTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,    // HasAuthUrl
    EndpointNotSet, // HasDeviceAuthUrl
    EndpointNotSet, // HasIntrospectionUrl
    EndpointNotSet, // HasRevocationUrl
    EndpointSet,    // HasTokenUrl
>;

/// Authorization code flow for installed applications, with the redirect
/// received on a loopback listener.
pub(super) struct InstalledFlow {
    client: ConfiguredClient,
    http_client: reqwest::Client,
    callback_port: u16,
    store: TokenStore,
}

impl InstalledFlow {
    pub(super) async fn new(config: &GoogleConfig) -> Result<Self> {
        let secret_path = config.client_secret_path()?;
        let secret = yup_oauth2::read_application_secret(&secret_path)
            .await
            .map_err(|e| {
                AppError::Config(format!(
                    "Failed to load client secret from {:?}: {}",
                    secret_path, e
                ))
            })?;

        let auth_url = AuthUrl::new(secret.auth_uri)
            .map_err(|e| AppError::Config(format!("Invalid auth URL: {}", e)))?;
        let token_url = TokenUrl::new(secret.token_uri)
            .map_err(|e| AppError::Config(format!("Invalid token URL: {}", e)))?;

        let callback_port = config.callback_port;
        let redirect_url = format!("http://localhost:{}{}", callback_port, CALLBACK_PATH);
        let client = BasicClient::new(ClientId::new(secret.client_id))
            .set_client_secret(ClientSecret::new(secret.client_secret))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(
                RedirectUrl::new(redirect_url)
                    .map_err(|e| AppError::Config(format!("Invalid redirect URL: {}", e)))?,
            );

        let http_client = reqwest::ClientBuilder::new()
            .redirect(Policy::none())
            .build()
            .map_err(|e| AppError::Auth(format!("Failed to build reqwest client: {}", e)))?;

        Ok(Self {
            client,
            http_client,
            callback_port,
            store: TokenStore::new(config.token_cache_dir()?),
        })
    }

    /// Get a valid credential, refreshing or asking for consent as needed
    pub(super) async fn authorize(&self) -> Result<StoredCredential> {
        let Some(credential) = self.store.load(USER_ID)? else {
            debug!("No cached credential found, requesting consent...");
            return self.authenticate().await;
        };

        if !credential.is_expired() {
            debug!("Using cached credential");
            return Ok(credential);
        }

        let Some(refresh_token) = credential.refresh_token.as_deref() else {
            debug!("Cached credential expired without refresh token, requesting consent...");
            return self.authenticate().await;
        };

        debug!("Access token expired, refreshing...");

        match self.refresh_access_token(refresh_token).await {
            Ok(refreshed) => {
                debug!("Token refresh successful");
                Ok(refreshed)
            }
            Err(e) => {
                debug!("Token refresh failed ({}), requesting consent...", e);
                self.authenticate().await
            }
        }
    }

    #[instrument(name = "Waiting for OAuth2 consent", skip_all, fields(port = self.callback_port))]
    async fn authenticate(&self) -> Result<StoredCredential> {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        // Start a local server to receive the callback
        let bind_addr = format!("127.0.0.1:{}", self.callback_port);
        let server = Server::http(&bind_addr)
            .map_err(|e| AppError::Auth(format!("Failed to bind to {}: {}", bind_addr, e)))?;

        let (auth_url, csrf_token) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(AUTH_SCOPE.as_ref().to_string()))
            .set_pkce_challenge(pkce_challenge)
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();

        eprintln!("Open this URL in your browser:\n{}", auth_url);
        eprintln!();
        if let Err(e) = open::that(auth_url.as_str()) {
            debug!("Failed to open browser: {}", e);
        }
        eprintln!("Waiting for authorization...");

        let request = server
            .recv()
            .map_err(|e| AppError::Auth(format!("Failed to receive request: {}", e)))?;

        let outcome = parse_callback(self.callback_port, request.url(), csrf_token.secret());

        let message = match &outcome {
            Ok(_) => "Authentication successful! You can close this window.",
            Err(_) => "Authentication failed. You can close this window.",
        };
        request
            .respond(Response::from_string(message))
            .map_err(|e| AppError::Auth(format!("Failed to send response: {}", e)))?;

        let code = outcome?;

        let token_result = self
            .client
            .exchange_code(code)
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http_client)
            .await
            .map_err(|e| AppError::Auth(format!("Failed to exchange code: {:?}", e)))?;

        let credential = self.parse_and_save(token_result, None)?;
        info!("{}", saved_message(self.store.dir()));

        Ok(credential)
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<StoredCredential> {
        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| AppError::Auth(format!("Failed to refresh token: {:?}", e)))?;

        self.parse_and_save(token_result, Some(refresh_token))
    }

    /// Google omits the refresh token on refresh responses, so the previous
    /// one is carried over when given.
    fn parse_and_save(
        &self,
        token_result: BasicTokenResponse,
        fallback_refresh_token: Option<&str>,
    ) -> Result<StoredCredential> {
        let refresh_token = token_result
            .refresh_token()
            .map(|token| token.secret().clone())
            .or_else(|| fallback_refresh_token.map(str::to_string));

        let expires_in = token_result
            .expires_in()
            .map(|d| d.as_secs() as i64)
            .unwrap_or(3600);

        let credential = StoredCredential {
            access_token: token_result.access_token().secret().clone(),
            refresh_token,
            expires_at: chrono::Utc::now().timestamp() + expires_in,
        };

        self.store.save(USER_ID, &credential)?;

        Ok(credential)
    }
}

fn saved_message(dir: &Path) -> String {
    format!("Credentials saved to {}", dir.display())
}

/// Extract the authorization code from the redirect request path
fn parse_callback(port: u16, path: &str, expected_state: &str) -> Result<AuthorizationCode> {
    let callback_url = format!("http://localhost:{}{}", port, path);
    let url = Url::parse(&callback_url)
        .map_err(|e| AppError::Auth(format!("Failed to parse callback URL: {}", e)))?;

    if let Some((_, error)) = url.query_pairs().find(|(key, _)| key == "error") {
        return Err(AppError::Auth(format!("Authorization denied: {}", error)));
    }

    let (_, state) = url
        .query_pairs()
        .find(|(key, _)| key == "state")
        .ok_or_else(|| AppError::Auth("No state in callback".to_string()))?;

    if state != expected_state {
        return Err(AppError::Auth("CSRF token mismatch".to_string()));
    }

    let (_, code) = url
        .query_pairs()
        .find(|(key, _)| key == "code")
        .ok_or_else(|| AppError::Auth("No code in callback".to_string()))?;

    Ok(AuthorizationCode::new(code.into_owned()))
}

/// Clear the cached OAuth2 credential
#[instrument(name = "Clearing cached OAuth2 credential", skip_all)]
pub fn clear_tokens(config: &GoogleConfig) -> Result<()> {
    let store = TokenStore::new(config.token_cache_dir()?);

    match store.clear(USER_ID)? {
        true => info!(path = ?store.dir(), "Cleared cached credential"),
        false => debug!("No cached credential to clear"),
    }

    Ok(())
}
