use crate::auth::{CredentialProvider, clear_oauth_tokens};
use crate::config::Config;
use crate::error::Result;
use clap::Subcommand;
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum AuthProvider {
    /// Authenticate interactively and cache the OAuth2 token
    Oauth2 {
        /// Clear the cached token before authenticating
        #[arg(long)]
        reset: bool,
    },
    /// Check that the service account key loads
    ServiceAccount,
}

impl AuthProvider {
    pub async fn execute(&self) -> Result<()> {
        let config = Config::load()?;
        match self {
            AuthProvider::Oauth2 { reset } => authenticate_oauth2(&config, *reset).await,
            AuthProvider::ServiceAccount => verify_service_account(&config).await,
        }
    }
}

async fn authenticate_oauth2(config: &Config, reset: bool) -> Result<()> {
    if reset {
        clear_oauth_tokens(&config.google)?;
    }

    CredentialProvider::new(&config.google)
        .get_oauth2_credential()
        .await?;

    info!("OAuth2 authentication verified");

    Ok(())
}

async fn verify_service_account(config: &Config) -> Result<()> {
    CredentialProvider::new(&config.google)
        .get_service_account_credential()
        .await?;

    info!("Service account key loaded");

    Ok(())
}
