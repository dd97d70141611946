mod auth;
mod read;
mod show;

use crate::error::Result;
use clap::{Parser, Subcommand};

pub use auth::AuthProvider;
pub use read::ReadArgs;
pub use show::ShowResource;

#[derive(Parser, Debug)]
#[command(name = "sheets-quickstart")]
#[command(about = "Read a range from Google Sheets using OAuth2 or a service account", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Read(args) => read::execute(args).await,
            Commands::Auth { provider } => provider.execute().await,
            Commands::Show { resource } => resource.execute().await,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read a range and print the first cell of each row
    Read(ReadArgs),
    /// Authenticate without reading anything
    Auth {
        #[command(subcommand)]
        provider: AuthProvider,
    },
    Show {
        #[command(subcommand)]
        resource: ShowResource,
    },
}
