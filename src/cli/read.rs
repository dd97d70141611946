use crate::auth::{AuthMode, CredentialProvider};
use crate::config::{Config, SheetConfig};
use crate::error::Result;
use crate::sheets::{SheetOperations, SheetsClient, print_first_column};
use clap::Args;
use std::io::Write;

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// How to authenticate against the Sheets API
    #[arg(long, value_enum, default_value_t = AuthMode::ServiceAccount)]
    pub auth: AuthMode,

    /// Spreadsheet to read, overriding the config file
    #[arg(long)]
    pub spreadsheet_id: Option<String>,

    /// Range in A1 notation, overriding the config file
    #[arg(long)]
    pub range: Option<String>,
}

impl ReadArgs {
    fn apply(&self, sheet: &mut SheetConfig) {
        if let Some(id) = &self.spreadsheet_id {
            sheet.spreadsheet_id = id.clone();
        }
        if let Some(range) = &self.range {
            sheet.range = range.clone();
        }
    }
}

pub async fn execute(args: &ReadArgs) -> Result<()> {
    let mut config = Config::load()?;
    args.apply(&mut config.sheet);

    let credential = CredentialProvider::new(&config.google)
        .credential(args.auth)
        .await?;
    let client = SheetsClient::new(credential, &config.google.application_name)?;

    read_and_print(&client, &config.sheet, &mut std::io::stdout()).await
}

async fn read_and_print<S, W>(client: &S, sheet: &SheetConfig, out: &mut W) -> Result<()>
where
    S: SheetOperations + Sync,
    W: Write,
{
    let value_range = client
        .read_range(&sheet.spreadsheet_id, &sheet.range)
        .await?;
    print_first_column(&value_range, out)
}
