use super::{SheetOperations, ValueRange};
use crate::auth::Credential;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use google_sheets4::api::{Scope, Sheets};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use tracing::{debug, instrument};

// Read/write access to all of the user's spreadsheets
pub const AUTH_SCOPE: Scope = Scope::Spreadsheet;

pub struct SheetsClient {
    hub: Sheets<HttpsConnector<HttpConnector>>,
}

impl SheetsClient {
    /// Bind a Sheets API client to a credential. No request is made until the
    /// first read.
    pub fn new(credential: Credential, application_name: &str) -> Result<Self> {
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| AppError::Sheets(format!("Failed to load native TLS roots: {}", e)))?
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(hyper_util::rt::TokioExecutor::new()).build(connector);

        let mut hub = match credential {
            Credential::OAuth2(stored) => Sheets::new(client, stored.access_token),
            Credential::ServiceAccount(auth) => Sheets::new(client, auth),
        };
        hub.user_agent(application_name.to_string());

        Ok(Self { hub })
    }
}

#[async_trait]
impl SheetOperations for SheetsClient {
    #[instrument(name = "Reading range", skip(self))]
    async fn read_range(&self, spreadsheet_id: &str, range: &str) -> Result<ValueRange> {
        let (_, response) = self
            .hub
            .spreadsheets()
            .values_get(spreadsheet_id, range)
            .major_dimension("ROWS")
            .add_scope(AUTH_SCOPE)
            .doit()
            .await
            .map_err(|e| AppError::Sheets(format!("Failed to read range '{}': {}", range, e)))?;

        let value_range = ValueRange::from_cells(response.range, response.values);
        debug!(
            range = ?value_range.range,
            rows = value_range.rows.as_ref().map_or(0, Vec::len),
            "Read range"
        );

        Ok(value_range)
    }
}
