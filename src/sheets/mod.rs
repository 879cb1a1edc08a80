//! Google Sheets sink - writes one reading per call into a fixed range
//!
//! Plain REST over reqwest against the v4 `values.update` endpoint.

pub mod auth;

use crate::config::SheetsSettings;
use crate::format::to_row;
use crate::sensor::Reading;
use auth::{AccessToken, ServiceAccount};
use serde::Serialize;
use serde_json::Value;

pub use auth::CredentialError;

/// Lets the API parse "21.5" as a number and the time as a date
const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("re-authentication failed: {0}")]
    Auth(#[from] CredentialError),
    #[error("sheets request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("sheets API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: Vec<Vec<Value>>,
}

// === Sink ===

pub struct SpreadsheetSink {
    client: reqwest::Client,
    account: ServiceAccount,
    token: AccessToken,
    sheet_id: String,
    api_base: String,
}

impl SpreadsheetSink {
    /// Load the key file and authenticate once
    pub async fn new(settings: &SheetsSettings) -> Result<Self, CredentialError> {
        let account = ServiceAccount::from_file(&settings.key_path)?;
        let client = reqwest::Client::new();
        let token = account.fetch_token(&client).await?;

        Ok(Self {
            client,
            account,
            token,
            sheet_id: settings.sheet_id.clone(),
            api_base: settings.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.api_base,
            urlencoding::encode(&self.sheet_id),
            urlencoding::encode(range)
        )
    }

    /// Overwrite `range` with a single (time, temperature) row
    pub async fn append(&mut self, reading: &Reading, range: &str) -> Result<(), WriteError> {
        if !self.token.is_fresh() {
            tracing::info!("Access token for {} expired, re-authenticating", self.account.client_email());
            self.token = self.account.fetch_token(&self.client).await?;
        }

        let body = ValueRange {
            range,
            major_dimension: "ROWS",
            values: vec![to_row(reading)],
        };
        tracing::debug!("Writing {:?} to {}", body.values, range);

        let response = self
            .client
            .put(self.values_url(range))
            .query(&[("valueInputOption", VALUE_INPUT_OPTION)])
            .bearer_auth(&self.token.value)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WriteError::Status { status, body });
        }

        tracing::info!("Appended reading to sheet {} at {}", self.sheet_id, range);
        Ok(())
    }
}
