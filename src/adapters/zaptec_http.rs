use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.zaptec.com";
const TOKEN_PATH: &str = "oauth/token";
const CHARGE_HISTORY_PATH: &str = "api/chargehistory";
const INSTALLATION_REPORT_PATH: &str = "api/chargehistory/installationreport";

/// Raw Zaptec wire calls. Authentication state lives above this seam.
pub trait ZaptecTransport {
    fn request_token(&self, username: &str, password: &str) -> Result<Value, TransportError>;
    fn get_charge_history(
        &self,
        bearer: &str,
        query: &ChargeHistoryQuery<'_>,
    ) -> Result<Value, TransportError>;
    fn post_installation_report(
        &self,
        bearer: &str,
        request: &InstallationReportRequest<'_>,
    ) -> Result<Value, TransportError>;
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("zaptec responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to parse zaptec response as JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("transport i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(error) => error.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeHistoryQuery<'a> {
    #[serde(rename = "installationId")]
    pub installation_id: &'a str,
    #[serde(rename = "From")]
    pub from: &'a str,
    #[serde(rename = "To")]
    pub to: &'a str,
    #[serde(rename = "DetailLevel")]
    pub detail_level: u8,
    #[serde(rename = "PageIndex")]
    pub page_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationReportRequest<'a> {
    pub from_date: &'a str,
    pub end_date: &'a str,
    pub installation_id: &'a str,
    pub group_by: u8,
}

#[derive(Debug, Clone)]
pub struct ZaptecHttpClient {
    base_url: String,
    client: Client,
}

impl ZaptecHttpClient {
    pub fn new(base_url: &str, timeout: Duration, verify_tls: bool) -> Result<Self, TransportError> {
        if !verify_tls {
            tracing::warn!(base_url, "TLS certificate verification is disabled");
        }

        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_tls)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn read_json(response: Response, endpoint: &str) -> Result<Value, TransportError> {
        let status = response.status();
        let body = response.text()?;

        tracing::debug!(
            endpoint,
            status = status.as_u16(),
            bytes = body.len(),
            "zaptec response received"
        );

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(TransportError::from)
    }
}

impl ZaptecTransport for ZaptecHttpClient {
    fn request_token(&self, username: &str, password: &str) -> Result<Value, TransportError> {
        let response = self
            .client
            .post(self.url(TOKEN_PATH))
            .form(&[
                ("grant_type", "password"),
                ("username", username),
                ("password", password),
            ])
            .send()?;
        Self::read_json(response, TOKEN_PATH)
    }

    fn get_charge_history(
        &self,
        bearer: &str,
        query: &ChargeHistoryQuery<'_>,
    ) -> Result<Value, TransportError> {
        let response = self
            .client
            .get(self.url(CHARGE_HISTORY_PATH))
            .bearer_auth(bearer)
            .query(query)
            .send()?;
        Self::read_json(response, CHARGE_HISTORY_PATH)
    }

    fn post_installation_report(
        &self,
        bearer: &str,
        request: &InstallationReportRequest<'_>,
    ) -> Result<Value, TransportError> {
        let response = self
            .client
            .post(self.url(INSTALLATION_REPORT_PATH))
            .bearer_auth(bearer)
            .json(request)
            .send()?;
        Self::read_json(response, INSTALLATION_REPORT_PATH)
    }
}
