pub mod error;
pub mod types;

pub use error::{Ga4Error, Result};
pub use types::{CellValue, Named, ReportDateRange, ReportRow, RunReportRequest, RunReportResponse};

use std::time::Duration;

const BASE_URL: &str = "https://analyticsdata.googleapis.com/v1beta";

pub struct Ga4Client {
    client: reqwest::Client,
    base_url: String,
    property_id: String,
    token: String,
}

impl Ga4Client {
    pub fn new(property_id: &str, token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            property_id: property_id.to_string(),
            token: token.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Run a report against the configured property.
    pub async fn run_report(&self, request: &RunReportRequest) -> Result<RunReportResponse> {
        let endpoint = format!(
            "{}/properties/{}:runReport",
            self.base_url, self.property_id
        );

        tracing::debug!(property_id = %self.property_id, "Running report");

        let resp = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(Ga4Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
