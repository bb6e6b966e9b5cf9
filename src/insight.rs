use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::EntityResult;
use crate::rollup::Rollup;

#[derive(Debug, Error)]
pub enum InsightError {
    #[error("INSIGHT_PROXY_URL is not configured")]
    NotConfigured,
    #[error("insight proxy returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("malformed insight response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
    #[error("insight proxy returned an empty narrative")]
    EmptyResponse,
}

/// Body posted to the narrative proxy.
#[derive(Debug, Serialize)]
pub struct InsightRequest<'a> {
    pub query: &'a str,
    pub view: String,
    pub period: &'a str,
    pub comparison: String,
    pub comparison_period: Option<&'a str>,
    pub results: &'a BTreeMap<String, EntityResult>,
}

impl<'a> InsightRequest<'a> {
    pub fn from_rollup(query: &'a str, rollup: &'a Rollup) -> Self {
        Self {
            query,
            view: rollup.view.to_string(),
            period: &rollup.period.label,
            comparison: rollup.mode.to_string(),
            comparison_period: rollup.comparison_period.as_ref().map(|p| p.label.as_str()),
            results: &rollup.entries,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InsightResponse {
    text: String,
}

pub struct InsightClient {
    http: reqwest::Client,
    endpoint: String,
}

impl InsightClient {
    pub fn new(endpoint: Option<&str>) -> Result<Self, InsightError> {
        let endpoint = endpoint
            .filter(|e| !e.trim().is_empty())
            .ok_or(InsightError::NotConfigured)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
        })
    }

    pub async fn narrate(&self, query: &str, rollup: &Rollup) -> Result<String, InsightError> {
        let request = InsightRequest::from_rollup(query, rollup);
        debug!(endpoint = %self.endpoint, entities = rollup.entries.len(), "requesting narrative");

        let response = self.http.post(&self.endpoint).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InsightError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: InsightResponse = serde_json::from_str(&body)?;
        if parsed.text.trim().is_empty() {
            return Err(InsightError::EmptyResponse);
        }
        info!(chars = parsed.text.len(), "narrative received");
        Ok(parsed.text)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::calendar::FiscalCalendar;
    use crate::models::{ComparisonMode, Kpi, KpiBundle, View};

    fn rollup() -> Rollup {
        let calendar = FiscalCalendar::new(2026, 2026).unwrap();
        let period = calendar.find_by_label("P4 FY2026").unwrap().clone();
        let comparison_period = calendar.previous_period(&period).cloned();
        let mut entries = BTreeMap::new();
        entries.insert(
            "Total Company".to_string(),
            EntityResult {
                actual: KpiBundle::empty().with(Kpi::Sales, 900.0),
                comparison: KpiBundle::empty().with(Kpi::Sales, 1000.0),
                variance: KpiBundle::empty().with(Kpi::Sales, -100.0),
            },
        );
        Rollup {
            view: View::Company,
            period,
            mode: ComparisonMode::PriorPeriod,
            comparison_period,
            total_key: "Total Company".to_string(),
            entries,
        }
    }

    #[test]
    fn request_carries_selection_and_results() {
        let rollup = rollup();
        let value = serde_json::to_value(InsightRequest::from_rollup("why down?", &rollup)).unwrap();
        assert_eq!(value["view"], "Total Company");
        assert_eq!(value["period"], "P4 FY2026");
        assert_eq!(value["comparison"], "vs. Prior Period");
        assert_eq!(value["comparison_period"], "P3 FY2026");
        assert_eq!(value["results"]["Total Company"]["variance"]["Sales"], -100.0);
    }

    #[test]
    fn missing_endpoint_is_reported() {
        assert!(matches!(InsightClient::new(None), Err(InsightError::NotConfigured)));
        assert!(matches!(InsightClient::new(Some("  ")), Err(InsightError::NotConfigured)));
    }

    #[tokio::test]
    async fn returns_narrative_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/insights"))
            .and(body_partial_json(json!({ "query": "summarize" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "Sales fell 10%." })))
            .mount(&server)
            .await;

        let endpoint = format!("{}/insights", server.uri());
        let client = InsightClient::new(Some(endpoint.as_str())).unwrap();
        let text = client.narrate("summarize", &rollup()).await.unwrap();
        assert_eq!(text, "Sales fell 10%.");
    }

    #[tokio::test]
    async fn surfaces_proxy_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let client = InsightClient::new(Some(server.uri().as_str())).unwrap();
        let err = client.narrate("summarize", &rollup()).await.unwrap_err();
        assert!(matches!(err, InsightError::Status { status: 502, ref body } if body == "upstream down"));
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let client = InsightClient::new(Some(server.uri().as_str())).unwrap();
        let err = client.narrate("summarize", &rollup()).await.unwrap_err();
        assert!(matches!(err, InsightError::MalformedResponse(_)));
    }
}
