//! Meta Graph API adapter.
//!
//! Fetches campaigns (`GET /{ad_account_id}/campaigns`) and per-campaign
//! daily insights (`GET /{campaign_id}/insights`). Auth failures (code 190 /
//! OAuthException) are surfaced distinctly so callers can prompt the user to
//! reconnect instead of retrying.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::date_range::{meta_date_preset, DateRange};
use super::status::map_meta_status;
use super::{transport_error, AdsProvider, RetryPolicy, VendorCampaign, VendorError, VendorInsight, VendorType};

pub struct MetaAdsProvider {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct GraphListResponse<T> {
    data: Option<Vec<T>>,
    error: Option<GraphErrorBody>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
    code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GraphCampaign {
    id: String,
    name: String,
    status: Option<String>,
    objective: Option<String>,
    daily_budget: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphInsight {
    date_start: Option<String>,
    impressions: Option<String>,
    clicks: Option<String>,
    spend: Option<String>,
    actions: Option<Vec<GraphAction>>,
}

#[derive(Debug, Deserialize)]
struct GraphAction {
    action_type: String,
    value: Option<String>,
}

impl MetaAdsProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            retry,
        }
    }

    fn classify_error(status: reqwest::StatusCode, error: &GraphErrorBody) -> VendorError {
        let is_auth = status == reqwest::StatusCode::UNAUTHORIZED
            || error.code == Some(190)
            || error.error_type.as_deref() == Some("OAuthException");

        if is_auth {
            VendorError::AuthenticationFailed(error.message.clone())
        } else {
            VendorError::ApiError {
                code: error.code.map(|c| c.to_string()),
                message: error.message.clone(),
            }
        }
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<Vec<T>, VendorError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(VendorError::NetworkError(format!("HTTP {status}")));
        }

        let body = response.text().await.map_err(transport_error)?;
        let parsed: GraphListResponse<T> =
            serde_json::from_str(&body).map_err(|e| VendorError::ApiError {
                code: None,
                message: format!("malformed response: {e}"),
            })?;

        // The Graph API reports some errors inside a 200 body.
        if let Some(error) = &parsed.error {
            return Err(Self::classify_error(status, error));
        }
        if !status.is_success() {
            return Err(VendorError::ApiError {
                code: None,
                message: format!("HTTP {status}"),
            });
        }

        Ok(parsed.data.unwrap_or_default())
    }

    fn insight_query(access_token: &str, range: &DateRange) -> Vec<(String, String)> {
        let today = chrono::Utc::now().date_naive();
        let preset = meta_date_preset(range, today);

        let mut query = vec![
            ("access_token".to_string(), access_token.to_string()),
            (
                "fields".to_string(),
                "impressions,clicks,spend,actions,date_start".to_string(),
            ),
            ("time_increment".to_string(), "1".to_string()),
        ];

        if let Some((since, until)) = preset.split_once('|') {
            query.push((
                "time_range".to_string(),
                format!("{{\"since\":\"{since}\",\"until\":\"{until}\"}}"),
            ));
        } else {
            query.push(("date_preset".to_string(), preset));
        }
        query
    }
}

fn parse_num<T: std::str::FromStr + Default>(raw: &Option<String>) -> T {
    raw.as_deref()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

fn lead_count(actions: &Option<Vec<GraphAction>>) -> i64 {
    actions
        .iter()
        .flatten()
        .filter(|a| a.action_type == "lead" || a.action_type.ends_with("lead_grouped"))
        .map(|a| parse_num::<i64>(&a.value))
        .sum()
}

#[async_trait::async_trait]
impl AdsProvider for MetaAdsProvider {
    fn vendor(&self) -> VendorType {
        VendorType::Meta
    }

    async fn fetch_campaigns(
        &self,
        access_token: &str,
        account_id: &str,
    ) -> Result<Vec<VendorCampaign>, VendorError> {
        let url = format!("{}/{}/campaigns", self.base_url, account_id);
        let query = vec![
            ("access_token".to_string(), access_token.to_string()),
            (
                "fields".to_string(),
                "id,name,status,objective,daily_budget".to_string(),
            ),
            ("limit".to_string(), "100".to_string()),
        ];

        let rows: Vec<GraphCampaign> = self.retry.run(|| self.get_list(&url, &query)).await?;

        Ok(rows
            .into_iter()
            .map(|c| VendorCampaign {
                external_id: c.id,
                name: c.name,
                status: map_meta_status(c.status.as_deref().unwrap_or("")),
                // Meta-sourced campaigns keep the raw vendor objective.
                objective: c.objective,
                // daily_budget is reported in minor currency units
                budget: c
                    .daily_budget
                    .as_deref()
                    .and_then(|b| b.parse::<f64>().ok())
                    .map(|b| b / 100.0),
            })
            .collect())
    }

    async fn fetch_insights(
        &self,
        access_token: &str,
        _account_id: &str,
        campaign_external_id: &str,
        range: &DateRange,
    ) -> Result<Vec<VendorInsight>, VendorError> {
        let url = format!("{}/{}/insights", self.base_url, campaign_external_id);
        let query = Self::insight_query(access_token, range);

        let rows: Vec<GraphInsight> = self.retry.run(|| self.get_list(&url, &query)).await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let date = row.date_start.as_deref()?.parse().ok()?;
                Some(VendorInsight {
                    date,
                    impressions: parse_num(&row.impressions),
                    clicks: parse_num(&row.clicks),
                    // Graph insights report spend in major currency units
                    spend: parse_num::<f64>(&row.spend),
                    leads: lead_count(&row.actions),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::CampaignStatus;
    use std::time::Duration;

    fn provider(base_url: &str) -> MetaAdsProvider {
        MetaAdsProvider::new(
            reqwest::Client::new(),
            base_url,
            RetryPolicy::new(0, Duration::from_millis(1)),
        )
    }

    #[tokio::test]
    async fn fetch_campaigns_parses_graph_response() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/act_123/campaigns")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"data":[
                    {"id":"1001","name":"Q1 Hiring","status":"ACTIVE","objective":"OUTCOME_LEADS","daily_budget":"2500"},
                    {"id":"1002","name":"Brand","status":"SOMETHING_NEW"}
                ]}"#,
            )
            .create_async()
            .await;

        let campaigns = provider(&server.url())
            .fetch_campaigns("token", "act_123")
            .await
            .unwrap();

        assert_eq!(campaigns.len(), 2);
        assert_eq!(campaigns[0].external_id, "1001");
        assert_eq!(campaigns[0].status, CampaignStatus::Active);
        assert_eq!(campaigns[0].objective.as_deref(), Some("OUTCOME_LEADS"));
        assert_eq!(campaigns[0].budget, Some(25.0));
        // unmapped Meta status falls back to draft
        assert_eq!(campaigns[1].status, CampaignStatus::Draft);
    }

    #[tokio::test]
    async fn oauth_exception_is_an_auth_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/act_123/campaigns")
            .match_query(mockito::Matcher::Any)
            .with_status(400)
            .with_body(
                r#"{"error":{"message":"Error validating access token","type":"OAuthException","code":190}}"#,
            )
            .create_async()
            .await;

        let err = provider(&server.url())
            .fetch_campaigns("expired", "act_123")
            .await
            .unwrap_err();

        assert!(matches!(err, VendorError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn embedded_error_in_200_body_is_detected() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/act_123/campaigns")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"error":{"message":"Unsupported request","code":100}}"#)
            .create_async()
            .await;

        let err = provider(&server.url())
            .fetch_campaigns("token", "act_123")
            .await
            .unwrap_err();

        match err {
            VendorError::ApiError { code, .. } => assert_eq!(code.as_deref(), Some("100")),
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_insights_parses_daily_rows_and_leads() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/1001/insights")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"data":[
                    {"date_start":"2026-02-01","impressions":"1000","clicks":"50","spend":"25",
                     "actions":[{"action_type":"lead","value":"4"},{"action_type":"link_click","value":"50"}]},
                    {"date_start":"2026-02-02","impressions":"0","clicks":"0","spend":"0"}
                ]}"#,
            )
            .create_async()
            .await;

        let range = DateRange::new(
            "2026-02-01".parse().unwrap(),
            "2026-02-08".parse().unwrap(),
        );
        let insights = provider(&server.url())
            .fetch_insights("token", "act_123", "1001", &range)
            .await
            .unwrap();

        assert_eq!(insights.len(), 2);
        assert_eq!(insights[0].impressions, 1000);
        assert_eq!(insights[0].clicks, 50);
        assert_eq!(insights[0].spend, 25.0);
        assert_eq!(insights[0].leads, 4);
        assert_eq!(insights[1].leads, 0);
    }
}
