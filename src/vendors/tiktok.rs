//! TikTok Business API adapter.
//!
//! Campaign list via `GET /campaign/get/`, daily metrics via
//! `POST /report/integrated/get/`. TikTok wraps every response in a
//! `{code, message, data}` envelope and reports failures with a non-zero
//! code inside an HTTP 200, so both layers are checked. Spend arrives in
//! minor currency units and is converted before leaving this module.

use chrono::{Duration, NaiveDate};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::date_range::{tiktok_bucket_days, tiktok_date_preset, DateRange};
use super::status::{display_objective, map_tiktok_status};
use super::{transport_error, AdsProvider, RetryPolicy, VendorCampaign, VendorError, VendorInsight, VendorType};

pub struct TikTokAdsProvider {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct TikTokEnvelope<T> {
    code: i64,
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TikTokList<T> {
    list: Option<Vec<T>>,
}

#[derive(Debug, Deserialize)]
struct TikTokCampaign {
    campaign_id: serde_json::Value,
    campaign_name: String,
    secondary_status: Option<String>,
    operation_status: Option<String>,
    objective_type: Option<String>,
    budget: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TikTokReportRow {
    dimensions: TikTokReportDims,
    metrics: TikTokReportMetrics,
}

#[derive(Debug, Deserialize)]
struct TikTokReportDims {
    stat_time_day: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TikTokReportMetrics {
    spend: Option<String>,
    impressions: Option<String>,
    clicks: Option<String>,
    conversion: Option<String>,
}

fn id_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_metric<T: std::str::FromStr + Default>(raw: &Option<String>) -> T {
    raw.as_deref()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

impl TikTokAdsProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            retry,
        }
    }

    fn classify_code(status: reqwest::StatusCode, code: i64, message: &str) -> VendorError {
        let is_auth =
            status == reqwest::StatusCode::UNAUTHORIZED || (40100..=40199).contains(&code);

        if is_auth {
            VendorError::AuthenticationFailed(message.to_string())
        } else {
            VendorError::ApiError {
                code: Some(code.to_string()),
                message: message.to_string(),
            }
        }
    }

    async fn unwrap_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, VendorError> {
        let status = response.status();
        if status.is_server_error() {
            return Err(VendorError::NetworkError(format!("HTTP {status}")));
        }

        let envelope: TikTokEnvelope<T> = response.json().await.map_err(|e| {
            VendorError::ApiError {
                code: None,
                message: format!("malformed response: {e}"),
            }
        })?;

        if envelope.code != 0 {
            let message = envelope.message.unwrap_or_else(|| "unknown error".to_string());
            return Err(Self::classify_code(status, envelope.code, &message));
        }

        envelope.data.ok_or_else(|| VendorError::ApiError {
            code: None,
            message: "response envelope had no data".to_string(),
        })
    }

    async fn get_campaigns_once(
        &self,
        access_token: &str,
        advertiser_id: &str,
    ) -> Result<Vec<TikTokCampaign>, VendorError> {
        let url = format!("{}/campaign/get/", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Access-Token", access_token)
            .query(&[("advertiser_id", advertiser_id), ("page_size", "100")])
            .send()
            .await
            .map_err(transport_error)?;

        let data: TikTokList<TikTokCampaign> = Self::unwrap_envelope(response).await?;
        Ok(data.list.unwrap_or_default())
    }

    async fn get_report_once(
        &self,
        access_token: &str,
        advertiser_id: &str,
        campaign_external_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TikTokReportRow>, VendorError> {
        let url = format!("{}/report/integrated/get/", self.base_url);
        let body = json!({
            "advertiser_id": advertiser_id,
            "report_type": "BASIC",
            "data_level": "AUCTION_CAMPAIGN",
            "dimensions": ["campaign_id", "stat_time_day"],
            "metrics": ["spend", "impressions", "clicks", "conversion"],
            "start_date": start.to_string(),
            "end_date": end.to_string(),
            "filters": [{
                "field_name": "campaign_ids",
                "filter_type": "IN",
                "filter_value": format!("[\"{campaign_external_id}\"]"),
            }],
            "page_size": 100,
        });

        let response = self
            .client
            .post(&url)
            .header("Access-Token", access_token)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let data: TikTokList<TikTokReportRow> = Self::unwrap_envelope(response).await?;
        Ok(data.list.unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl AdsProvider for TikTokAdsProvider {
    fn vendor(&self) -> VendorType {
        VendorType::TikTok
    }

    async fn fetch_campaigns(
        &self,
        access_token: &str,
        account_id: &str,
    ) -> Result<Vec<VendorCampaign>, VendorError> {
        let rows = self
            .retry
            .run(|| self.get_campaigns_once(access_token, account_id))
            .await?;

        Ok(rows
            .into_iter()
            .map(|c| {
                let raw_status = c
                    .secondary_status
                    .or(c.operation_status)
                    .unwrap_or_default();
                VendorCampaign {
                    external_id: id_string(&c.campaign_id),
                    name: c.campaign_name,
                    status: map_tiktok_status(&raw_status),
                    // TikTok-sourced campaigns store the display form
                    objective: c.objective_type.as_deref().map(display_objective),
                    budget: c.budget,
                }
            })
            .collect())
    }

    async fn fetch_insights(
        &self,
        access_token: &str,
        account_id: &str,
        campaign_external_id: &str,
        range: &DateRange,
    ) -> Result<Vec<VendorInsight>, VendorError> {
        // The report API only takes coarse lookback buckets.
        let preset = tiktok_date_preset(range);
        let end = chrono::Utc::now().date_naive();
        let start = end - Duration::days(tiktok_bucket_days(preset));

        let rows = self
            .retry
            .run(|| {
                self.get_report_once(access_token, account_id, campaign_external_id, start, end)
            })
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let raw_day = row.dimensions.stat_time_day?;
                let date = raw_day.get(..10)?.parse().ok()?;
                Some(VendorInsight {
                    date,
                    impressions: parse_metric(&row.metrics.impressions),
                    clicks: parse_metric(&row.metrics.clicks),
                    // reported in minor units (cents)
                    spend: parse_metric::<f64>(&row.metrics.spend) / 100.0,
                    leads: parse_metric(&row.metrics.conversion),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::CampaignStatus;
    use std::time::Duration as StdDuration;

    fn provider(base_url: &str) -> TikTokAdsProvider {
        TikTokAdsProvider::new(
            reqwest::Client::new(),
            base_url,
            RetryPolicy::new(0, StdDuration::from_millis(1)),
        )
    }

    #[tokio::test]
    async fn fetch_campaigns_normalizes_status_and_objective() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/campaign/get/")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"code":0,"message":"OK","data":{"list":[
                    {"campaign_id":7012345,"campaign_name":"Warehouse Staff","secondary_status":"CAMPAIGN_STATUS_ENABLE","objective_type":"LEAD_GENERATION","budget":50.0},
                    {"campaign_id":"7098765","campaign_name":"Drivers","secondary_status":"CAMPAIGN_STATUS_FROZEN"}
                ]}}"#,
            )
            .create_async()
            .await;

        let campaigns = provider(&server.url())
            .fetch_campaigns("token", "adv_1")
            .await
            .unwrap();

        assert_eq!(campaigns.len(), 2);
        assert_eq!(campaigns[0].external_id, "7012345");
        assert_eq!(campaigns[0].status, CampaignStatus::Active);
        assert_eq!(campaigns[0].objective.as_deref(), Some("lead generation"));
        // unmapped TikTok status falls back to paused
        assert_eq!(campaigns[1].status, CampaignStatus::Paused);
        assert_eq!(campaigns[1].external_id, "7098765");
    }

    #[tokio::test]
    async fn error_code_in_200_envelope_is_detected() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/campaign/get/")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"code":40002,"message":"Advertiser not found","data":null}"#)
            .create_async()
            .await;

        let err = provider(&server.url())
            .fetch_campaigns("token", "adv_1")
            .await
            .unwrap_err();

        match err {
            VendorError::ApiError { code, .. } => assert_eq!(code.as_deref(), Some("40002")),
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_token_code_is_an_auth_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/campaign/get/")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"code":40105,"message":"Access token is invalid","data":null}"#)
            .create_async()
            .await;

        let err = provider(&server.url())
            .fetch_campaigns("bad", "adv_1")
            .await
            .unwrap_err();

        assert!(matches!(err, VendorError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn report_spend_converts_cents_to_major_units() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/report/integrated/get/")
            .with_status(200)
            .with_body(
                r#"{"code":0,"message":"OK","data":{"list":[
                    {"dimensions":{"campaign_id":"7012345","stat_time_day":"2026-02-01 00:00:00"},
                     "metrics":{"spend":"1500","impressions":"2000","clicks":"80","conversion":"3"}}
                ]}}"#,
            )
            .create_async()
            .await;

        let range = DateRange::new(
            "2026-01-26".parse().unwrap(),
            "2026-02-02".parse().unwrap(),
        );
        let insights = provider(&server.url())
            .fetch_insights("token", "adv_1", "7012345", &range)
            .await
            .unwrap();

        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].date, "2026-02-01".parse().unwrap());
        assert_eq!(insights[0].spend, 15.0);
        assert_eq!(insights[0].impressions, 2000);
        assert_eq!(insights[0].clicks, 80);
        assert_eq!(insights[0].leads, 3);
    }
}
