//! Vendor ad-platform adapters.
//!
//! Each vendor (Meta Graph API, TikTok Business API) gets an adapter that
//! turns a stored access token plus account id into normalized campaign and
//! insight records. Credential lookup and persistence stay with the caller.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod date_range;
pub mod meta;
pub mod status;
pub mod tiktok;

use crate::shared::models::CampaignStatus;
use date_range::DateRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorType {
    Meta,
    TikTok,
}

impl std::fmt::Display for VendorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Meta => write!(f, "meta"),
            Self::TikTok => write!(f, "tiktok"),
        }
    }
}

impl std::str::FromStr for VendorType {
    type Err = VendorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "meta" | "facebook" => Ok(Self::Meta),
            "tiktok" => Ok(Self::TikTok),
            _ => Err(VendorError::UnknownVendor(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub enum VendorError {
    UnknownVendor(String),
    /// Invalid or expired credential. Never retried; the user has to
    /// reconnect the account.
    AuthenticationFailed(String),
    /// Vendor-reported failure, including error payloads embedded in an
    /// HTTP 200 response.
    ApiError {
        code: Option<String>,
        message: String,
    },
    /// Transport-level failure: connect errors, timeouts, 5xx responses.
    NetworkError(String),
}

impl std::fmt::Display for VendorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownVendor(name) => write!(f, "Unknown vendor: {name}"),
            Self::AuthenticationFailed(msg) => {
                write!(f, "Authentication failed: {msg}. Reconnect your account.")
            }
            Self::ApiError { code, message } => {
                if let Some(c) = code {
                    write!(f, "Vendor API error [{c}]: {message}")
                } else {
                    write!(f, "Vendor API error: {message}")
                }
            }
            Self::NetworkError(msg) => write!(f, "Network error: {msg}"),
        }
    }
}

impl std::error::Error for VendorError {}

/// A vendor campaign after status/objective normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorCampaign {
    pub external_id: String,
    pub name: String,
    pub status: CampaignStatus,
    pub objective: Option<String>,
    pub budget: Option<f64>,
}

/// One time-bucketed performance record. Spend is always in major currency
/// units here; adapters convert minor units before returning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorInsight {
    pub date: NaiveDate,
    pub impressions: i64,
    pub clicks: i64,
    pub spend: f64,
    pub leads: i64,
}

#[async_trait::async_trait]
pub trait AdsProvider: Send + Sync {
    fn vendor(&self) -> VendorType;

    async fn fetch_campaigns(
        &self,
        access_token: &str,
        account_id: &str,
    ) -> Result<Vec<VendorCampaign>, VendorError>;

    async fn fetch_insights(
        &self,
        access_token: &str,
        account_id: &str,
        campaign_external_id: &str,
        range: &DateRange,
    ) -> Result<Vec<VendorInsight>, VendorError>;
}

/// Retry policy shared by the adapters: bounded retries with exponential
/// backoff on transport-class failures only. Auth and vendor-reported
/// errors are returned immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts,
            base_delay,
        }
    }

    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T, VendorError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, VendorError>>,
    {
        let mut delay = self.base_delay;
        let mut last = None;

        for attempt in 0..=self.attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err @ VendorError::NetworkError(_)) => {
                    if attempt < self.attempts {
                        log::warn!(
                            "vendor call failed ({}), retrying in {:?}",
                            err,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                    last = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last.unwrap_or_else(|| VendorError::NetworkError("retries exhausted".to_string())))
    }
}

pub(crate) fn transport_error(err: reqwest::Error) -> VendorError {
    if err.is_timeout() {
        VendorError::NetworkError("request timed out".to_string())
    } else {
        VendorError::NetworkError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn vendor_type_round_trips() {
        assert_eq!(VendorType::from_str("meta").unwrap(), VendorType::Meta);
        assert_eq!(VendorType::from_str("TikTok").unwrap(), VendorType::TikTok);
        assert!(VendorType::from_str("linkedin").is_err());
        assert_eq!(VendorType::Meta.to_string(), "meta");
    }

    #[tokio::test]
    async fn retry_policy_retries_network_errors_only() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(1));

        let result: Result<(), _> = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(VendorError::NetworkError("boom".to_string())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(VendorError::AuthenticationFailed("expired".to_string())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
