//! Grid carbon intensity lookup against the Carbon Intensity API
//! (carbonintensity.org.uk).

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;

use crate::config::IntensityConfig;
use crate::error::{CarbonError, Result};

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%MZ";
const WINDOW_MINUTES: i64 = 30;

/// Source of grid carbon intensity in gCO2e/kWh for a point in time.
#[async_trait]
pub trait IntensityProvider: Send + Sync {
    async fn intensity_at(&self, time: DateTime<Utc>) -> Result<f64>;
}

#[derive(Debug, Deserialize)]
struct IntensityValue {
    forecast: Option<f64>,
    #[serde(default)]
    actual: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct IntensityPeriod {
    intensity: IntensityValue,
}

#[derive(Debug, Deserialize)]
struct NationalResponse {
    data: Vec<IntensityPeriod>,
}

#[derive(Debug, Deserialize)]
struct RegionalData {
    data: Vec<IntensityPeriod>,
}

#[derive(Debug, Deserialize)]
struct RegionalResponse {
    data: RegionalData,
}

pub struct CarbonIntensityClient {
    config: IntensityConfig,
    client: Client,
}

impl CarbonIntensityClient {
    pub fn new(config: IntensityConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(format!("carbon/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CarbonError::IntensityFetchFailure(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Request URL for the half-hour window starting at `time`.
    pub fn url(&self, time: DateTime<Utc>) -> String {
        let from = time.format(TIME_FORMAT);
        let to = (time + Duration::minutes(WINDOW_MINUTES)).format(TIME_FORMAT);
        let base = self.config.base_url.trim_end_matches('/');
        match self.config.region_id {
            Some(region_id) => {
                format!("{base}/regional/intensity/{from}/{to}/regionid/{region_id}")
            }
            None => format!("{base}/intensity/{from}/{to}"),
        }
    }

    fn first_period(periods: Vec<IntensityPeriod>) -> Result<IntensityValue> {
        periods
            .into_iter()
            .next()
            .map(|period| period.intensity)
            .ok_or_else(|| {
                CarbonError::IntensityFetchFailure("response contained no intensity data".to_string())
            })
    }

    fn missing(field: &str) -> CarbonError {
        CarbonError::IntensityFetchFailure(format!("response contained no {field} intensity"))
    }
}

#[async_trait]
impl IntensityProvider for CarbonIntensityClient {
    async fn intensity_at(&self, time: DateTime<Utc>) -> Result<f64> {
        let url = self.url(time);
        debug!("Fetching carbon intensity from {url}");

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| CarbonError::IntensityFetchFailure(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(CarbonError::IntensityFetchFailure(format!(
                "{status} {}",
                body.trim()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CarbonError::IntensityFetchFailure(e.to_string()))?;
        let parse_error = |e: serde_json::Error| {
            CarbonError::IntensityFetchFailure(format!("unexpected response body: {e}"))
        };

        if self.config.region_id.is_some() {
            let response: RegionalResponse = serde_json::from_str(&body).map_err(parse_error)?;
            let value = Self::first_period(response.data.data)?;
            return value.forecast.ok_or_else(|| Self::missing("forecast"));
        }

        let response: NationalResponse = serde_json::from_str(&body).map_err(parse_error)?;
        let value = Self::first_period(response.data)?;
        match (value.actual, value.forecast) {
            (Some(actual), _) => Ok(actual),
            (None, Some(forecast)) => {
                info!("No actual carbon intensity for {time}, using the forecast");
                Ok(forecast)
            }
            (None, None) => Err(Self::missing("actual or forecast")),
        }
    }
}
