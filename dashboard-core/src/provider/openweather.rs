use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    PipelineError,
    model::{CurrentReading, ForecastSample},
};

use super::WeatherProvider;

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self::with_client(api_key, base_url, Client::new())
    }

    pub fn with_client(api_key: String, base_url: String, http: Client) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self { api_key, base_url, http }
    }

    /// GET `<base>/<endpoint>` for `city` in metric units and decode the body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        city: &str,
    ) -> Result<T, PipelineError> {
        let url = format!("{}/{endpoint}", self.base_url);
        debug!(%url, city, "Requesting OpenWeather {endpoint}");

        let res = self
            .http
            .get(&url)
            .query(&[("q", city), ("appid", self.api_key.as_str()), ("units", "metric")])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), city, "OpenWeather {endpoint} request failed");
            // The status is the error; an unreadable body must not mask it.
            let body = res.text().await.unwrap_or_default();
            return Err(PipelineError::Provider {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let body = res.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            PipelineError::MalformedResponse(format!("OpenWeather {endpoint} JSON: {e}"))
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    icon: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    main: OwMain,
    wind: OwWind,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt_txt: String,
    main: OwMain,
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
}

impl From<OwCurrentResponse> for CurrentReading {
    fn from(parsed: OwCurrentResponse) -> Self {
        CurrentReading {
            location_name: parsed.name,
            temperature_c: parsed.main.temp,
            humidity_pct: parsed.main.humidity,
            wind_speed_ms: parsed.wind.speed,
        }
    }
}

impl TryFrom<OwForecastEntry> for ForecastSample {
    type Error = PipelineError;

    fn try_from(entry: OwForecastEntry) -> Result<Self, Self::Error> {
        let weather = entry.weather.into_iter().next().ok_or_else(|| {
            PipelineError::MalformedResponse(format!(
                "forecast entry {} has no weather condition",
                entry.dt_txt
            ))
        })?;

        Ok(ForecastSample {
            timestamp: entry.dt_txt,
            temperature_c: entry.main.temp,
            humidity_pct: entry.main.humidity,
            icon_code: weather.icon,
            description: weather.description,
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn fetch_current(&self, city: &str) -> Result<CurrentReading, PipelineError> {
        let parsed: OwCurrentResponse = self.get_json("weather", city).await?;
        Ok(parsed.into())
    }

    async fn fetch_forecast(&self, city: &str) -> Result<Vec<ForecastSample>, PipelineError> {
        let parsed: OwForecastResponse = self.get_json("forecast", city).await?;
        parsed.list.into_iter().map(ForecastSample::try_from).collect()
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}
