//! Fetch-aggregate-sample pipeline behind the dashboard.
//!
//! One call fans out to the provider's current and forecast endpoints at the
//! same time, joins both, and only then turns the raw data into view models.
//! A call either yields a complete [`CityWeather`] or a single error.

use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::{Local, NaiveDateTime, format::{Item, StrftimeItems}};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::{
    Config, PipelineError,
    model::{
        CityWeather, CurrentConditions, CurrentReading, DailyForecast, ForecastSample,
        round_temperature,
    },
    provider::{WeatherProvider, default_provider_from_config},
    sampling::sample_daily,
};

/// Layout of the provider's `dt_txt` field.
const SAMPLE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Presentation settings applied while transforming provider data.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    icon_base_url: String,
    date_format: String,
    timeout: Duration,
}

impl PipelineOptions {
    /// Fails when `date_format` is not a valid strftime pattern.
    pub fn new(icon_base_url: &str, date_format: &str, timeout: Duration) -> Result<Self> {
        if StrftimeItems::new(date_format).any(|item| matches!(item, Item::Error)) {
            return Err(anyhow!("Invalid date format '{date_format}'"));
        }

        Ok(Self {
            icon_base_url: icon_base_url.trim_end_matches('/').to_string(),
            date_format: date_format.to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.icon_base_url,
            &config.date_format,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `<icon base>/<code>@2x.png`
    pub fn icon_url(&self, icon_code: &str) -> String {
        format!("{}/{icon_code}@2x.png", self.icon_base_url)
    }
}

#[derive(Debug)]
pub struct WeatherPipeline {
    provider: Box<dyn WeatherProvider>,
    options: PipelineOptions,
}

impl WeatherPipeline {
    pub fn new(provider: Box<dyn WeatherProvider>, options: PipelineOptions) -> Self {
        Self { provider, options }
    }

    /// Build the default provider and options from config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = default_provider_from_config(config)?;
        let options = PipelineOptions::from_config(config)?;
        Ok(Self::new(provider, options))
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub async fn fetch_city_weather(&self, city: &str) -> Result<CityWeather, PipelineError> {
        self.fetch_city_weather_with_cancel(city, &CancellationToken::new()).await
    }

    /// Like [`Self::fetch_city_weather`], but aborts both requests once `cancel` fires.
    #[instrument(skip(self, cancel), fields(timeout = ?self.options.timeout))]
    pub async fn fetch_city_weather_with_cancel(
        &self,
        city: &str,
        cancel: &CancellationToken,
    ) -> Result<CityWeather, PipelineError> {
        if city.trim().is_empty() {
            return Err(PipelineError::EmptyCity);
        }

        // Both futures are polled together; neither waits on the other.
        let both = async {
            tokio::join!(self.provider.fetch_current(city), self.provider.fetch_forecast(city))
        };

        let (current, forecast) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Weather fetch cancelled");
                return Err(PipelineError::Cancelled);
            }
            joined = tokio::time::timeout(self.options.timeout, both) => {
                joined.map_err(|_| {
                    warn!("Weather fetch timed out");
                    PipelineError::Timeout(self.options.timeout)
                })?
            }
        };

        let (reading, samples) = settle(current, forecast)?;
        debug!(samples = samples.len(), "Provider responses received");

        let weather = CityWeather {
            current: self.current_conditions(reading),
            daily: self.daily_forecasts(&samples)?,
        };

        debug!(days = weather.daily.len(), "Weather transformed");
        Ok(weather)
    }

    fn current_conditions(&self, reading: CurrentReading) -> CurrentConditions {
        CurrentConditions {
            location_name: reading.location_name,
            observed_at_local: Local::now().format(&self.options.date_format).to_string(),
            temperature_c: round_temperature(reading.temperature_c),
            humidity_pct: reading.humidity_pct,
            wind_speed_ms: reading.wind_speed_ms,
        }
    }

    fn daily_forecasts(
        &self,
        samples: &[ForecastSample],
    ) -> Result<Vec<DailyForecast>, PipelineError> {
        sample_daily(samples).map(|sample| self.daily_forecast(sample)).collect()
    }

    fn daily_forecast(&self, sample: &ForecastSample) -> Result<DailyForecast, PipelineError> {
        let at = NaiveDateTime::parse_from_str(&sample.timestamp, SAMPLE_TIMESTAMP_FORMAT)
            .map_err(|e| {
                PipelineError::MalformedResponse(format!(
                    "invalid forecast timestamp '{}': {e}",
                    sample.timestamp
                ))
            })?;

        if sample.description.trim().is_empty() {
            return Err(PipelineError::MalformedResponse(format!(
                "forecast sample {} has an empty description",
                sample.timestamp
            )));
        }

        Ok(DailyForecast {
            date_local: at.format(&self.options.date_format).to_string(),
            temperature_c: round_temperature(sample.temperature_c),
            humidity_pct: sample.humidity_pct,
            icon_url: self.options.icon_url(&sample.icon_code),
            icon_alt: sample.description.clone(),
        })
    }
}

/// Combine both outcomes. HTTP status failures take precedence over other
/// errors, and the current-weather call is reported before the forecast.
fn settle<C, F>(
    current: Result<C, PipelineError>,
    forecast: Result<F, PipelineError>,
) -> Result<(C, F), PipelineError> {
    match (current, forecast) {
        (Ok(c), Ok(f)) => Ok((c, f)),
        (Err(e @ PipelineError::Provider { .. }), _) => Err(e),
        (_, Err(e @ PipelineError::Provider { .. })) => Err(e),
        (Err(e), _) | (_, Err(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    #[derive(Debug, Clone)]
    enum Canned<T> {
        Ok(T),
        Status(u16),
        Malformed,
        Slow(Duration, T),
    }

    impl<T: Clone> Canned<T> {
        async fn resolve(&self) -> Result<T, PipelineError> {
            match self {
                Canned::Ok(v) => Ok(v.clone()),
                Canned::Status(status) => {
                    Err(PipelineError::Provider { status: *status, body: String::new() })
                }
                Canned::Malformed => Err(PipelineError::MalformedResponse("bad".into())),
                Canned::Slow(delay, v) => {
                    tokio::time::sleep(*delay).await;
                    Ok(v.clone())
                }
            }
        }
    }

    #[derive(Debug)]
    struct FakeProvider {
        current: Canned<CurrentReading>,
        forecast: Canned<Vec<ForecastSample>>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl WeatherProvider for FakeProvider {
        async fn fetch_current(&self, _city: &str) -> Result<CurrentReading, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.current.resolve().await
        }

        async fn fetch_forecast(
            &self,
            _city: &str,
        ) -> Result<Vec<ForecastSample>, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.forecast.resolve().await
        }
    }

    fn reading() -> CurrentReading {
        CurrentReading {
            location_name: "Sangli".into(),
            temperature_c: 29.6,
            humidity_pct: 48,
            wind_speed_ms: 4.12,
        }
    }

    fn samples(n: usize) -> Vec<ForecastSample> {
        (0..n)
            .map(|i| ForecastSample {
                timestamp: format!("2024-05-{:02} {:02}:00:00", 1 + i / 8, (i % 8) * 3),
                temperature_c: 20.0 + i as f64 + 0.4,
                humidity_pct: (40 + i) as u8,
                icon_code: format!("{:02}d", i),
                description: format!("sample {i}"),
            })
            .collect()
    }

    fn options() -> PipelineOptions {
        PipelineOptions::new("https://icons.test/wn", "%Y-%m-%d", Duration::from_secs(5))
            .expect("options should be valid")
    }

    fn pipeline(
        current: Canned<CurrentReading>,
        forecast: Canned<Vec<ForecastSample>>,
    ) -> (WeatherPipeline, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = FakeProvider { current, forecast, calls: calls.clone() };
        (WeatherPipeline::new(Box::new(provider), options()), calls)
    }

    #[tokio::test]
    async fn transforms_current_reading() {
        let (pipeline, _) = pipeline(Canned::Ok(reading()), Canned::Ok(samples(8)));

        let weather = pipeline.fetch_city_weather("Sangli").await.expect("should succeed");

        assert_eq!(weather.current.location_name, "Sangli");
        assert_eq!(weather.current.temperature_c, 30);
        assert_eq!(weather.current.humidity_pct, 48);
        assert!((weather.current.wind_speed_ms - 4.12).abs() < f64::EPSILON);
        assert!(!weather.current.observed_at_local.is_empty());
    }

    #[tokio::test]
    async fn samples_first_entry_of_each_day() {
        let (pipeline, _) = pipeline(Canned::Ok(reading()), Canned::Ok(samples(16)));

        let weather = pipeline.fetch_city_weather("Sangli").await.expect("should succeed");

        assert_eq!(weather.daily.len(), 2);
        assert_eq!(weather.daily[0].icon_alt, "sample 0");
        assert_eq!(weather.daily[1].icon_alt, "sample 8");
        assert_eq!(weather.daily[0].date_local, "2024-05-01");
        assert_eq!(weather.daily[1].date_local, "2024-05-02");
        assert_eq!(weather.daily[1].temperature_c, 28);
        assert_eq!(weather.daily[1].humidity_pct, 48);
        assert_eq!(weather.daily[1].icon_url, "https://icons.test/wn/08d@2x.png");
    }

    #[tokio::test]
    async fn daily_count_is_ceil_of_samples() {
        for n in [0, 1, 7, 8, 9, 39, 40] {
            let (pipeline, _) = pipeline(Canned::Ok(reading()), Canned::Ok(samples(n)));
            let weather = pipeline.fetch_city_weather("Sangli").await.expect("should succeed");
            assert_eq!(weather.daily.len(), n.div_ceil(8), "n = {n}");
        }
    }

    #[tokio::test]
    async fn empty_forecast_is_not_an_error() {
        let (pipeline, _) = pipeline(Canned::Ok(reading()), Canned::Ok(Vec::new()));

        let weather = pipeline.fetch_city_weather("Sangli").await.expect("should succeed");
        assert!(weather.daily.is_empty());
    }

    #[tokio::test]
    async fn current_404_wins_regardless_of_forecast() {
        for forecast in [Canned::Ok(samples(8)), Canned::Status(500), Canned::Malformed] {
            let (pipeline, _) = pipeline(Canned::Status(404), forecast);
            let err = pipeline.fetch_city_weather("Nowhere").await.unwrap_err();
            assert_eq!(err.status(), Some(404), "got {err:?}");
        }
    }

    #[tokio::test]
    async fn forecast_status_beats_current_parse_failure() {
        let (pipeline, _) = pipeline(Canned::Malformed, Canned::Status(503));

        let err = pipeline.fetch_city_weather("Sangli").await.unwrap_err();
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn malformed_forecast_fails_whole_call() {
        let (pipeline, _) = pipeline(Canned::Ok(reading()), Canned::Malformed);

        let err = pipeline.fetch_city_weather("Sangli").await.unwrap_err();
        assert!(matches!(err, PipelineError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn bad_sample_timestamp_is_malformed() {
        let mut list = samples(8);
        list[0].timestamp = "yesterday".into();
        let (pipeline, _) = pipeline(Canned::Ok(reading()), Canned::Ok(list));

        let err = pipeline.fetch_city_weather("Sangli").await.unwrap_err();
        assert!(matches!(err, PipelineError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn empty_description_is_malformed() {
        let mut list = samples(8);
        list[0].description = " ".into();
        let (pipeline, _) = pipeline(Canned::Ok(reading()), Canned::Ok(list));

        let err = pipeline.fetch_city_weather("Sangli").await.unwrap_err();
        assert!(matches!(err, PipelineError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn unselected_samples_are_not_validated() {
        let mut list = samples(9);
        list[3].timestamp = "garbage".into();
        let (pipeline, _) = pipeline(Canned::Ok(reading()), Canned::Ok(list));

        let weather = pipeline.fetch_city_weather("Sangli").await.expect("should succeed");
        assert_eq!(weather.daily.len(), 2);
    }

    #[tokio::test]
    async fn empty_city_makes_no_requests() {
        let (pipeline, calls) = pipeline(Canned::Ok(reading()), Canned::Ok(samples(8)));

        let err = pipeline.fetch_city_weather("   ").await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyCity));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn identical_responses_give_equal_results() {
        let (pipeline, _) = pipeline(Canned::Ok(reading()), Canned::Ok(samples(40)));

        let mut first = pipeline.fetch_city_weather("Sangli").await.expect("first call");
        let mut second = pipeline.fetch_city_weather("Sangli").await.expect("second call");

        // Only the call-time stamp may differ.
        first.current.observed_at_local.clear();
        second.current.observed_at_local.clear();
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn requests_run_concurrently() {
        let delay = Duration::from_secs(2);
        let (pipeline, _) = pipeline(
            Canned::Slow(delay, reading()),
            Canned::Slow(delay, samples(8)),
        );

        let started = tokio::time::Instant::now();
        pipeline.fetch_city_weather("Sangli").await.expect("should succeed");

        assert!(started.elapsed() < delay * 2, "took {:?}", started.elapsed());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let (pipeline, _) = pipeline(
            Canned::Slow(Duration::from_secs(60), reading()),
            Canned::Ok(samples(8)),
        );

        let err = pipeline.fetch_city_weather("Sangli").await.unwrap_err();
        assert!(matches!(err, PipelineError::Timeout(d) if d == Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn cancelled_token_aborts_call() {
        let (pipeline, _) = pipeline(
            Canned::Slow(Duration::from_secs(60), reading()),
            Canned::Ok(samples(8)),
        );
        let token = CancellationToken::new();
        token.cancel();

        let err = pipeline.fetch_city_weather_with_cancel("Sangli", &token).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }

    #[test]
    fn invalid_date_format_is_rejected() {
        let err = PipelineOptions::new("https://icons.test", "%Q", Duration::from_secs(1));
        assert!(err.is_err());
    }

    #[test]
    fn icon_url_follows_template() {
        let opts = PipelineOptions::new("https://icons.test/wn/", "%F", Duration::from_secs(1))
            .expect("options should be valid");
        assert_eq!(opts.icon_url("10n"), "https://icons.test/wn/10n@2x.png");
    }
}
