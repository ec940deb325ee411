use serde::{Deserialize, Serialize};

/// Display-ready summary of the current weather for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub location_name: String,
    /// Local date at the moment of the call, not a payload timestamp.
    pub observed_at_local: String,
    pub temperature_c: i64,
    pub humidity_pct: u8,
    pub wind_speed_ms: f64,
}

/// Current-weather fields as delivered by the provider, before rounding.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentReading {
    pub location_name: String,
    pub temperature_c: f64,
    pub humidity_pct: u8,
    pub wind_speed_ms: f64,
}

/// One raw 3-hourly forecast record as delivered by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSample {
    pub timestamp: String,
    pub temperature_c: f64,
    pub humidity_pct: u8,
    pub icon_code: String,
    pub description: String,
}

/// The representative forecast for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date_local: String,
    pub temperature_c: i64,
    pub humidity_pct: u8,
    pub icon_url: String,
    /// Never empty; stands in for the icon when it cannot be shown.
    pub icon_alt: String,
}

/// Everything one pipeline call produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityWeather {
    pub current: CurrentConditions,
    pub daily: Vec<DailyForecast>,
}

/// Round to the nearest integer, ties toward positive infinity.
pub fn round_temperature(raw: f64) -> i64 {
    // `raw + 0.5` is itself rounded, so compare the fractional part instead.
    let floor = raw.floor();
    (if raw - floor >= 0.5 { floor + 1.0 } else { floor }) as i64
}
