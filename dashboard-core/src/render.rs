//! Rendering adapters. They only read a [`CityWeather`]; the pipeline never
//! calls them.

use std::fmt::Write;

use anyhow::{Context, Result};
use askama::Template;

use crate::model::CityWeather;

/// Turns pipeline output into something a user can look at.
pub trait Renderer {
    fn render(&self, weather: &CityWeather) -> Result<String>;
}

/// Plain-text summary for terminals.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextRenderer;

impl Renderer for TextRenderer {
    fn render(&self, weather: &CityWeather) -> Result<String> {
        let current = &weather.current;
        let mut out = String::new();

        let _ = writeln!(out, "{} ({})", current.location_name, current.observed_at_local);
        let _ = writeln!(out, "  Temperature: {} °C", current.temperature_c);
        let _ = writeln!(out, "  Humidity:    {}%", current.humidity_pct);
        let _ = writeln!(out, "  Wind speed:  {} m/s", current.wind_speed_ms);

        if !weather.daily.is_empty() {
            let _ = writeln!(out, "\n{}-day forecast:", weather.daily.len());
        }
        for day in &weather.daily {
            let _ = writeln!(
                out,
                "  {:<12} {:>4} °C  {:>3}%  {}",
                day.date_local, day.temperature_c, day.humidity_pct, day.icon_alt
            );
        }

        Ok(out)
    }
}

/// Page template; askama escapes every interpolated value.
#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate<'a> {
    title: &'a str,
    weather: &'a CityWeather,
}

/// Standalone HTML dashboard page.
#[derive(Debug, Clone)]
pub struct HtmlRenderer {
    title: String,
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self { title: "Weather Dashboard".to_string() }
    }
}

impl HtmlRenderer {
    pub fn with_title(title: impl Into<String>) -> Self {
        Self { title: title.into() }
    }
}

impl Renderer for HtmlRenderer {
    fn render(&self, weather: &CityWeather) -> Result<String> {
        let page = DashboardTemplate { title: &self.title, weather }
            .render()
            .context("Failed to render dashboard template")?;
        Ok(page)
    }
}
