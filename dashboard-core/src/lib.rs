//! Core library for the weather dashboard.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Abstraction over weather providers (OpenWeather)
//! - The fetch/sample pipeline producing display-ready models
//! - Rendering adapters (terminal text, HTML page)
//!
//! It is used by `dashboard-cli`, but the pipeline has no presentation
//! dependencies and can be driven by any front end.

pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod render;
pub mod sampling;

pub use config::{Config, ProviderConfig};
pub use error::PipelineError;
pub use model::{CityWeather, CurrentConditions, CurrentReading, DailyForecast, ForecastSample};
pub use pipeline::{PipelineOptions, WeatherPipeline};
pub use provider::{ProviderId, WeatherProvider};
pub use render::{HtmlRenderer, Renderer, TextRenderer};
pub use tokio_util::sync::CancellationToken;
