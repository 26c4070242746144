//! Weather forecast tool backed by wttr.in's `j1` JSON format.
//!
//! The report is rendered as Markdown: location, current conditions, then
//! one table per forecast day. Network and decoding failures are returned
//! to the model as text rather than as tool errors.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use wela_core::error::ToolError;
use wela_core::tool::{Tool, ToolParameters};

use crate::required_str;

pub struct WeatherForecastTool {
    base_url: String,
    client: reqwest::Client,
}

impl WeatherForecastTool {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn fetch(&self, city: &str) -> Result<WttrReport, reqwest::Error> {
        let url = format!("{}/{}", self.base_url, city.replace(' ', "+"));
        debug!(%url, "Fetching weather report");
        self.client
            .get(url)
            .query(&[("format", "j1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl Tool for WeatherForecastTool {
    fn name(&self) -> &str {
        "get_weather_forecast"
    }

    fn description(&self) -> &str {
        "Get the weather forecast for a given city"
    }

    fn parameters(&self) -> ToolParameters {
        ToolParameters::object()
            .property("city", "string", "The city. e.g. San+Francisco")
            .require("city")
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<String, ToolError> {
        let city = required_str(&arguments, "city")?;
        match self.fetch(city).await {
            Ok(report) => Ok(report.to_markdown()),
            Err(e) => {
                warn!(%city, error = %e, "Weather lookup failed");
                Ok(e.to_string())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct TextValue {
    value: String,
}

fn first(values: &[TextValue]) -> &str {
    values.first().map(|v| v.value.as_str()).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct WttrReport {
    #[serde(default)]
    current_condition: Vec<CurrentCondition>,
    #[serde(default)]
    weather: Vec<DayForecast>,
    #[serde(default)]
    nearest_area: Vec<Area>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Area {
    area_name: Vec<TextValue>,
    region: Vec<TextValue>,
    country: Vec<TextValue>,
}

#[derive(Debug, Deserialize)]
struct CurrentCondition {
    #[serde(rename = "weatherDesc")]
    weather_desc: Vec<TextValue>,
    #[serde(rename = "temp_C")]
    temp_c: String,
    #[serde(rename = "FeelsLikeC")]
    feels_like_c: String,
    #[serde(rename = "winddir16Point")]
    wind_dir: String,
    #[serde(rename = "windspeedKmph")]
    wind_speed_kmph: String,
}

#[derive(Debug, Deserialize)]
struct DayForecast {
    date: String,
    #[serde(default)]
    hourly: Vec<Hourly>,
}

#[derive(Debug, Deserialize)]
struct Hourly {
    time: String,
    #[serde(rename = "weatherDesc")]
    weather_desc: Vec<TextValue>,
    #[serde(rename = "tempC")]
    temp_c: String,
    #[serde(rename = "FeelsLikeC")]
    feels_like_c: String,
    #[serde(rename = "winddir16Point")]
    wind_dir: String,
    #[serde(rename = "windspeedKmph")]
    wind_speed_kmph: String,
    #[serde(rename = "WindGustKmph")]
    wind_gust_kmph: String,
}

impl WttrReport {
    fn to_markdown(&self) -> String {
        let mut out = String::from("# Weather forecast\n## Location\n");
        if let Some(area) = self.nearest_area.first() {
            out.push_str(&format!(
                "{},{},{}\n",
                first(&area.area_name),
                first(&area.region),
                first(&area.country)
            ));
        }

        out.push_str("## Real-time Weather\n");
        if let Some(now) = self.current_condition.first() {
            out.push_str(&format!(
                "- Weather: {}\n- Temperature (Feels like): {}({})°C\n- Wind Direction/Speed: {} {}km/h\n",
                first(&now.weather_desc),
                now.temp_c,
                now.feels_like_c,
                now.wind_dir,
                now.wind_speed_kmph
            ));
        }

        for day in &self.weather {
            out.push_str(&format!(
                "## {}\n|Time|Weather|Temperature (Feels like)|Wind Direction/Speed|\n|-|-|-|-|\n",
                day.date
            ));
            for hour in &day.hourly {
                out.push_str(&format!(
                    "|{}|{}|{}({})°C|{} {}-{} km/h|\n",
                    clock_time(&hour.time),
                    first(&hour.weather_desc),
                    hour.temp_c,
                    hour.feels_like_c,
                    hour.wind_dir,
                    hour.wind_speed_kmph,
                    hour.wind_gust_kmph
                ));
            }
        }
        out
    }
}

/// wttr.in encodes hours as `HMM` integers ("0", "300", "1200").
fn clock_time(raw: &str) -> String {
    match raw.trim().parse::<u32>() {
        Ok(t) => format!("{:02}:{:02}", t / 100, t % 100),
        Err(_) => raw.to_string(),
    }
}
