use std::convert::TryFrom;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Runtime configuration, loaded once at startup from a JSON file.
///
/// ```json
/// {
///     "theme": "succulent",
///     "brightness_day": 1.0,
///     "brightness_night": 0.5,
///     "temp_endpoint": "http://sensor.local/temperature",
///     "weather_endpoint": "http://sensor.local/weather",
///     "poll_interval_secs": 60,
///     "http_timeout_secs": 5,
///     "day_start_hour": 7,
///     "day_end_hour": 19
/// }
/// ```
///
/// The theme and both endpoints are required; everything else has a default.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub theme: String,
    pub brightness_day: f64,
    pub brightness_night: f64,
    pub temp_endpoint: String,
    pub weather_endpoint: String,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
    pub day_start_hour: u8,
    pub day_end_hour: u8,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("config file is not valid JSON: {0}")]
    Parse(#[from] json::Error),
    #[error("missing or invalid \"{0}\" value")]
    MissingKey(&'static str),
}

impl Config {
    pub const DEFAULT_BRIGHTNESS_DAY: f64 = 1.0;
    pub const DEFAULT_BRIGHTNESS_NIGHT: f64 = 0.5;
    pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
    pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 5;
    pub const DEFAULT_DAY_START_HOUR: u8 = 7;
    pub const DEFAULT_DAY_END_HOUR: u8 = 19;

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::try_from(json::parse(&fs::read_to_string(path)?)?)
    }

    /// Whether `now` falls within the configured day window,
    /// `[day_start_hour, day_end_hour)`.
    pub fn is_day(&self, now: time::OffsetDateTime) -> bool {
        let hour = now.hour();
        self.day_start_hour <= hour && hour < self.day_end_hour
    }

    /// The brightness multiplier to apply to the frame at `now`.
    pub fn brightness_at(&self, now: time::OffsetDateTime) -> f64 {
        if self.is_day(now) {
            self.brightness_day
        } else {
            self.brightness_night
        }
    }
}

impl TryFrom<json::JsonValue> for Config {
    type Error = ConfigError;

    fn try_from(mut json: json::JsonValue) -> Result<Self, Self::Error> {
        Ok(Self {
            theme: json
                .remove("theme")
                .as_str()
                .map(str::to_owned)
                .filter(|theme| !theme.is_empty())
                .ok_or(ConfigError::MissingKey("theme"))?,
            brightness_day: clamp_brightness(
                json.remove("brightness_day")
                    .as_f64()
                    .unwrap_or(Self::DEFAULT_BRIGHTNESS_DAY),
            ),
            brightness_night: clamp_brightness(
                json.remove("brightness_night")
                    .as_f64()
                    .unwrap_or(Self::DEFAULT_BRIGHTNESS_NIGHT),
            ),
            temp_endpoint: json
                .remove("temp_endpoint")
                .as_str()
                .map(str::to_owned)
                .filter(|url| !url.is_empty())
                .ok_or(ConfigError::MissingKey("temp_endpoint"))?,
            weather_endpoint: json
                .remove("weather_endpoint")
                .as_str()
                .map(str::to_owned)
                .filter(|url| !url.is_empty())
                .ok_or(ConfigError::MissingKey("weather_endpoint"))?,
            poll_interval: Duration::from_secs(
                json.remove("poll_interval_secs")
                    .as_u64()
                    .unwrap_or(Self::DEFAULT_POLL_INTERVAL_SECS),
            ),
            http_timeout: Duration::from_secs(
                json.remove("http_timeout_secs")
                    .as_u64()
                    .unwrap_or(Self::DEFAULT_HTTP_TIMEOUT_SECS),
            ),
            day_start_hour: json
                .remove("day_start_hour")
                .as_u8()
                .unwrap_or(Self::DEFAULT_DAY_START_HOUR)
                .min(23),
            day_end_hour: json
                .remove("day_end_hour")
                .as_u8()
                .unwrap_or(Self::DEFAULT_DAY_END_HOUR)
                .min(24),
        })
    }
}

fn clamp_brightness(value: f64) -> f64 {
    value.max(0.0).min(1.0)
}
