use crate::config::Config;

/// The most recently successfully polled temperature/condition pair.
///
/// Replaced only as a whole: a poll either produces a fully new observation
/// from one successful response pair, or the previous one is kept untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    pub temperature: Option<f64>,
    pub condition: Option<String>,
    pub last_updated: Option<time::OffsetDateTime>,
}

impl Observation {
    pub fn unknown() -> Self {
        Self {
            temperature: None,
            condition: None,
            last_updated: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("response is not valid JSON: {0}")]
    Parse(#[from] json::Error),
    #[error("missing or invalid \"{0}\" value")]
    MissingField(&'static str),
}

pub struct Poller {
    client: reqwest::blocking::Client,
    temp_endpoint: String,
    weather_endpoint: String,
}

impl Poller {
    pub fn new(config: &Config) -> Result<Self, PollError> {
        Ok(Self {
            client: reqwest::blocking::Client::builder()
                .timeout(config.http_timeout)
                .build()?,
            temp_endpoint: config.temp_endpoint.clone(),
            weather_endpoint: config.weather_endpoint.clone(),
        })
    }

    /// Query both endpoints. On success returns a fully new observation; on
    /// any failure (network, timeout, malformed body, missing field) logs the
    /// failure and returns the previous observation unchanged.
    pub fn poll(&self, previous: &Observation) -> Observation {
        match self.fetch() {
            Ok((temperature, condition)) => Observation {
                temperature: Some(temperature),
                condition: Some(condition),
                last_updated: Some(time::OffsetDateTime::now_utc()),
            },
            Err(err) => {
                log::warn!("Poll failed, keeping previous observation: {}", err);
                previous.clone()
            }
        }
    }

    fn fetch(&self) -> Result<(f64, String), PollError> {
        let temperature = parse_temperature(&self.get(&self.temp_endpoint)?)?;
        let condition = parse_condition(&self.get(&self.weather_endpoint)?)?;

        Ok((temperature, condition))
    }

    fn get(&self, url: &str) -> Result<String, PollError> {
        Ok(self.client.get(url).send()?.error_for_status()?.text()?)
    }
}

/// ```json
/// {"Temperature": 72.0}
/// ```
pub fn parse_temperature(body: &str) -> Result<f64, PollError> {
    json::parse(body)?
        .remove("Temperature")
        .as_f64()
        .ok_or(PollError::MissingField("Temperature"))
}

/// ```json
/// {"condition": "clear_day"}
/// ```
pub fn parse_condition(body: &str) -> Result<String, PollError> {
    json::parse(body)?
        .remove("condition")
        .as_str()
        .map(str::to_owned)
        .filter(|condition| !condition.is_empty())
        .ok_or(PollError::MissingField("condition"))
}
