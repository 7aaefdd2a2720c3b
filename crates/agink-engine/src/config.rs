use std::env;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_VISION_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_GROUNDING_THRESHOLD: usize = 100;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: f64 = 120.0;
pub const MIN_REQUEST_TIMEOUT_SECONDS: f64 = 15.0;
pub const MAX_REQUEST_TIMEOUT_SECONDS: f64 = 300.0;

/// Settings for the generation gateway and its Gemini transport.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub api_base: String,
    pub text_model: String,
    pub vision_model: String,
    pub temperature: f64,
    /// Ideas shorter than this many characters enable search grounding.
    pub grounding_threshold_chars: usize,
    pub request_timeout_seconds: f64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            grounding_threshold_chars: DEFAULT_GROUNDING_THRESHOLD,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base: non_empty_env("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.api_base),
            text_model: non_empty_env("AGINK_TEXT_MODEL").unwrap_or(defaults.text_model),
            vision_model: non_empty_env("AGINK_VISION_MODEL").unwrap_or(defaults.vision_model),
            temperature: defaults.temperature,
            grounding_threshold_chars: non_empty_env("AGINK_GROUNDING_THRESHOLD")
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(defaults.grounding_threshold_chars),
            request_timeout_seconds: parse_request_timeout(
                non_empty_env("AGINK_REQUEST_TIMEOUT").as_deref(),
            ),
        }
    }

    /// The HTTP timeout, clamped to the supported range.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(clamp_request_timeout(self.request_timeout_seconds))
    }
}

/// Parses a timeout in seconds; unparsable values fall back to the default
/// and everything else is clamped to 15..=300.
pub fn parse_request_timeout(raw: Option<&str>) -> f64 {
    let parsed = raw.and_then(|value| value.trim().parse::<f64>().ok());
    clamp_request_timeout(parsed.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS))
}

fn clamp_request_timeout(seconds: f64) -> f64 {
    if seconds.is_nan() {
        return DEFAULT_REQUEST_TIMEOUT_SECONDS;
    }
    seconds.clamp(MIN_REQUEST_TIMEOUT_SECONDS, MAX_REQUEST_TIMEOUT_SECONDS)
}

/// Ambient Gemini credential from the environment.
pub fn env_api_key() -> Option<String> {
    non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY"))
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{
        parse_request_timeout, GatewayConfig, DEFAULT_GROUNDING_THRESHOLD,
        DEFAULT_REQUEST_TIMEOUT_SECONDS, DEFAULT_TEXT_MODEL,
    };

    #[test]
    fn defaults_match_published_models() {
        let config = GatewayConfig::default();
        assert_eq!(config.text_model, DEFAULT_TEXT_MODEL);
        assert_eq!(config.vision_model, "gemini-2.5-flash");
        assert_eq!(config.grounding_threshold_chars, DEFAULT_GROUNDING_THRESHOLD);
        assert!((config.temperature - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn request_timeout_is_clamped_to_supported_range() {
        assert_eq!(parse_request_timeout(None), DEFAULT_REQUEST_TIMEOUT_SECONDS);
        assert_eq!(parse_request_timeout(Some("45")), 45.0);
        assert_eq!(parse_request_timeout(Some("1e30")), 300.0);
        assert_eq!(parse_request_timeout(Some("inf")), 300.0);
        assert_eq!(parse_request_timeout(Some("-3")), 15.0);
        assert_eq!(parse_request_timeout(Some("NaN")), DEFAULT_REQUEST_TIMEOUT_SECONDS);
        assert_eq!(parse_request_timeout(Some("soon")), DEFAULT_REQUEST_TIMEOUT_SECONDS);
    }

    #[test]
    fn out_of_range_config_timeout_still_yields_a_duration() {
        let config = GatewayConfig {
            request_timeout_seconds: 1e30,
            ..GatewayConfig::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(300));

        let config = GatewayConfig {
            request_timeout_seconds: f64::NAN,
            ..GatewayConfig::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
    }
}
