use std::str::FromStr;

use axum::http::HeaderValue;

use crate::errors::{ResonateError, Result};

/// Defaults for the matching pipeline.
pub const DEFAULT_WINDOW_SIZE: usize = 5;
pub const DEFAULT_UNIT_TIME: f64 = 0.1;
pub const DEFAULT_NORMALIZATION: f64 = 10.0;
pub const DEFAULT_THRESHOLD: f64 = 0.1;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:data/resonate.db?mode=rwc";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_FPCALC_PATH: &str = "fpcalc";

///
/// Constants shared by token generation and scoring.
///
/// `unit_time` is the approximate duration of one fingerprint position in
/// seconds. It is not derived from the extractor; whoever runs the pipeline
/// has to supply the value that matches their extractor's frame rate.
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringConfig {
    window_size: usize,
    unit_time: f64,
    normalization: f64,
    threshold: f64,
}

impl ScoringConfig {
    pub fn new(window_size: usize, unit_time: f64, normalization: f64, threshold: f64)
        -> Result<Self> {

        if window_size == 0 {
            return Err(ResonateError::Config("window_size must be at least 1".into()));
        }
        if !unit_time.is_finite() || unit_time <= 0.0 {
            return Err(ResonateError::Config(
                format!("unit_time must be a positive number, got {unit_time}")
            ));
        }
        if !normalization.is_finite() || normalization <= 0.0 {
            return Err(ResonateError::Config(
                format!("normalization must be a positive number, got {normalization}")
            ));
        }
        if !(0.0..1.0).contains(&threshold) {
            return Err(ResonateError::Config(
                format!("threshold must lie in [0, 1), got {threshold}")
            ));
        }

        Ok(Self { window_size, unit_time, normalization, threshold })
    }

    pub fn window_size(&self) -> usize { self.window_size }
    pub fn unit_time(&self) -> f64 { self.unit_time }
    pub fn normalization(&self) -> f64 { self.normalization }
    pub fn threshold(&self) -> f64 { self.threshold }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            unit_time: DEFAULT_UNIT_TIME,
            normalization: DEFAULT_NORMALIZATION,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ResonateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(ResonateError::Config(format!("unknown LOG_FORMAT {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub format: LogFormat,
    pub include_target: bool,
    pub include_file_line: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: "info,resonate_match=debug,sqlx=warn".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
            include_file_line: false,
        }
    }
}

/// Origins allowed to call the HTTP API from a browser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CorsOrigins {
    #[default]
    Any,
    List(Vec<HeaderValue>),
}

impl FromStr for CorsOrigins {
    type Err = ResonateError;

    /// `*` allows every origin; otherwise a comma separated list.
    fn from_str(s: &str) -> Result<Self> {
        if s.trim() == "*" {
            return Ok(CorsOrigins::Any);
        }

        let origins = s.split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(|origin| HeaderValue::from_str(origin)
                .map_err(|_| ResonateError::Config(format!("invalid CORS origin {origin}"))))
            .collect::<Result<Vec<_>>>()?;

        if origins.is_empty() {
            return Err(ResonateError::Config("CORS_ALLOWED_ORIGINS lists no origins".into()));
        }
        Ok(CorsOrigins::List(origins))
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub fpcalc_path: String,
    pub cors_origins: CorsOrigins,
    pub scoring: ScoringConfig,
    pub logging: LoggingConfig,
}

/// Parse an optional variable, keeping `default` when it is unset or blank.
/// A value that is present but malformed is an error.
fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T)
    -> Result<T> {

    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim()
            .parse::<T>()
            .map_err(|_| ResonateError::Config(format!("{key} is not valid: {raw}"))),
        _ => Ok(default),
    }
}

fn string_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl AppConfig {
    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let scoring = ScoringConfig::new(
            parse_or(&lookup, "RESONATE_WINDOW_SIZE", DEFAULT_WINDOW_SIZE)?,
            parse_or(&lookup, "RESONATE_UNIT_TIME", DEFAULT_UNIT_TIME)?,
            parse_or(&lookup, "RESONATE_NORMALIZATION", DEFAULT_NORMALIZATION)?,
            parse_or(&lookup, "RESONATE_THRESHOLD", DEFAULT_THRESHOLD)?,
        )?;

        let mut logging = LoggingConfig::default();
        logging.format = parse_or(&lookup, "LOG_FORMAT", logging.format)?;
        logging.filter_directives = string_or(&lookup, "LOG_FILTER", &logging.filter_directives);

        Ok(Self {
            database_url: string_or(&lookup, "DATABASE_URL", DEFAULT_DATABASE_URL),
            bind_addr: string_or(&lookup, "BIND_ADDR", DEFAULT_BIND_ADDR),
            fpcalc_path: string_or(&lookup, "FPCALC_PATH", DEFAULT_FPCALC_PATH),
            cors_origins: parse_or(&lookup, "CORS_ALLOWED_ORIGINS", CorsOrigins::Any)?,
            scoring,
            logging,
        })
    }
}

///
/// Read `.env` (if any) and the process environment.
///
pub fn load_config() -> Result<AppConfig> {
    dotenvy::dotenv().ok();
    AppConfig::from_lookup(|key| std::env::var(key).ok())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = AppConfig::from_lookup(|_| None).unwrap();

        assert_eq!(cfg.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(cfg.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(cfg.fpcalc_path, "fpcalc");
        assert_eq!(cfg.cors_origins, CorsOrigins::Any);
        assert_eq!(cfg.scoring, ScoringConfig::default());
        assert_eq!(cfg.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn overrides_are_read() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("RESONATE_WINDOW_SIZE", "8"),
            ("RESONATE_UNIT_TIME", "0.124"),
            ("RESONATE_THRESHOLD", "0.25"),
            ("LOG_FORMAT", "JSON"),
            ("BIND_ADDR", "0.0.0.0:9000"),
        ])).unwrap();

        assert_eq!(cfg.scoring.window_size(), 8);
        assert_eq!(cfg.scoring.unit_time(), 0.124);
        assert_eq!(cfg.scoring.threshold(), 0.25);
        assert_eq!(cfg.scoring.normalization(), DEFAULT_NORMALIZATION);
        assert_eq!(cfg.logging.format, LogFormat::Json);
        assert_eq!(cfg.bind_addr, "0.0.0.0:9000");
    }

    #[test]
    fn malformed_numbers_fail_fast() {
        let err = AppConfig::from_lookup(lookup_from(&[("RESONATE_WINDOW_SIZE", "five")]))
            .unwrap_err();
        assert!(matches!(err, ResonateError::Config(_)));
    }

    #[test]
    fn invalid_scoring_constants_are_rejected() {
        assert!(ScoringConfig::new(0, 0.1, 10.0, 0.1).is_err());
        assert!(ScoringConfig::new(5, 0.0, 10.0, 0.1).is_err());
        assert!(ScoringConfig::new(5, 0.1, -1.0, 0.1).is_err());
        assert!(ScoringConfig::new(5, 0.1, f64::NAN, 0.1).is_err());
        assert!(ScoringConfig::new(5, 0.1, 10.0, 1.0).is_err());
        assert!(ScoringConfig::new(5, 0.1, 10.0, -0.1).is_err());
        assert!(ScoringConfig::new(1, 0.1, 10.0, 0.0).is_ok());
    }

    #[test]
    fn cors_origins_are_parsed() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("CORS_ALLOWED_ORIGINS", "http://localhost:3000, https://resonate.example"),
        ])).unwrap();

        assert_eq!(cfg.cors_origins, CorsOrigins::List(vec![
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("https://resonate.example"),
        ]));
        assert_eq!("*".parse::<CorsOrigins>().unwrap(), CorsOrigins::Any);
        assert!(" , ".parse::<CorsOrigins>().is_err());
        assert!("bad\norigin".parse::<CorsOrigins>().is_err());
    }
}
