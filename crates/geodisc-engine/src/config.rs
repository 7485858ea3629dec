use std::time::Duration;

use geodisc_core::AppConfig;

/// Timing and sizing knobs for one discovery session.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub page_size: usize,
    pub debounce: Duration,
    /// How long a collapsing cluster keeps its exiting legs.
    pub settle: Duration,
    pub default_radius_meters: f64,
    pub initial_zoom: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: 60,
            debounce: Duration::from_millis(500),
            settle: Duration::from_millis(320),
            default_radius_meters: 1_000.0,
            initial_zoom: 14.0,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            page_size: config.page_size,
            debounce: Duration::from_millis(config.search_debounce_ms),
            settle: Duration::from_millis(config.settle_ms),
            default_radius_meters: config.default_radius_meters,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use geodisc_core::Environment;

    use super::*;

    #[test]
    fn from_app_config_copies_knobs() {
        let app = AppConfig {
            api_base_url: "http://localhost:3000".to_string(),
            env: Environment::Test,
            log_level: "info".to_string(),
            categories_path: None,
            page_size: 25,
            search_debounce_ms: 250,
            settle_ms: 100,
            default_radius_meters: 2_000.0,
            request_timeout_secs: 30,
            user_agent: "geodisc/0.1".to_string(),
            max_retries: 2,
            retry_backoff_base_secs: 1,
        };
        let config = EngineConfig::from_app_config(&app);
        assert_eq!(config.page_size, 25);
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert_eq!(config.settle, Duration::from_millis(100));
        assert!((config.default_radius_meters - 2_000.0).abs() < f64::EPSILON);
        assert!((config.initial_zoom - 14.0).abs() < f64::EPSILON);
    }
}
