//! Configuration validation integration tests

#[cfg(test)]
mod tests {
    use event_relay::config::Validate;
    use event_relay::config::models::*;
    use event_relay::{Config, Relay, RelayError};

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_yaml_sections_are_optional() {
        let config = Config::from_yaml("server:\n  url: \"https://relay.example.com\"\n").unwrap();
        assert_eq!(config.server().url, "https://relay.example.com");
        assert_eq!(config.relay.token_bucket.capacity, default_bucket_capacity());
        assert_eq!(config.feedback().timeout_secs, 600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_backoff_factor_below_one_rejected() {
        let mut config = RelayConfig::default();
        config.webhook.retry.backoff_factor = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unordered_health_thresholds_rejected() {
        let mut config = RelayConfig::default();
        config.health.queue_warning = 500;
        config.health.queue_critical = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_http_webhook_url_rejected() {
        let mut config = RelayConfig::default();
        config.webhook.main.url = Some("ftp://hooks.example.com".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_config_error_is_typed() {
        let config = Config::from_yaml("token_bucket:\n  refill_rate: 0\n").unwrap();
        assert!(matches!(config.validate(), Err(RelayError::Config(_))));
    }

    #[test]
    fn test_relay_builds_from_defaults() {
        let mut config = Config::default();
        config.relay.queue.backend = QueueBackend::Memory;
        assert!(Relay::new(config).is_ok());
    }
}
