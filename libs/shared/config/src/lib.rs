use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub payment_gateway_base_url: String,
    pub payment_key_id: String,
    pub payment_key_secret: String,
    pub payment_currency: String,
    pub payment_timeout_minutes: i64,
    pub payment_sweep_interval_seconds: u64,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            jwt_secret: env::var("AUTH_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("AUTH_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            payment_gateway_base_url: env::var("PAYMENT_GATEWAY_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("PAYMENT_GATEWAY_BASE_URL not set, using default");
                    "https://api.razorpay.com".to_string()
                }),
            payment_key_id: env::var("PAYMENT_KEY_ID")
                .unwrap_or_else(|_| {
                    warn!("PAYMENT_KEY_ID not set, using empty value");
                    String::new()
                }),
            payment_key_secret: env::var("PAYMENT_KEY_SECRET")
                .unwrap_or_else(|_| {
                    warn!("PAYMENT_KEY_SECRET not set, using empty value");
                    String::new()
                }),
            payment_currency: env::var("PAYMENT_CURRENCY")
                .unwrap_or_else(|_| "INR".to_string()),
            payment_timeout_minutes: positive_or_default("PAYMENT_TIMEOUT_MINUTES", 15),
            payment_sweep_interval_seconds: positive_or_default("PAYMENT_SWEEP_INTERVAL_SECONDS", 60),
            server_port: parse_or_default("SERVER_PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        if !config.is_payment_configured() {
            warn!("Payment gateway credentials missing - order creation will fail");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.jwt_secret.is_empty()
    }

    pub fn is_payment_configured(&self) -> bool {
        !self.payment_key_id.is_empty() && !self.payment_key_secret.is_empty()
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    parse_value(key, env::var(key).ok().as_deref(), default)
}

/// Durations and intervals must be strictly positive.
fn positive_or_default<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display + PartialOrd + Default,
{
    positive_value(key, env::var(key).ok().as_deref(), default)
}

fn parse_value<T>(key: &str, raw: Option<&str>, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match raw {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        None => default,
    }
}

fn positive_value<T>(key: &str, raw: Option<&str>, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display + PartialOrd + Default,
{
    let value = parse_value(key, raw, default);
    if value > T::default() {
        value
    } else {
        warn!("{} must be positive, got {}, using default {}", key, value, default);
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppConfig {
        AppConfig {
            jwt_secret: "secret".to_string(),
            payment_gateway_base_url: "http://localhost".to_string(),
            payment_key_id: "key".to_string(),
            payment_key_secret: String::new(),
            payment_currency: "INR".to_string(),
            payment_timeout_minutes: 15,
            payment_sweep_interval_seconds: 60,
            server_port: 3000,
        }
    }

    #[test]
    fn test_payment_configuration_requires_both_credentials() {
        let mut config = sample();
        assert!(config.is_configured());
        assert!(!config.is_payment_configured());

        config.payment_key_secret = "shh".to_string();
        assert!(config.is_payment_configured());
    }

    #[test]
    fn test_parse_or_default_falls_back_on_missing_key() {
        let value: u16 = parse_or_default("CLINIC_BOOKING_TEST_UNSET_PORT", 4242);
        assert_eq!(value, 4242);
    }

    #[test]
    fn test_parse_value_falls_back_on_garbage() {
        assert_eq!(parse_value("SERVER_PORT", Some(" 8080 "), 3000u16), 8080);
        assert_eq!(parse_value("SERVER_PORT", Some("eighty"), 3000u16), 3000);
        assert_eq!(parse_value("SERVER_PORT", None, 3000u16), 3000);
    }

    #[test]
    fn test_timeouts_and_intervals_must_be_positive() {
        assert_eq!(positive_value("PAYMENT_SWEEP_INTERVAL_SECONDS", Some("0"), 60u64), 60);
        assert_eq!(positive_value("PAYMENT_SWEEP_INTERVAL_SECONDS", Some("-5"), 60u64), 60);
        assert_eq!(positive_value("PAYMENT_SWEEP_INTERVAL_SECONDS", Some("30"), 60u64), 30);

        assert_eq!(positive_value("PAYMENT_TIMEOUT_MINUTES", Some("-10"), 15i64), 15);
        assert_eq!(positive_value("PAYMENT_TIMEOUT_MINUTES", Some("0"), 15i64), 15);
        assert_eq!(positive_value("PAYMENT_TIMEOUT_MINUTES", Some("45"), 15i64), 45);
    }

    #[test]
    fn test_positive_or_default_reads_environment() {
        env::set_var("CLINIC_BOOKING_TEST_ZERO_INTERVAL", "0");
        let value: u64 = positive_or_default("CLINIC_BOOKING_TEST_ZERO_INTERVAL", 60);
        assert_eq!(value, 60);
    }
}
