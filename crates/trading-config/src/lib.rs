//! Configuration management.

mod settings;

pub use settings::{
    AppConfig, AppSettings, ExchangeConfig, LoggingConfig, PaperSettings, TradeSettings,
};

use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use std::path::Path;
use thiserror::Error;
use trading_core::types::MarginMode;

/// A loaded configuration that cannot be run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("trade.symbols must list at least one instrument")]
    NoSymbols,

    #[error("trade.symbols contains an empty instrument id")]
    EmptySymbol,

    #[error("{0} must be greater than 0")]
    ZeroValue(&'static str),

    #[error("margin mode {0:?} is not supported, only cross margin is")]
    UnsupportedMarginMode(MarginMode),

    #[error("paper.initial_balance must not be negative")]
    NegativeBalance,
}

/// Load configuration from file and environment.
///
/// `TRADING__TRADE__EMA_PERIOD=50` overrides `trade.ema_period`;
/// `TRADING__TRADE__SYMBOLS` takes a comma-separated list.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix("TRADING")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("trade.symbols")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}

/// Check a loaded configuration for values that cannot be traded with.
pub fn validate_config(config: &AppConfig) -> Result<(), ValidationError> {
    let trade = &config.trade;

    if trade.symbols.is_empty() {
        return Err(ValidationError::NoSymbols);
    }
    if trade.symbols.iter().any(|s| s.trim().is_empty()) {
        return Err(ValidationError::EmptySymbol);
    }
    if trade.ema_period == 0 {
        return Err(ValidationError::ZeroValue("trade.ema_period"));
    }
    if trade.atr_period == 0 {
        return Err(ValidationError::ZeroValue("trade.atr_period"));
    }
    if trade.candle_limit == 0 {
        return Err(ValidationError::ZeroValue("trade.candle_limit"));
    }
    if trade.poll_interval_secs == 0 {
        return Err(ValidationError::ZeroValue("trade.poll_interval_secs"));
    }
    if config.exchange.margin_mode != MarginMode::Cross {
        return Err(ValidationError::UnsupportedMarginMode(config.exchange.margin_mode));
    }
    if config.paper.initial_balance < Decimal::ZERO {
        return Err(ValidationError::NegativeBalance);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::path::PathBuf;
    use trading_core::types::Timeframe;

    fn write_config(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "perp-trader-{}-{}.toml",
            name,
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();

        assert_eq!(config.trade.ema_period, 20);
        assert_eq!(config.trade.atr_period, 14);
        assert_eq!(config.exchange.margin_mode, MarginMode::Cross);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let path = write_config(
            "partial",
            r#"
[trade]
symbols = ["SOL-USDT-SWAP"]
timeframe = "4H"
ema_period = 50

[logging]
level = "debug"
format = "json"
"#,
        );

        let config = load_config(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.trade.symbols, vec!["SOL-USDT-SWAP".to_string()]);
        assert_eq!(config.trade.timeframe, Timeframe::Hour4);
        assert_eq!(config.trade.ema_period, 50);
        assert_eq!(config.trade.atr_period, 14);
        assert_eq!(config.trade.quote_currency, "USDT");
        assert!(config.logging.is_json());
        assert_eq!(config.exchange.api_key_env, "OKX_API_KEY");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_environment_overrides_file() {
        let path = write_config("env", "[paper]\ninitial_balance = 5000\n");
        std::env::set_var("TRADING__PAPER__INITIAL_BALANCE", "25000");

        let config = load_config(&path).unwrap();
        std::env::remove_var("TRADING__PAPER__INITIAL_BALANCE");
        std::fs::remove_file(&path).ok();

        assert_eq!(config.paper.initial_balance, dec!(25000));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_config(Path::new("/nonexistent/perp-trader.toml")).is_err());
    }

    #[test]
    fn test_validation_rejects_unusable_values() {
        let mut config = AppConfig::default();
        config.trade.symbols.clear();
        assert_eq!(validate_config(&config), Err(ValidationError::NoSymbols));

        let mut config = AppConfig::default();
        config.trade.symbols.push("  ".to_string());
        assert_eq!(validate_config(&config), Err(ValidationError::EmptySymbol));

        let mut config = AppConfig::default();
        config.trade.ema_period = 0;
        assert_eq!(
            validate_config(&config),
            Err(ValidationError::ZeroValue("trade.ema_period"))
        );

        let mut config = AppConfig::default();
        config.trade.atr_period = 0;
        assert_eq!(
            validate_config(&config),
            Err(ValidationError::ZeroValue("trade.atr_period"))
        );

        let mut config = AppConfig::default();
        config.exchange.margin_mode = MarginMode::Isolated;
        assert_eq!(
            validate_config(&config),
            Err(ValidationError::UnsupportedMarginMode(MarginMode::Isolated))
        );

        let mut config = AppConfig::default();
        config.paper.initial_balance = dec!(-1);
        assert_eq!(validate_config(&config), Err(ValidationError::NegativeBalance));
    }

    #[test]
    fn test_config_serializes_to_toml() {
        let rendered = toml::to_string_pretty(&AppConfig::default()).unwrap();

        assert!(rendered.contains("[trade]"));
        assert!(rendered.contains("ema_period = 20"));
        assert!(rendered.contains("margin_mode = \"cross\""));
        assert!(rendered.contains("timeframe = \"1H\""));
    }
}
