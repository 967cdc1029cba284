//! Configuration structures.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trading_core::types::{MarginMode, Timeframe};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub trade: TradeSettings,
    #[serde(default)]
    pub paper: PaperSettings,
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "perp-trader".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
    /// Directory for daily-rolling log files
    pub file: Option<String>,
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

/// Exchange connection settings.
///
/// Credentials are never stored here, only the names of the environment
/// variables holding them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub name: String,
    /// Route requests to the exchange's demo trading environment
    pub simulated: bool,
    pub api_key_env: String,
    pub api_secret_env: String,
    pub passphrase_env: String,
    pub margin_mode: MarginMode,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            name: "okx".to_string(),
            simulated: true,
            api_key_env: "OKX_API_KEY".to_string(),
            api_secret_env: "OKX_API_SECRET".to_string(),
            passphrase_env: "OKX_API_PASSPHRASE".to_string(),
            margin_mode: MarginMode::Cross,
        }
    }
}

/// Instruments and indicator parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeSettings {
    pub symbols: Vec<String>,
    pub timeframe: Timeframe,
    /// Candles requested per instrument
    pub candle_limit: usize,
    pub ema_period: usize,
    pub atr_period: usize,
    pub poll_interval_secs: u64,
    pub quote_currency: String,
}

impl Default for TradeSettings {
    fn default() -> Self {
        Self {
            symbols: vec!["BTC-USDT-SWAP".to_string(), "ETH-USDT-SWAP".to_string()],
            timeframe: Timeframe::Hour1,
            candle_limit: 100,
            ema_period: 20,
            atr_period: 14,
            poll_interval_secs: 60,
            quote_currency: "USDT".to_string(),
        }
    }
}

/// Paper exchange settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperSettings {
    pub initial_balance: Decimal,
}

impl Default for PaperSettings {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            initial_balance: dec!(10000),
        }
    }
}
