use std::{env, str::FromStr, time::Duration};

use exchange::BybitCredentials;
use rust_decimal::Decimal;
use thiserror::Error;
use trading::{AllocationConfig, AllocationError, MAX_TAKE_PROFITS, RiskSettings};

const DEFAULT_BASE_URL: &str = "https://api.bybit.com";
const DEFAULT_RECV_WINDOW: u64 = 5000;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: String, value: String },

    #[error("{0}")]
    OutOfRange(String),

    #[error("invalid take-profit allocation: {0}")]
    Allocation(#[from] AllocationError),
}

/// Everything the bot reads from the environment at startup.
pub struct Settings {
    pub telegram_token: String,
    pub channel_name: String,
    pub bybit: BybitCredentials,
    pub risk: RiskSettings,
    pub allocation: AllocationConfig,
    pub poll_interval: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let balance: Decimal = parse(&get, "BALANCE")?.ok_or(ConfigError::Missing("BALANCE"))?;
        if balance <= Decimal::ZERO {
            return Err(ConfigError::OutOfRange(format!(
                "BALANCE must be positive, got {}",
                balance
            )));
        }

        let risk_percent: Decimal = parse(&get, "AMOUNT")?.ok_or(ConfigError::Missing("AMOUNT"))?;
        if risk_percent <= Decimal::ZERO || risk_percent > Decimal::ONE_HUNDRED {
            return Err(ConfigError::OutOfRange(format!(
                "AMOUNT must be in (0, 100], got {}",
                risk_percent
            )));
        }

        let weights = (1..=MAX_TAKE_PROFITS)
            .map(|slot| {
                parse::<Decimal, _>(&get, &format!("TP{}", slot))
                    .map(|weight| weight.unwrap_or(Decimal::ZERO))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let allocation = AllocationConfig::new(weights)?;

        let bybit = BybitCredentials {
            api_key: required("BYBIT_API_KEY")?,
            api_secret: required("BYBIT_API_SECRET")?,
            base_url: get("BYBIT_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            recv_window: parse(&get, "BYBIT_RECV_WINDOW")?.unwrap_or(DEFAULT_RECV_WINDOW),
        };

        let poll_secs: u64 =
            parse(&get, "POLL_INTERVAL_SECS")?.unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        if poll_secs == 0 {
            return Err(ConfigError::OutOfRange(
                "POLL_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            telegram_token: required("TELEGRAM_BOT_TOKEN")?,
            channel_name: required("CHANNEL_NAME")?,
            bybit,
            risk: RiskSettings {
                balance,
                risk_percent,
            },
            allocation,
            poll_interval: Duration::from_secs(poll_secs),
        })
    }
}

fn parse<T, G>(get: &G, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value: raw,
            })
        })
        .transpose()
}
