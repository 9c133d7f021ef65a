use std::str::FromStr;
use std::sync::LazyLock;

use common::models::{Direction, Signal, ValidationError};
use regex::Regex;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, warn};

static TICKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z0-9]+/[A-Z0-9]+)\s+\((Long|Short)\)").unwrap());

static LEVERAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Leverage:.*?\((\d+)[xX]\)").unwrap());

// Consecutive "N) price" lines right after the marker; anything else closes the block.
static TAKE_PROFIT_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Take-Profit Targets:\s*((?:\d+\)\s*[\d.]+\s*)+)").unwrap()
});

static NUMBERED_PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\)\s*([\d.]+)").unwrap());

static STOP_LOSS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Stop Targets:\s*(?:\d+\)\s*)?([\d.]+)").unwrap());

/// Why a candidate post did not become a [`Signal`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("no ticker/direction")]
    NoTickerDirection,

    #[error("no leverage")]
    NoLeverage,

    #[error("no take-profits")]
    NoTakeProfits,

    #[error("no stop-loss")]
    NoStopLoss,

    #[error("malformed number '{0}'")]
    MalformedNumber(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

pub struct SignalParser;

impl SignalParser {
    /// Extracts a signal from the post body. Every failure is logged here
    /// once, so callers only need to move on.
    pub fn parse(text: &str) -> Result<Signal, RejectReason> {
        let result = Self::extract(text);

        match &result {
            Ok(signal) => debug!("Parsed signal: {}", signal),
            Err(reason) => {
                let ticker = TICKER_RE
                    .captures(text)
                    .and_then(|c| c.get(1))
                    .map_or("?", |m| m.as_str());
                warn!("Signal rejected ({}): {}", ticker, reason);
            }
        }

        result
    }

    fn extract(text: &str) -> Result<Signal, RejectReason> {
        let ticker_caps = TICKER_RE
            .captures(text)
            .ok_or(RejectReason::NoTickerDirection)?;
        let ticker = &ticker_caps[1];
        let direction = Direction::from_str(&ticker_caps[2])?;

        let leverage_raw = LEVERAGE_RE
            .captures(text)
            .map(|c| c[1].to_string())
            .ok_or(RejectReason::NoLeverage)?;
        let leverage = leverage_raw
            .parse::<i64>()
            .map_err(|_| RejectReason::MalformedNumber(leverage_raw.clone()))?;

        let block = TAKE_PROFIT_BLOCK_RE
            .captures(text)
            .map(|c| c[1].to_string())
            .ok_or(RejectReason::NoTakeProfits)?;
        let take_profits = NUMBERED_PRICE_RE
            .captures_iter(&block)
            .map(|c| parse_price(&c[1]))
            .collect::<Result<Vec<_>, _>>()?;
        if take_profits.is_empty() {
            return Err(RejectReason::NoTakeProfits);
        }

        let stop_loss = STOP_LOSS_RE
            .captures(text)
            .map(|c| c[1].to_string())
            .ok_or(RejectReason::NoStopLoss)?;
        let stop_loss = parse_price(&stop_loss)?;

        Ok(Signal::new(
            ticker,
            direction,
            leverage,
            take_profits,
            stop_loss,
            text,
        )?)
    }
}

fn parse_price(raw: &str) -> Result<Decimal, RejectReason> {
    // "50000." at the end of a sentence still counts as 50000
    Decimal::from_str(raw.trim_end_matches('.'))
        .map_err(|_| RejectReason::MalformedNumber(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = "🟩 BTC/USDT (Long)\n\
        Leverage: Cross (10X)\n\
        Entry Targets:\n\
        1) 49500\n\
        Take-Profit Targets:\n\
        1) 50000\n\
        2) 51000\n\
        Stop Targets: 48000";

    #[test]
    fn test_parses_full_signal() {
        let signal = SignalParser::parse(SAMPLE).unwrap();

        assert_eq!(signal.ticker(), "BTC/USDT");
        assert_eq!(signal.direction(), Direction::Long);
        assert_eq!(signal.leverage(), 10);
        assert_eq!(signal.take_profits(), &[dec!(50000), dec!(51000)]);
        assert_eq!(signal.stop_loss(), dec!(48000));
        assert_eq!(signal.raw_text(), SAMPLE);
    }

    #[test]
    fn test_parses_short_with_fractional_prices_and_numbered_stop() {
        let text = "🟥 1000PEPE/USDT (Short)\n\
            Leverage: Isolated (25x)\n\
            Entry Targets:\n\
            1) 0.01210\n\
            Take-Profit Targets:\n\
            1) 0.01180\n\
            2) 0.01150\n\
            3) 0.01100\n\
            Stop Targets:\n\
            1) 0.01290";

        let signal = SignalParser::parse(text).unwrap();

        assert_eq!(signal.ticker(), "1000PEPE/USDT");
        assert_eq!(signal.symbol(), "1000PEPEUSDT");
        assert_eq!(signal.direction(), Direction::Short);
        assert_eq!(signal.leverage(), 25);
        assert_eq!(
            signal.take_profits(),
            &[dec!(0.01180), dec!(0.01150), dec!(0.01100)]
        );
        assert_eq!(signal.stop_loss(), dec!(0.01290));
    }

    #[test]
    fn test_take_profit_block_stops_at_next_section() {
        let signal = SignalParser::parse(SAMPLE).unwrap();
        // the "1) 49500" entry line precedes the marker and must not leak in
        assert_eq!(signal.take_profits().len(), 2);
    }

    #[test]
    fn test_missing_ticker() {
        let text = SAMPLE.replace("BTC/USDT (Long)", "BTC long");
        assert_eq!(
            SignalParser::parse(&text),
            Err(RejectReason::NoTickerDirection)
        );
    }

    #[test]
    fn test_missing_leverage() {
        let text = SAMPLE.replace("Leverage: Cross (10X)", "Leverage: Cross");
        assert_eq!(SignalParser::parse(&text), Err(RejectReason::NoLeverage));
    }

    #[test]
    fn test_unnumbered_take_profits() {
        let text = SAMPLE
            .replace("1) 50000", "50000")
            .replace("2) 51000", "51000");
        assert_eq!(SignalParser::parse(&text), Err(RejectReason::NoTakeProfits));
    }

    #[test]
    fn test_missing_stop_loss() {
        let text = SAMPLE.replace("Stop Targets: 48000", "Stop Targets: TBA");
        assert_eq!(SignalParser::parse(&text), Err(RejectReason::NoStopLoss));
    }

    #[test]
    fn test_zero_leverage_surfaces_validation_reason() {
        let text = SAMPLE.replace("(10X)", "(0X)");
        assert_eq!(
            SignalParser::parse(&text),
            Err(RejectReason::Invalid(ValidationError::InvalidLeverage(0)))
        );
    }

    #[test]
    fn test_zero_stop_surfaces_validation_reason() {
        let text = SAMPLE.replace("Stop Targets: 48000", "Stop Targets: 0");
        assert_eq!(
            SignalParser::parse(&text),
            Err(RejectReason::Invalid(ValidationError::InvalidStopLoss(
                dec!(0)
            )))
        );
    }

    #[test]
    fn test_malformed_price_is_rejected() {
        let text = SAMPLE.replace("2) 51000", "2) 51.000.5");
        assert_eq!(
            SignalParser::parse(&text),
            Err(RejectReason::MalformedNumber("51.000.5".to_string()))
        );
    }

    #[test]
    fn test_trailing_dot_is_tolerated() {
        let text = SAMPLE.replace("Stop Targets: 48000", "Stop Targets: 48000.");
        assert_eq!(SignalParser::parse(&text).unwrap().stop_loss(), dec!(48000));
    }
}
