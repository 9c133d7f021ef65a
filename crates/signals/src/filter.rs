/// Markers every structured alert carries.
pub const REQUIRED_MARKERS: [&str; 3] = ["Entry Targets:", "Take-Profit Targets:", "Stop Targets:"];

/// At least one of these must be present as well.
pub const SIGNAL_INDICATORS: [&str; 4] = ["🟩", "🟥", "(Long)", "(Short)"];

/// Cheap pre-screen run before the regex parser.
pub struct MessageFilter;

impl MessageFilter {
    pub fn is_candidate(text: Option<&str>) -> bool {
        let Some(text) = text else {
            return false;
        };

        REQUIRED_MARKERS.iter().all(|marker| text.contains(marker))
            && SIGNAL_INDICATORS.iter().any(|indicator| text.contains(indicator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "🟩 BTC/USDT (Long)\nEntry Targets:\n1) 49000\nTake-Profit Targets:\n1) 50000\nStop Targets: 48000";

    #[test]
    fn test_empty_or_absent_text_is_not_a_candidate() {
        assert!(!MessageFilter::is_candidate(None));
        assert!(!MessageFilter::is_candidate(Some("")));
    }

    #[test]
    fn test_all_markers_and_indicator_is_a_candidate() {
        assert!(MessageFilter::is_candidate(Some(FULL)));
    }

    #[test]
    fn test_missing_any_marker_is_rejected_even_with_indicators() {
        for marker in REQUIRED_MARKERS {
            let text = FULL.replace(marker, "");
            assert!(
                !MessageFilter::is_candidate(Some(&text)),
                "accepted text without '{}'",
                marker
            );
        }
    }

    #[test]
    fn test_markers_without_indicator_is_rejected() {
        let text = "BTC/USDT\nEntry Targets: 1\nTake-Profit Targets: 2\nStop Targets: 3";
        assert!(!MessageFilter::is_candidate(Some(text)));
    }

    #[test]
    fn test_each_indicator_alone_is_enough() {
        let base = "Entry Targets: 1\nTake-Profit Targets: 2\nStop Targets: 3 ";
        for indicator in SIGNAL_INDICATORS {
            let text = format!("{}{}", base, indicator);
            assert!(MessageFilter::is_candidate(Some(&text)));
        }
    }
}
