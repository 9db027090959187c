// Consensus odds across bookmakers.
//
// Spreads: median home line, then median prices among books quoting within
// a band of that line, so prices quoted against different lines are not
// mixed. Moneyline: plain medians per side.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::probability::AmericanOdds;

/// Default half-width of the band around the median spread line.
pub const DEFAULT_LINE_BAND: f64 = 0.5;

/// Market a bookmaker quote belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Spreads,
    /// Head-to-head, i.e. moneyline.
    H2h,
    Totals,
}

impl MarketType {
    /// Parse the storage label ("spreads", "h2h"/"moneyline", "totals").
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "spreads" | "spread" => Some(MarketType::Spreads),
            "h2h" | "moneyline" => Some(MarketType::H2h),
            "totals" | "total" => Some(MarketType::Totals),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MarketType::Spreads => "spreads",
            MarketType::H2h => "h2h",
            MarketType::Totals => "totals",
        }
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One bookmaker's quote for one market of one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsQuote {
    pub bookmaker: String,
    pub market: MarketType,
    /// Home spread (negative when home is favored) or total line.
    pub home_line: Option<f64>,
    pub home_price: Option<AmericanOdds>,
    pub away_price: Option<AmericanOdds>,
}

/// Representative lines and prices for one game. Every field is optional:
/// `None` means the market is unavailable, never "priced at parity".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsensusOdds {
    /// Home spread line (negative when home is favored).
    pub spread_line_home: Option<f64>,
    pub spread_price_home: Option<AmericanOdds>,
    pub spread_price_away: Option<AmericanOdds>,
    pub ml_price_home: Option<AmericanOdds>,
    pub ml_price_away: Option<AmericanOdds>,
}

impl ConsensusOdds {
    /// Reduce raw quotes to consensus values with the default line band.
    pub fn from_quotes(quotes: &[OddsQuote]) -> Self {
        Self::from_quotes_with_band(quotes, DEFAULT_LINE_BAND)
    }

    pub fn from_quotes_with_band(quotes: &[OddsQuote], line_band: f64) -> Self {
        let mut consensus = ConsensusOdds::default();

        // ---- Spreads ----
        let spread_quotes: Vec<(&OddsQuote, f64)> = quotes
            .iter()
            .filter(|q| q.market == MarketType::Spreads)
            .filter_map(|q| q.home_line.map(|line| (q, line)))
            .collect();

        let lines: Vec<f64> = spread_quotes.iter().map(|(_, line)| *line).collect();
        if let Some(median_line) = median(&lines) {
            let near_median: Vec<&OddsQuote> = spread_quotes
                .iter()
                .filter(|(_, line)| (line - median_line).abs() <= line_band)
                .map(|(q, _)| *q)
                .collect();

            if !near_median.is_empty() {
                consensus.spread_line_home = Some(median_line);
                consensus.spread_price_home =
                    median_price(near_median.iter().filter_map(|q| q.home_price));
                consensus.spread_price_away =
                    median_price(near_median.iter().filter_map(|q| q.away_price));
            }
        }

        // ---- Moneyline ----
        let ml_pairs: Vec<(AmericanOdds, AmericanOdds)> = quotes
            .iter()
            .filter(|q| q.market == MarketType::H2h)
            .filter_map(|q| q.home_price.zip(q.away_price))
            .collect();

        if !ml_pairs.is_empty() {
            consensus.ml_price_home = median_price(ml_pairs.iter().map(|(h, _)| *h));
            consensus.ml_price_away = median_price(ml_pairs.iter().map(|(_, a)| *a));
        }

        consensus
    }

    pub fn has_spread(&self) -> bool {
        self.spread_line_home.is_some()
    }

    pub fn has_moneyline(&self) -> bool {
        self.ml_price_home.is_some() || self.ml_price_away.is_some()
    }

    /// True when no market of any kind is available.
    pub fn is_empty(&self) -> bool {
        !self.has_spread() && !self.has_moneyline()
    }
}

// ---------------------------------------------------------------------------
// Coverage diagnostics
// ---------------------------------------------------------------------------

/// Why a game does or does not have usable markets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OddsCoverage {
    /// Spreads and moneyline both quoted.
    Complete,
    /// No quotes stored for the game at all.
    NoOdds,
    /// Only totals quoted; nothing the selector can use.
    OnlyTotals,
    /// Moneyline quoted but no spread with a line.
    MissingSpreads,
    /// Spread quoted but no moneyline with both prices.
    MissingMoneyline,
}

impl OddsCoverage {
    pub fn classify(quotes: &[OddsQuote]) -> Self {
        if quotes.is_empty() {
            return OddsCoverage::NoOdds;
        }
        let has_spreads = quotes
            .iter()
            .any(|q| q.market == MarketType::Spreads && q.home_line.is_some());
        let has_h2h = quotes.iter().any(|q| {
            q.market == MarketType::H2h && q.home_price.is_some() && q.away_price.is_some()
        });

        match (has_spreads, has_h2h) {
            (true, true) => OddsCoverage::Complete,
            (false, false) => OddsCoverage::OnlyTotals,
            (false, true) => OddsCoverage::MissingSpreads,
            (true, false) => OddsCoverage::MissingMoneyline,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OddsCoverage::Complete => "complete",
            OddsCoverage::NoOdds => "no_odds",
            OddsCoverage::OnlyTotals => "only_totals",
            OddsCoverage::MissingSpreads => "missing_spreads",
            OddsCoverage::MissingMoneyline => "missing_moneyline",
        }
    }
}

// ---------------------------------------------------------------------------
// Median helpers
// ---------------------------------------------------------------------------

/// Median of `values`; the mean of the two middle values for an even count.
/// `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Median price truncated toward zero to a whole American price.
fn median_price(prices: impl Iterator<Item = AmericanOdds>) -> Option<AmericanOdds> {
    let values: Vec<f64> = prices.map(f64::from).collect();
    median(&values).map(|m| m.trunc() as AmericanOdds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spread(book: &str, line: f64, home: i32, away: i32) -> OddsQuote {
        OddsQuote {
            bookmaker: book.into(),
            market: MarketType::Spreads,
            home_line: Some(line),
            home_price: Some(home),
            away_price: Some(away),
        }
    }

    fn h2h(book: &str, home: i32, away: i32) -> OddsQuote {
        OddsQuote {
            bookmaker: book.into(),
            market: MarketType::H2h,
            home_line: None,
            home_price: Some(home),
            away_price: Some(away),
        }
    }

    fn totals(book: &str) -> OddsQuote {
        OddsQuote {
            bookmaker: book.into(),
            market: MarketType::Totals,
            home_line: Some(221.5),
            home_price: Some(-110),
            away_price: Some(-110),
        }
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn empty_quotes_give_empty_consensus() {
        let c = ConsensusOdds::from_quotes(&[]);
        assert!(c.is_empty());
        assert_eq!(c, ConsensusOdds::default());
    }

    #[test]
    fn spread_prices_only_from_books_near_median_line() {
        let quotes = vec![
            spread("a", -6.5, -110, -110),
            spread("b", -6.5, -105, -115),
            spread("c", -7.0, -120, 100),
            spread("d", -9.5, 150, -180), // outlier line, excluded from prices
        ];
        let c = ConsensusOdds::from_quotes(&quotes);
        // lines sorted: -9.5, -7.0, -6.5, -6.5 -> median -6.75
        assert_eq!(c.spread_line_home, Some(-6.75));
        // a, b, c within 0.5 of -6.75; home prices -120,-110,-105 -> -110
        assert_eq!(c.spread_price_home, Some(-110));
        // away prices -115,-110,100 -> -110
        assert_eq!(c.spread_price_away, Some(-110));
    }

    #[test]
    fn even_count_price_median_truncates_toward_zero() {
        let quotes = vec![spread("a", -3.0, -110, -105), spread("b", -3.0, -115, -108)];
        let c = ConsensusOdds::from_quotes(&quotes);
        // (-110 + -115) / 2 = -112.5 -> -112
        assert_eq!(c.spread_price_home, Some(-112));
        // (-105 + -108) / 2 = -106.5 -> -106
        assert_eq!(c.spread_price_away, Some(-106));
    }

    #[test]
    fn missing_side_price_does_not_hide_other_side() {
        let mut q = spread("a", 2.5, -110, -110);
        q.away_price = None;
        let c = ConsensusOdds::from_quotes(&[q]);
        assert_eq!(c.spread_line_home, Some(2.5));
        assert_eq!(c.spread_price_home, Some(-110));
        assert_eq!(c.spread_price_away, None);
    }

    #[test]
    fn moneyline_medians_per_side() {
        let quotes = vec![h2h("a", -200, 170), h2h("b", -210, 175), h2h("c", -190, 165)];
        let c = ConsensusOdds::from_quotes(&quotes);
        assert_eq!(c.ml_price_home, Some(-200));
        assert_eq!(c.ml_price_away, Some(170));
        assert!(!c.has_spread());
        assert!(c.has_moneyline());
    }

    #[test]
    fn moneyline_requires_both_prices() {
        let mut half = h2h("a", -150, 130);
        half.away_price = None;
        let c = ConsensusOdds::from_quotes(&[half]);
        assert_eq!(c.ml_price_home, None);
        assert_eq!(c.ml_price_away, None);
    }

    #[test]
    fn totals_are_ignored() {
        let c = ConsensusOdds::from_quotes(&[totals("a"), totals("b")]);
        assert!(c.is_empty());
    }

    #[test]
    fn spread_without_line_is_ignored() {
        let mut q = spread("a", -4.0, -110, -110);
        q.home_line = None;
        let c = ConsensusOdds::from_quotes(&[q]);
        assert!(!c.has_spread());
    }

    #[test]
    fn coverage_classification() {
        assert_eq!(OddsCoverage::classify(&[]), OddsCoverage::NoOdds);
        assert_eq!(OddsCoverage::classify(&[totals("a")]), OddsCoverage::OnlyTotals);
        assert_eq!(
            OddsCoverage::classify(&[h2h("a", -110, -110)]),
            OddsCoverage::MissingSpreads
        );
        assert_eq!(
            OddsCoverage::classify(&[spread("a", -1.5, -110, -110)]),
            OddsCoverage::MissingMoneyline
        );
        assert_eq!(
            OddsCoverage::classify(&[spread("a", -1.5, -110, -110), h2h("a", -120, 100)]),
            OddsCoverage::Complete
        );
        assert_eq!(OddsCoverage::NoOdds.label(), "no_odds");
        for coverage in [OddsCoverage::Complete, OddsCoverage::NoOdds, OddsCoverage::OnlyTotals] {
            let json = serde_json::to_string(&coverage).unwrap();
            assert_eq!(json, format!("\"{}\"", coverage.label()));
        }
    }

    #[test]
    fn market_labels_parse() {
        assert_eq!(MarketType::from_label("h2h"), Some(MarketType::H2h));
        assert_eq!(MarketType::from_label("Spreads"), Some(MarketType::Spreads));
        assert_eq!(MarketType::from_label("totals"), Some(MarketType::Totals));
        assert_eq!(MarketType::from_label("props"), None);
        assert_eq!(MarketType::H2h.to_string(), "h2h");
    }
}
