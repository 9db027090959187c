// Bet selection: turn a predicted margin plus consensus odds into a single
// confidence-tiered recommendation.
//
// Candidates are generated in a fixed order (home ML, away ML, home spread,
// away spread) and every max-EV search keeps the first candidate it sees on
// ties, so the outcome is fully determined by the inputs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::game::Game;
use crate::odds::ConsensusOdds;
use crate::probability::{cover_prob_from_margin, ev, win_prob_from_margin, AmericanOdds};

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Moneyline,
    Spread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn label(&self) -> &'static str {
        match self {
            Side::Home => "HOME",
            Side::Away => "AWAY",
        }
    }
}

/// One priced bet shape for a game.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetCandidate {
    pub market: Market,
    pub side: Side,
    /// Line from the bettor's side; `None` for moneyline.
    pub line: Option<f64>,
    pub odds: AmericanOdds,
    /// Win (moneyline) or cover (spread) probability.
    pub probability: f64,
    /// Expected profit per unit staked.
    pub ev: f64,
}

impl BetCandidate {
    fn priced(
        market: Market,
        side: Side,
        line: Option<f64>,
        odds: AmericanOdds,
        probability: f64,
    ) -> Self {
        BetCandidate {
            market,
            side,
            line,
            odds,
            probability,
            ev: ev(probability, odds),
        }
    }
}

impl fmt::Display for BetCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.market, self.line) {
            (Market::Spread, Some(line)) => {
                write!(f, "{} {:+.1} @ {:+}", self.side.label(), line, self.odds)
            }
            _ => write!(f, "{} ML @ {:+}", self.side.label(), self.odds),
        }
    }
}

// ---------------------------------------------------------------------------
// Tiers and thresholds
// ---------------------------------------------------------------------------

/// Confidence attached to a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
    /// Markets exist but nothing clears the lowest threshold.
    NoBet,
    /// No market data for the game ("pending odds").
    NoOdds,
}

impl ConfidenceTier {
    pub const ALL: [ConfidenceTier; 5] = [
        ConfidenceTier::High,
        ConfidenceTier::Medium,
        ConfidenceTier::Low,
        ConfidenceTier::NoBet,
        ConfidenceTier::NoOdds,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceTier::High => "HIGH",
            ConfidenceTier::Medium => "MEDIUM",
            ConfidenceTier::Low => "LOW",
            ConfidenceTier::NoBet => "NO_BET",
            ConfidenceTier::NoOdds => "NO_ODDS",
        }
    }

    pub fn is_actionable(&self) -> bool {
        matches!(self, ConfidenceTier::High | ConfidenceTier::Medium)
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Minimum EV and probability a candidate needs for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThreshold {
    pub min_ev: f64,
    pub min_prob: f64,
}

impl TierThreshold {
    fn admits(&self, candidate: &BetCandidate) -> bool {
        candidate.ev >= self.min_ev && candidate.probability >= self.min_prob
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionThresholds {
    /// Spread candidates are skipped when |consensus line| exceeds this.
    pub max_spread: f64,
    pub high: TierThreshold,
    pub medium: TierThreshold,
    /// Its `min_prob` is also the floor a candidate must reach to be
    /// considered at all.
    pub low: TierThreshold,
}

impl Default for SelectionThresholds {
    fn default() -> Self {
        SelectionThresholds {
            max_spread: 14.0,
            high: TierThreshold {
                min_ev: 0.06,
                min_prob: 0.60,
            },
            medium: TierThreshold {
                min_ev: 0.03,
                min_prob: 0.57,
            },
            low: TierThreshold {
                min_ev: 0.00,
                min_prob: 0.52,
            },
        }
    }
}

impl SelectionThresholds {
    /// Tier for a candidate, testing HIGH, then MEDIUM, then LOW.
    pub fn tier_for(&self, candidate: &BetCandidate) -> ConfidenceTier {
        if self.high.admits(candidate) {
            ConfidenceTier::High
        } else if self.medium.admits(candidate) {
            ConfidenceTier::Medium
        } else if self.low.admits(candidate) {
            ConfidenceTier::Low
        } else {
            ConfidenceTier::NoBet
        }
    }
}

// ---------------------------------------------------------------------------
// Recommendation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BetRecommendation {
    pub game: Game,
    pub pred_margin: f64,
    pub sigma: f64,
    pub consensus_odds: ConsensusOdds,
    /// Max-EV candidate clearing the probability floor. Under `NO_BET` it is
    /// a near miss kept for context only.
    pub best_bet: Option<BetCandidate>,
    /// Best candidate by raw EV, thresholds ignored. Context only.
    pub best_overall: Option<BetCandidate>,
    pub all_candidates: Vec<BetCandidate>,
    pub confidence_tier: ConfidenceTier,
}

impl BetRecommendation {
    /// A best bet that earned LOW or better.
    pub fn has_recommendation(&self) -> bool {
        self.best_bet.is_some()
            && matches!(
                self.confidence_tier,
                ConfidenceTier::High | ConfidenceTier::Medium | ConfidenceTier::Low
            )
    }

    pub fn is_actionable(&self) -> bool {
        self.confidence_tier.is_actionable()
    }
}

/// Candidates in generation order. A missing price drops only its own
/// candidate; a spread beyond `max_spread` drops both spread candidates.
pub fn generate_candidates(
    pred_margin: f64,
    odds: &ConsensusOdds,
    sigma: f64,
    max_spread: f64,
) -> Vec<BetCandidate> {
    let mut candidates = Vec::with_capacity(4);

    let home_win = win_prob_from_margin(pred_margin, sigma);
    if let Some(price) = odds.ml_price_home {
        candidates.push(BetCandidate::priced(
            Market::Moneyline,
            Side::Home,
            None,
            price,
            home_win,
        ));
    }
    if let Some(price) = odds.ml_price_away {
        candidates.push(BetCandidate::priced(
            Market::Moneyline,
            Side::Away,
            None,
            price,
            1.0 - home_win,
        ));
    }

    if let Some(line) = odds.spread_line_home.filter(|l| l.abs() <= max_spread) {
        let home_cover = cover_prob_from_margin(pred_margin, line, sigma);
        if let Some(price) = odds.spread_price_home {
            candidates.push(BetCandidate::priced(
                Market::Spread,
                Side::Home,
                Some(line),
                price,
                home_cover,
            ));
        }
        if let Some(price) = odds.spread_price_away {
            candidates.push(BetCandidate::priced(
                Market::Spread,
                Side::Away,
                Some(-line),
                price,
                1.0 - home_cover,
            ));
        }
    }

    candidates
}

/// First candidate with the maximum EV.
fn first_max_ev<'a>(
    candidates: impl IntoIterator<Item = &'a BetCandidate>,
) -> Option<BetCandidate> {
    let mut best: Option<&BetCandidate> = None;
    for candidate in candidates {
        match best {
            Some(current) if candidate.ev <= current.ev => {}
            _ => best = Some(candidate),
        }
    }
    best.copied()
}

/// Pick the recommended bet for one game.
pub fn select_best_bet(
    game: &Game,
    pred_margin: f64,
    consensus_odds: &ConsensusOdds,
    sigma: f64,
    thresholds: &SelectionThresholds,
) -> BetRecommendation {
    let candidates =
        generate_candidates(pred_margin, consensus_odds, sigma, thresholds.max_spread);

    let mut recommendation = BetRecommendation {
        game: game.clone(),
        pred_margin,
        sigma,
        consensus_odds: *consensus_odds,
        best_bet: None,
        best_overall: None,
        all_candidates: Vec::new(),
        confidence_tier: ConfidenceTier::NoOdds,
    };
    if candidates.is_empty() {
        return recommendation;
    }

    recommendation.best_overall = first_max_ev(&candidates);
    recommendation.confidence_tier = ConfidenceTier::NoBet;

    let floor = thresholds.low.min_prob;
    let above_floor = candidates.iter().filter(|c| c.probability >= floor);
    if let Some(best) = first_max_ev(above_floor) {
        recommendation.confidence_tier = thresholds.tier_for(&best);
        recommendation.best_bet = Some(best);
    }

    recommendation.all_candidates = candidates;
    recommendation
}

// ---------------------------------------------------------------------------
// Batch summary
// ---------------------------------------------------------------------------

/// Aggregate counts over a batch of recommendations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecommendationSummary {
    pub total_games: usize,
    pub games_with_odds: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub no_bet: usize,
    pub no_odds: usize,
    /// HIGH plus MEDIUM.
    pub actionable: usize,
    pub actionable_moneyline: usize,
    pub actionable_spread: usize,
    pub actionable_home: usize,
    pub actionable_away: usize,
    pub avg_actionable_ev: Option<f64>,
    pub avg_actionable_prob: Option<f64>,
}

impl RecommendationSummary {
    pub fn from_recommendations(recs: &[BetRecommendation]) -> Self {
        let mut summary = RecommendationSummary {
            total_games: recs.len(),
            ..Default::default()
        };
        let mut ev_sum = 0.0;
        let mut prob_sum = 0.0;

        for rec in recs {
            match rec.confidence_tier {
                ConfidenceTier::High => summary.high += 1,
                ConfidenceTier::Medium => summary.medium += 1,
                ConfidenceTier::Low => summary.low += 1,
                ConfidenceTier::NoBet => summary.no_bet += 1,
                ConfidenceTier::NoOdds => summary.no_odds += 1,
            }
            if rec.confidence_tier != ConfidenceTier::NoOdds {
                summary.games_with_odds += 1;
            }

            let Some(bet) = rec.best_bet.filter(|_| rec.is_actionable()) else {
                continue;
            };
            summary.actionable += 1;
            match bet.market {
                Market::Moneyline => summary.actionable_moneyline += 1,
                Market::Spread => summary.actionable_spread += 1,
            }
            match bet.side {
                Side::Home => summary.actionable_home += 1,
                Side::Away => summary.actionable_away += 1,
            }
            ev_sum += bet.ev;
            prob_sum += bet.probability;
        }

        if summary.actionable > 0 {
            let n = summary.actionable as f64;
            summary.avg_actionable_ev = Some(ev_sum / n);
            summary.avg_actionable_prob = Some(prob_sum / n);
        }
        summary
    }

    pub fn count(&self, tier: ConfidenceTier) -> usize {
        match tier {
            ConfidenceTier::High => self.high,
            ConfidenceTier::Medium => self.medium,
            ConfidenceTier::Low => self.low,
            ConfidenceTier::NoBet => self.no_bet,
            ConfidenceTier::NoOdds => self.no_odds,
        }
    }
}
