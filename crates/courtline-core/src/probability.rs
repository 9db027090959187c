// Margin-to-probability conversion and American odds arithmetic.
//
// The realized margin is modelled as Normal(predicted_margin, sigma). Sigma
// is always supplied by the caller (normally the model's RMSE from config).

use statrs::distribution::{ContinuousCDF, Normal};

/// American odds: positive is the profit on a 100 stake, negative is the
/// stake needed to profit 100. Zero is not a valid price.
pub type AmericanOdds = i32;

/// Standard normal CDF.
pub fn normal_cdf(x: f64) -> f64 {
    Normal::standard().cdf(x)
}

/// Probability the home team wins outright.
pub fn win_prob_from_margin(predicted_margin: f64, sigma: f64) -> f64 {
    if predicted_margin == 0.0 {
        return 0.5;
    }
    normal_cdf(predicted_margin / sigma)
}

/// Probability the home team covers `spread_line_home`.
///
/// A home line of -6.5 means home is favored by 6.5 and covers only when
/// the realized margin exceeds 6.5; in general home covers when
/// margin > -line.
pub fn cover_prob_from_margin(predicted_margin: f64, spread_line_home: f64, sigma: f64) -> f64 {
    let threshold = -spread_line_home;
    1.0 - normal_cdf((threshold - predicted_margin) / sigma)
}

/// Decimal odds (total return per unit stake, stake included).
///
/// +150 -> 2.50, -150 -> 1.667.
pub fn american_to_decimal(odds: AmericanOdds) -> f64 {
    debug_assert_ne!(odds, 0, "zero is not a valid American price");
    if odds > 0 {
        1.0 + odds as f64 / 100.0
    } else {
        1.0 + 100.0 / (odds as f64).abs()
    }
}

/// Break-even probability implied by a single price, ignoring vig.
///
/// +150 -> 0.40, -150 -> 0.60.
pub fn implied_prob_from_american(odds: AmericanOdds) -> f64 {
    debug_assert_ne!(odds, 0, "zero is not a valid American price");
    if odds > 0 {
        100.0 / (odds as f64 + 100.0)
    } else {
        let stake = (odds as f64).abs();
        stake / (stake + 100.0)
    }
}

/// Expected profit per unit staked at `odds` when the bet wins with
/// probability `prob`.
pub fn ev(prob: f64, odds: AmericanOdds) -> f64 {
    prob * american_to_decimal(odds) - 1.0
}
