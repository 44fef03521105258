use crate::domain::metrics::MarketMetrics;
use crate::domain::property::SubjectProperty;
use crate::domain::recommendation::{MarketPosition, PricingRecommendation};

// Band edges in percent of the median. Prices are compared in whole cents so a subject sitting
// exactly on an edge is at market even when the median carries cents.
pub const UNDER_MARKET_PCT: i64 = 95;
pub const OVER_MARKET_PCT: i64 = 105;

pub const NO_COMPS_TEXT: &str =
    "No comparable sales data available. Recommend enriching with additional data sources.";

pub fn classify(subject_price: f64, median: f64) -> Option<(MarketPosition, f64)> {
    if !(median > 0.0) || !(subject_price > 0.0) {
        return None;
    }
    let subject_cents = to_cents(subject_price)?;
    let median_cents = to_cents(median)?;

    let position = if subject_cents * 100 < median_cents * UNDER_MARKET_PCT {
        MarketPosition::UnderMarket
    } else if subject_cents * 100 > median_cents * OVER_MARKET_PCT {
        MarketPosition::OverMarket
    } else {
        MarketPosition::AtMarket
    };
    Some((position, difference_pct(subject_price, median)))
}

// Beyond 1e16 cents the percent products overflow i64.
fn to_cents(amount: f64) -> Option<i64> {
    let cents = (amount * 100.0).round();
    (cents.is_finite() && cents < 1e16).then_some(cents as i64)
}

pub fn difference_pct(value: f64, median: f64) -> f64 {
    (value - median) / median * 100.0
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

pub fn recommend(subject: &SubjectProperty, metrics: &MarketMetrics) -> PricingRecommendation {
    let n = metrics.comp_count;
    if n == 0 {
        return PricingRecommendation {
            text: NO_COMPS_TEXT.to_string(),
            position: None,
            difference_pct: None,
            comp_count: 0,
        };
    }

    let comps = plural(n, "comparable sale", "comparable sales");
    let (position, pct) = match (metrics.subject_vs_market, metrics.subject_difference_pct) {
        (Some(position), Some(pct)) => (position, pct),
        _ => {
            return PricingRecommendation {
                text: format!(
                    "Subject property has no usable list price (got {}); unable to position it against {comps}.",
                    subject.list_price
                ),
                position: None,
                difference_pct: None,
                comp_count: n,
            };
        }
    };

    let text = match position {
        MarketPosition::AtMarket => {
            format!("Property is priced at market value based on {comps}.")
        }
        MarketPosition::OverMarket => format!(
            "Property is priced {:.1}% above market based on {comps}. Consider a price reduction to attract buyers.",
            pct.abs()
        ),
        MarketPosition::UnderMarket => format!(
            "Property is priced {:.1}% below market based on {comps}. There may be room to raise the price.",
            pct.abs()
        ),
    };

    PricingRecommendation {
        text,
        position: Some(position),
        difference_pct: Some(pct),
        comp_count: n,
    }
}
