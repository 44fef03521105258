use crate::domain::comp::CompRecord;
use crate::domain::metrics::{MarketMetrics, PriceTrend, RentalMetrics};
use crate::domain::property::SubjectProperty;
use crate::engine::recommend;
use chrono::{Datelike, NaiveDate};

pub const TREND_BAND_PCT: f64 = 1.0;

// Smallest dated population a trend is reported for.
pub const MIN_TREND_COMPS: usize = 4;

const MONTHS_PER_YEAR: f64 = 12.0;

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn day_number(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce())
}

fn extrema(values: &[f64]) -> (Option<f64>, Option<f64>) {
    let min = values.iter().copied().reduce(f64::min);
    let max = values.iter().copied().reduce(f64::max);
    (min, max)
}

fn avg_per_sqft(comps: &[CompRecord]) -> Option<f64> {
    let per_sqft: Vec<f64> = comps.iter().filter_map(CompRecord::price_per_sqft).collect();
    mean(&per_sqft)
}

// The population is split at its median transaction date: comps dated before it form the older
// half, comps dated after it the recent half, and comps on the median date itself belong to
// neither. Populations smaller than `MIN_TREND_COMPS`, or with an empty half, report no trend.
pub fn price_trend(comps: &[CompRecord]) -> Option<(PriceTrend, f64)> {
    let dated: Vec<(NaiveDate, f64)> = comps
        .iter()
        .filter_map(|c| c.transaction_date.map(|d| (d, c.price)))
        .collect();
    if dated.len() < MIN_TREND_COMPS {
        return None;
    }

    // Day numbers doubled so an even population's midpoint stays integral.
    let mut days: Vec<i64> = dated.iter().map(|(d, _)| day_number(*d)).collect();
    days.sort_unstable();
    let mid = days.len() / 2;
    let median2 = if days.len() % 2 == 0 {
        days[mid - 1] + days[mid]
    } else {
        days[mid] * 2
    };

    let mut older = Vec::new();
    let mut recent = Vec::new();
    for (date, price) in &dated {
        let day2 = day_number(*date) * 2;
        if day2 < median2 {
            older.push(*price);
        } else if day2 > median2 {
            recent.push(*price);
        }
    }

    let avg_older = mean(&older)?;
    let avg_recent = mean(&recent)?;
    if !(avg_older > 0.0) {
        return None;
    }

    let pct = (avg_recent - avg_older) / avg_older * 100.0;
    let trend = if pct > TREND_BAND_PCT {
        PriceTrend::Rising
    } else if pct < -TREND_BAND_PCT {
        PriceTrend::Falling
    } else {
        PriceTrend::Stable
    };
    Some((trend, pct))
}

pub fn market_metrics(subject: &SubjectProperty, sales: &[CompRecord]) -> MarketMetrics {
    let prices: Vec<f64> = sales.iter().map(|c| c.price).collect();
    let median_sale_price = median(&prices);
    let (min_price, max_price) = extrema(&prices);
    let trend = price_trend(sales);
    let classified = median_sale_price.and_then(|m| recommend::classify(subject.list_price, m));

    let estimate_difference_pct = match (subject.external_estimate, median_sale_price) {
        (Some(est), Some(m)) if est > 0.0 && m > 0.0 => Some(recommend::difference_pct(est, m)),
        _ => None,
    };

    MarketMetrics {
        comp_count: sales.len(),
        median_sale_price,
        avg_price_per_sqft: avg_per_sqft(sales),
        min_price,
        max_price,
        price_trend: trend.map(|(t, _)| t),
        trend_pct: trend.map(|(_, pct)| pct),
        subject_vs_market: classified.map(|(position, _)| position),
        subject_difference_pct: classified.map(|(_, pct)| pct),
        estimate_difference_pct,
    }
}

pub fn rental_metrics(subject: &SubjectProperty, rentals: &[CompRecord]) -> RentalMetrics {
    let rents: Vec<f64> = rentals.iter().map(|c| c.price).collect();
    let median_rent = median(&rents);
    let rental_yield = median_rent
        .filter(|_| subject.list_price > 0.0)
        .map(|rent| rent * MONTHS_PER_YEAR / subject.list_price);

    RentalMetrics {
        comp_count: rentals.len(),
        median_rent,
        avg_rent_per_sqft: avg_per_sqft(rentals),
        rental_yield,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::comp::{CompKind, SourceTag};
    use crate::domain::recommendation::MarketPosition;

    fn subject(list_price: f64) -> SubjectProperty {
        SubjectProperty {
            id: uuid::Uuid::new_v4(),
            address: "1 Subject Way".to_string(),
            city: None,
            state: None,
            list_price,
            bedrooms: Some(3),
            bathrooms: Some(2.0),
            sqft: Some(1800.0),
            external_estimate: None,
        }
    }

    fn sale(price: f64, sqft: Option<f64>, date: Option<(i32, u32, u32)>) -> CompRecord {
        CompRecord {
            kind: CompKind::Sale,
            source: SourceTag::Research,
            merged_sources: vec![SourceTag::Research],
            external_id: None,
            address: format!("{price} Main St"),
            price,
            sqft,
            beds: None,
            baths: None,
            distance_mi: None,
            transaction_date: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            similarity_score: None,
            score_breakdown: None,
        }
    }

    fn rental(rent: f64) -> CompRecord {
        CompRecord {
            kind: CompKind::Rental,
            ..sale(rent, None, None)
        }
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[900_000.0, 700_000.0, 850_000.0]), Some(850_000.0));
        assert_eq!(median(&[850_000.0, 700_000.0]), Some(775_000.0));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn reference_scenario_is_at_market() {
        let sales: Vec<_> = [860_000.0, 845_000.0, 850_000.0, 720_000.0, 950_000.0]
            .into_iter()
            .map(|p| sale(p, None, None))
            .collect();
        let m = market_metrics(&subject(850_000.0), &sales);
        assert_eq!(m.comp_count, 5);
        assert_eq!(m.median_sale_price, Some(850_000.0));
        assert_eq!(m.min_price, Some(720_000.0));
        assert_eq!(m.max_price, Some(950_000.0));
        assert_eq!(m.subject_difference_pct, Some(0.0));
        assert_eq!(m.subject_vs_market, Some(MarketPosition::AtMarket));

        let m = market_metrics(&subject(920_000.0), &sales);
        assert_eq!(m.subject_vs_market, Some(MarketPosition::OverMarket));
        assert!((m.subject_difference_pct.unwrap() - 8.2).abs() < 0.05);
    }

    #[test]
    fn unknown_sqft_is_excluded_from_per_sqft_only() {
        let sales = vec![
            sale(800_000.0, Some(2000.0), None),
            sale(900_000.0, Some(0.0), None),
            sale(1_000_000.0, None, None),
        ];
        let m = market_metrics(&subject(850_000.0), &sales);
        assert_eq!(m.comp_count, 3);
        assert_eq!(m.median_sale_price, Some(900_000.0));
        assert_eq!(m.avg_price_per_sqft, Some(400.0));
    }

    #[test]
    fn zero_comps_yield_no_statistics() {
        let m = market_metrics(&subject(850_000.0), &[]);
        assert_eq!(m.comp_count, 0);
        assert_eq!(m.median_sale_price, None);
        assert_eq!(m.avg_price_per_sqft, None);
        assert_eq!(m.min_price, None);
        assert_eq!(m.max_price, None);
        assert_eq!(m.price_trend, None);
        assert_eq!(m.trend_pct, None);
        assert_eq!(m.subject_vs_market, None);
        assert_eq!(m.subject_difference_pct, None);

        let r = rental_metrics(&subject(850_000.0), &[]);
        assert_eq!(r.comp_count, 0);
        assert_eq!(r.median_rent, None);
        assert_eq!(r.rental_yield, None);
    }

    #[test]
    fn rising_trend_from_recent_half() {
        let sales = vec![
            sale(800_000.0, None, Some((2025, 1, 10))),
            sale(820_000.0, None, Some((2025, 3, 10))),
            sale(850_000.0, None, Some((2025, 9, 10))),
            sale(870_000.0, None, Some((2026, 1, 10))),
        ];
        let (trend, pct) = price_trend(&sales).unwrap();
        assert_eq!(trend, PriceTrend::Rising);
        // (860k - 810k) / 810k
        assert!((pct - 6.1728).abs() < 1e-3);
    }

    #[test]
    fn odd_population_drops_median_date_comp() {
        let sales = vec![
            sale(800_000.0, None, Some((2025, 1, 10))),
            sale(800_000.0, None, Some((2025, 2, 10))),
            sale(5_000_000.0, None, Some((2025, 6, 10))),
            sale(796_000.0, None, Some((2025, 9, 10))),
            sale(796_000.0, None, Some((2025, 12, 10))),
        ];
        let (trend, pct) = price_trend(&sales).unwrap();
        assert_eq!(trend, PriceTrend::Stable);
        assert!((pct + 0.5).abs() < 1e-9);
    }

    #[test]
    fn same_day_sales_have_no_trend() {
        let sales: Vec<_> = [900_000.0, 800_000.0, 900_000.0, 800_000.0]
            .into_iter()
            .map(|p| sale(p, None, Some((2026, 1, 1))))
            .collect();
        assert!(price_trend(&sales).is_none());
    }

    #[test]
    fn comps_on_the_median_date_belong_to_neither_half() {
        // Median date is 2025-06-10; the three comps sold that day are excluded whatever their
        // prices, leaving 800k before and 805k after.
        let sales = vec![
            sale(800_000.0, None, Some((2025, 1, 10))),
            sale(700_000.0, None, Some((2025, 6, 10))),
            sale(990_000.0, None, Some((2025, 6, 10))),
            sale(600_000.0, None, Some((2025, 6, 10))),
            sale(805_000.0, None, Some((2025, 12, 10))),
        ];
        let (trend, pct) = price_trend(&sales).unwrap();
        assert_eq!(trend, PriceTrend::Stable);
        assert!((pct - 0.625).abs() < 1e-9);
    }

    #[test]
    fn even_population_splits_between_middle_dates() {
        let sales = vec![
            sale(800_000.0, None, Some((2025, 1, 10))),
            sale(800_000.0, None, Some((2025, 1, 10))),
            sale(900_000.0, None, Some((2025, 3, 10))),
            sale(900_000.0, None, Some((2025, 3, 10))),
        ];
        let (trend, pct) = price_trend(&sales).unwrap();
        assert_eq!(trend, PriceTrend::Rising);
        assert!((pct - 12.5).abs() < 1e-9);

        // Ties spanning the middle pair put every comp on the median date.
        let tied = vec![
            sale(800_000.0, None, Some((2025, 1, 10))),
            sale(850_000.0, None, Some((2025, 3, 10))),
            sale(950_000.0, None, Some((2025, 3, 10))),
            sale(900_000.0, None, Some((2025, 3, 10))),
        ];
        assert!(price_trend(&tied).is_none());
    }

    #[test]
    fn falling_trend() {
        let sales = vec![
            sale(900_000.0, None, Some((2025, 1, 10))),
            sale(900_000.0, None, Some((2025, 2, 10))),
            sale(850_000.0, None, Some((2025, 9, 10))),
            sale(850_000.0, None, Some((2025, 12, 10))),
        ];
        assert_eq!(price_trend(&sales).unwrap().0, PriceTrend::Falling);
    }

    #[test]
    fn small_or_undated_population_has_no_trend() {
        let three = vec![
            sale(800_000.0, None, Some((2025, 1, 10))),
            sale(900_000.0, None, Some((2025, 6, 10))),
            sale(1_000_000.0, None, Some((2026, 1, 10))),
        ];
        assert!(price_trend(&three).is_none());

        let mut four_with_undated = three.clone();
        four_with_undated.push(sale(1_100_000.0, None, None));
        assert!(price_trend(&four_with_undated).is_none());

        let m = market_metrics(&subject(850_000.0), &three);
        assert_eq!(m.price_trend, None);
        assert_eq!(m.trend_pct, None);
        assert_eq!(m.comp_count, 3);
    }

    #[test]
    fn rental_yield_from_median_rent() {
        let rentals = vec![rental(2_500.0), rental(2_750.0), rental(3_000.0)];
        let r = rental_metrics(&subject(850_000.0), &rentals);
        assert_eq!(r.comp_count, 3);
        assert_eq!(r.median_rent, Some(2_750.0));
        assert!((r.rental_yield.unwrap() - 0.0388).abs() < 1e-4);
    }

    #[test]
    fn estimate_difference_against_median() {
        let mut s = subject(850_000.0);
        s.external_estimate = Some(935_000.0);
        let m = market_metrics(&s, &[sale(850_000.0, None, None)]);
        assert!((m.estimate_difference_pct.unwrap() - 10.0).abs() < 1e-9);
    }
}
