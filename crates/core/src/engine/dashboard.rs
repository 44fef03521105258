use crate::domain::comp::{CompRecord, SourceTag};
use crate::domain::dashboard::{
    DashboardResult, DataSourceSummary, RentalsDashboard, SalesDashboard, SourceReport,
    SourceStatus,
};
use crate::domain::metrics::{MarketMetrics, RentalMetrics};
use crate::domain::property::SubjectProperty;
use crate::domain::recommendation::PricingRecommendation;
use crate::sources::SourceLoad;
use chrono::NaiveDate;

pub fn format_usd(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{}", rounded.abs() as u64);
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if rounded < 0.0 {
        format!("-${out}")
    } else {
        format!("${out}")
    }
}

pub fn source_summary(loads: &[SourceLoad], total_deduplicated: usize) -> DataSourceSummary {
    let report = |tag: SourceTag| {
        loads
            .iter()
            .find(|l| l.source == tag)
            .map(|l| SourceReport {
                status: l.status,
                count: l.comps.len(),
            })
            .unwrap_or(SourceReport {
                status: SourceStatus::Empty,
                count: 0,
            })
    };
    let research = report(SourceTag::Research);
    let history = report(SourceTag::History);
    let portfolio = report(SourceTag::Portfolio);

    DataSourceSummary {
        has_research: research.count > 0,
        has_history: history.count > 0,
        has_portfolio: portfolio.count > 0,
        research,
        history,
        portfolio,
        total_raw: loads.iter().map(|l| l.raw_count).sum(),
        total_deduplicated,
    }
}

pub fn sales_summary(
    subject: &SubjectProperty,
    market: &MarketMetrics,
    recommendation: &PricingRecommendation,
) -> String {
    let (Some(median), Some(min), Some(max)) =
        (market.median_sale_price, market.min_price, market.max_price)
    else {
        return format!("No comparable sales found for {}.", subject.address);
    };

    let mut out = format!(
        "Analyzed {} comparable sales for {}: median {}, range {} to {}.",
        market.comp_count,
        subject.address,
        format_usd(median),
        format_usd(min),
        format_usd(max)
    );
    if let Some(ppsf) = market.avg_price_per_sqft {
        out.push_str(&format!(" Average {}/sqft.", format_usd(ppsf)));
    }
    match (market.price_trend, market.trend_pct) {
        (Some(trend), Some(pct)) => {
            out.push_str(&format!(" Prices are {} ({pct:+.1}%).", trend.as_str()))
        }
        _ => out.push_str(" Not enough dated sales to establish a trend."),
    }
    if let Some(pct) = market.estimate_difference_pct {
        out.push_str(&format!(" External estimate is {pct:+.1}% versus the median."));
    }
    out.push(' ');
    out.push_str(&recommendation.text);
    out
}

pub fn rentals_summary(subject: &SubjectProperty, rental: &RentalMetrics) -> String {
    let Some(median_rent) = rental.median_rent else {
        return format!("No rental comps found for {}.", subject.address);
    };

    let mut out = format!(
        "Analyzed {} rental comps for {}: median rent {}/mo.",
        rental.comp_count,
        subject.address,
        format_usd(median_rent)
    );
    if let Some(y) = rental.rental_yield {
        out.push_str(&format!(" Gross rental yield {:.2}% at list price.", y * 100.0));
    }
    out
}

fn provenance_summary(sources: &DataSourceSummary) -> String {
    let part = |tag: SourceTag| {
        let r = sources.report(tag);
        if r.status.is_degraded() {
            format!("{tag} unavailable")
        } else {
            format!("{tag} {}", r.count)
        }
    };
    let parts: Vec<String> = SourceTag::ALL.into_iter().map(part).collect();
    format!("Sources: {}.", parts.join(", "))
}

#[derive(Debug, Clone, Default)]
pub struct RankedComps {
    pub sales: Vec<CompRecord>,
    pub rentals: Vec<CompRecord>,
    pub portfolio: Vec<CompRecord>,
}

pub fn assemble(
    subject: SubjectProperty,
    as_of_date: NaiveDate,
    comps: RankedComps,
    market_metrics: MarketMetrics,
    rental_metrics: RentalMetrics,
    recommendation: PricingRecommendation,
    data_sources: DataSourceSummary,
) -> DashboardResult {
    let summary = format!(
        "{} {} {}",
        sales_summary(&subject, &market_metrics, &recommendation),
        rentals_summary(&subject, &rental_metrics),
        provenance_summary(&data_sources)
    );

    DashboardResult {
        subject,
        as_of_date,
        sale_comps: comps.sales,
        rental_comps: comps.rentals,
        portfolio_comps: comps.portfolio,
        market_metrics,
        rental_metrics,
        recommendation,
        data_sources,
        summary,
    }
}

impl DashboardResult {
    pub fn into_sales_view(self) -> SalesDashboard {
        let summary = sales_summary(&self.subject, &self.market_metrics, &self.recommendation);
        SalesDashboard {
            property_id: self.subject.id,
            as_of_date: self.as_of_date,
            sale_comps: self.sale_comps,
            market_metrics: self.market_metrics,
            recommendation: self.recommendation,
            summary,
        }
    }

    pub fn into_rentals_view(self) -> RentalsDashboard {
        let summary = rentals_summary(&self.subject, &self.rental_metrics);
        RentalsDashboard {
            property_id: self.subject.id,
            as_of_date: self.as_of_date,
            rental_comps: self.rental_comps,
            rental_metrics: self.rental_metrics,
            summary,
        }
    }
}
