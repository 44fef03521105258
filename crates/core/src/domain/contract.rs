use crate::domain::comp::{CompKind, CompRecord, SourceTag};
use anyhow::{bail, ensure};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

const MILES_PER_KM: f64 = 0.621_371;
const MONTHS_PER_YEAR: f64 = 12.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawComp {
    #[serde(
        default,
        alias = "id",
        alias = "mls_id",
        alias = "listing_id",
        deserialize_with = "string_or_number"
    )]
    pub external_id: Option<String>,
    #[serde(alias = "full_address", alias = "street_address")]
    pub address: Option<String>,
    #[serde(alias = "sale_price", alias = "sold_price", alias = "list_price")]
    pub price: Option<f64>,
    #[serde(alias = "rent", alias = "rent_price")]
    pub monthly_rent: Option<f64>,
    pub annual_rent: Option<f64>,
    #[serde(alias = "square_feet", alias = "living_area", alias = "sq_ft")]
    pub sqft: Option<f64>,
    #[serde(alias = "bedrooms")]
    pub beds: Option<f64>,
    #[serde(alias = "bathrooms")]
    pub baths: Option<f64>,
    #[serde(alias = "distance", alias = "distance_miles")]
    pub distance_mi: Option<f64>,
    pub distance_km: Option<f64>,
    #[serde(
        default,
        alias = "sale_date",
        alias = "sold_date",
        alias = "event_date",
        alias = "date",
        deserialize_with = "lenient_date"
    )]
    pub transaction_date: Option<NaiveDate>,
    #[serde(alias = "type", alias = "event", alias = "listing_type")]
    pub transaction_type: Option<String>,
}

impl RawComp {
    // Rents come out monthly, distances in miles. Records that cannot serve as a comp
    // (no address, no usable price, dated after `as_of_date`, non-transaction history events)
    // are rejected with the reason.
    pub fn validate_and_into_record(
        self,
        source: SourceTag,
        as_of_date: NaiveDate,
    ) -> anyhow::Result<CompRecord> {
        let kind = self.classify(source)?;

        let address = self
            .address
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        ensure!(!address.is_empty(), "address must be non-empty");

        let price = match kind {
            CompKind::Rental => self
                .monthly_rent
                .or(self.annual_rent.map(|r| r / MONTHS_PER_YEAR))
                .or(self.price),
            CompKind::Sale | CompKind::Portfolio => self.price,
        };
        let Some(price) = price else {
            bail!("missing price for {address}");
        };
        ensure!(
            price.is_finite() && price > 0.0,
            "price must be positive (got {price}) for {address}"
        );

        if let Some(date) = self.transaction_date {
            ensure!(
                date <= as_of_date,
                "transaction date {date} is after as-of date {as_of_date} for {address}"
            );
        }

        let distance_mi = self
            .distance_mi
            .or(self.distance_km.map(|km| km * MILES_PER_KM))
            .filter(|d| d.is_finite() && *d >= 0.0);

        let sqft = self.sqft.filter(|s| s.is_finite() && *s > 0.0);
        let beds = self
            .beds
            .filter(|b| b.is_finite() && *b >= 0.0 && b.fract() == 0.0)
            .map(|b| b as u32);
        let baths = self.baths.filter(|b| b.is_finite() && *b >= 0.0);

        let external_id = self
            .external_id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(CompRecord {
            kind,
            source,
            merged_sources: vec![source],
            external_id,
            address,
            price,
            sqft,
            beds,
            baths,
            distance_mi,
            transaction_date: self.transaction_date,
            similarity_score: None,
            score_breakdown: None,
        })
    }

    fn has_rent(&self) -> bool {
        self.monthly_rent.is_some() || self.annual_rent.is_some()
    }

    fn classify(&self, source: SourceTag) -> anyhow::Result<CompKind> {
        let keyword = self
            .transaction_type
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        match source {
            SourceTag::Portfolio => Ok(CompKind::Portfolio),
            SourceTag::Research => match keyword {
                Some(k) if is_rental_keyword(&k) => Ok(CompKind::Rental),
                Some(k) if k.contains("sale") || k.contains("sold") || k.contains("closed") => {
                    Ok(CompKind::Sale)
                }
                Some(k) => bail!("unrecognized research comp type: {k}"),
                None if self.has_rent() => Ok(CompKind::Rental),
                None => Ok(CompKind::Sale),
            },
            // Price history also carries listings, price changes and delistings; only completed
            // transactions are comps.
            SourceTag::History => match keyword {
                Some(k) if is_rental_keyword(&k) => Ok(CompKind::Rental),
                Some(k) if k.contains("sold") || k.contains("closed") => Ok(CompKind::Sale),
                Some(k) => bail!("price history event is not a transaction: {k}"),
                None => bail!("price history record has no event"),
            },
        }
    }
}

const RENTAL_WORDS: [&str; 6] = ["rent", "rented", "rental", "lease", "leased", "for-rent"];

fn is_rental_keyword(k: &str) -> bool {
    k.split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .any(|word| RENTAL_WORDS.contains(&word))
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match v {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// Sources disagree on date encoding: plain dates, RFC 3339 timestamps, or
// timestamps with a trailing time component we do not care about.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(s) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(Some(d));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(Some(dt.date_naive()));
    }
    s.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {s}")))
}
