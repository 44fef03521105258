use crate::domain::comp::{CompKind, CompRecord, ScoreBreakdown};
use crate::domain::property::SubjectProperty;

pub const DISTANCE_WEIGHT: f64 = 0.3;
pub const PRICE_WEIGHT: f64 = 0.3;
pub const SQFT_WEIGHT: f64 = 0.2;
pub const ROOM_MATCH_WEIGHT: f64 = 0.2;

pub const NEUTRAL_SUB_SCORE: f64 = 0.5;

fn unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

pub fn distance_score(distance_mi: Option<f64>, saturation_mi: f64) -> f64 {
    if !(saturation_mi > 0.0) {
        return 0.0;
    }
    let d = distance_mi
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(saturation_mi);
    unit(1.0 - d.min(saturation_mi) / saturation_mi)
}

pub fn relative_score(comp: f64, subject: f64) -> f64 {
    unit(1.0 - ((comp - subject).abs() / subject).min(1.0))
}

pub fn price_score(comp: &CompRecord, subject: &SubjectProperty) -> f64 {
    // Monthly rent has no counterpart on the subject.
    if comp.kind == CompKind::Rental || !(subject.list_price > 0.0) {
        return NEUTRAL_SUB_SCORE;
    }
    relative_score(comp.price, subject.list_price)
}

pub fn sqft_score(comp: &CompRecord, subject: &SubjectProperty) -> f64 {
    match (comp.known_sqft(), subject.known_sqft()) {
        (Some(c), Some(s)) => relative_score(c, s),
        _ => NEUTRAL_SUB_SCORE,
    }
}

fn half_steps(baths: f64) -> i64 {
    (baths * 2.0).round() as i64
}

pub fn room_match_score(comp: &CompRecord, subject: &SubjectProperty) -> f64 {
    let beds = matches!((comp.beds, subject.bedrooms), (Some(a), Some(b)) if a == b);
    let baths = matches!(
        (comp.baths, subject.bathrooms),
        (Some(a), Some(b)) if half_steps(a) == half_steps(b)
    );
    match (beds, baths) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.5,
        (false, false) => 0.0,
    }
}

pub fn breakdown(comp: &CompRecord, subject: &SubjectProperty, saturation_mi: f64) -> ScoreBreakdown {
    ScoreBreakdown {
        distance: distance_score(comp.distance_mi, saturation_mi),
        price: price_score(comp, subject),
        sqft: sqft_score(comp, subject),
        room_match: room_match_score(comp, subject),
    }
}

pub fn composite(b: &ScoreBreakdown) -> f64 {
    unit(
        DISTANCE_WEIGHT * b.distance
            + PRICE_WEIGHT * b.price
            + SQFT_WEIGHT * b.sqft
            + ROOM_MATCH_WEIGHT * b.room_match,
    )
}

pub fn score_all(subject: &SubjectProperty, comps: &mut [CompRecord], saturation_mi: f64) {
    for comp in comps.iter_mut() {
        let b = breakdown(comp, subject, saturation_mi);
        comp.similarity_score = Some(composite(&b));
        comp.score_breakdown = Some(b);
    }
}
