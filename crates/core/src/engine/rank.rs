use crate::domain::comp::CompRecord;
use std::cmp::Ordering;

pub const SALE_COMPS_CAP: usize = 20;
pub const RENTAL_COMPS_CAP: usize = 20;
pub const PORTFOLIO_COMPS_CAP: usize = 10;

fn compare(a: &CompRecord, b: &CompRecord) -> Ordering {
    let score = |c: &CompRecord| c.similarity_score.unwrap_or(f64::NEG_INFINITY);
    score(b)
        .partial_cmp(&score(a))
        .unwrap_or(Ordering::Equal)
        // Option orders None first, so descending puts undated comps last.
        .then_with(|| b.transaction_date.cmp(&a.transaction_date))
        .then_with(|| a.address.cmp(&b.address))
}

pub fn rank(comps: &mut [CompRecord]) {
    comps.sort_by(compare);
}

// Only applied after metrics are computed.
pub fn rank_and_truncate(mut comps: Vec<CompRecord>, cap: usize) -> Vec<CompRecord> {
    rank(&mut comps);
    comps.truncate(cap);
    comps
}
