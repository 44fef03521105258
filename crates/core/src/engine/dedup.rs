use crate::domain::comp::CompRecord;
use chrono::NaiveDate;

// Maximum gap between two observations of the same transaction.
pub const DUPLICATE_DATE_WINDOW_DAYS: i64 = 3;

fn dates_within_window(a: Option<NaiveDate>, b: Option<NaiveDate>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => (a - b).num_days().abs() <= DUPLICATE_DATE_WINDOW_DAYS,
        _ => false,
    }
}

fn same_transaction(a_key: &str, a: &CompRecord, b_key: &str, b: &CompRecord) -> bool {
    if a.kind.transaction_type() != b.kind.transaction_type() {
        return false;
    }
    if let (Some(x), Some(y)) = (&a.external_id, &b.external_id) {
        if x == y {
            return true;
        }
    }
    a_key == b_key && dates_within_window(a.transaction_date, b.transaction_date)
}

fn merge_into(winner: &mut CompRecord, loser: CompRecord) {
    if winner.external_id.is_none() {
        winner.external_id = loser.external_id;
    }
    if winner.known_sqft().is_none() {
        winner.sqft = loser.sqft;
    }
    if winner.beds.is_none() {
        winner.beds = loser.beds;
    }
    if winner.baths.is_none() {
        winner.baths = loser.baths;
    }
    if winner.distance_mi.is_none() {
        winner.distance_mi = loser.distance_mi;
    }
    if winner.transaction_date.is_none() {
        winner.transaction_date = loser.transaction_date;
    }
    for tag in loser.merged_sources {
        if !winner.merged_sources.contains(&tag) {
            winner.merged_sources.push(tag);
        }
    }
}

pub fn deduplicate(mut comps: Vec<CompRecord>) -> Vec<CompRecord> {
    comps.sort_by_key(|c| c.source.precedence());

    let mut kept: Vec<(String, CompRecord)> = Vec::with_capacity(comps.len());
    for comp in comps {
        let key = comp.normalized_address();
        match kept
            .iter()
            .position(|(k, existing)| same_transaction(k, existing, &key, &comp))
        {
            Some(idx) => merge_into(&mut kept[idx].1, comp),
            None => kept.push((key, comp)),
        }
    }

    kept.into_iter().map(|(_, c)| c).collect()
}
