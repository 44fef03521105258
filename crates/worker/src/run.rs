use anyhow::Context;
use comps_core::domain::dashboard::DashboardResult;
use comps_core::domain::property::PropertyId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum View {
    #[default]
    Full,
    Sales,
    Rentals,
}

pub fn render(view: View, dashboard: DashboardResult) -> anyhow::Result<serde_json::Value> {
    let value = match view {
        View::Full => serde_json::to_value(dashboard),
        View::Sales => serde_json::to_value(dashboard.into_sales_view()),
        View::Rentals => serde_json::to_value(dashboard.into_rentals_view()),
    };
    value.context("serialize dashboard view failed")
}

pub fn select_targets(
    explicit: &[PropertyId],
    all: bool,
    known: Vec<PropertyId>,
) -> anyhow::Result<Vec<PropertyId>> {
    let mut ids = if explicit.is_empty() && all {
        known
    } else {
        explicit.to_vec()
    };
    anyhow::ensure!(
        !ids.is_empty(),
        "no properties selected; pass --property-id <uuid> or --all"
    );

    let mut seen = std::collections::HashSet::new();
    ids.retain(|id| seen.insert(*id));
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn explicit_ids_are_deduplicated_in_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ids = select_targets(&[a, b, a], false, Vec::new()).unwrap();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn all_uses_known_subjects_only_without_explicit_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(select_targets(&[], true, vec![b]).unwrap(), vec![b]);
        assert_eq!(select_targets(&[a], true, vec![b]).unwrap(), vec![a]);
    }

    #[test]
    fn empty_selection_is_an_error() {
        assert!(select_targets(&[], false, vec![Uuid::new_v4()]).is_err());
        assert!(select_targets(&[], true, Vec::new()).is_err());
    }
}
