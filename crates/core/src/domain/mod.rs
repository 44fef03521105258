pub mod comp;
pub mod contract;
pub mod dashboard;
pub mod metrics;
pub mod property;
pub mod recommendation;
