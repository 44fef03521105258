use crate::domain::property::{PropertyId, SubjectProperty};
use crate::sources::{
    HistoryCompsSource, PortfolioCompsSource, ResearchCompsSource, SubjectRepository,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub subjects: Vec<SubjectProperty>,
    #[serde(default)]
    pub research: HashMap<PropertyId, Vec<Value>>,
    #[serde(default)]
    pub history: HashMap<PropertyId, Vec<Value>>,
    #[serde(default)]
    pub portfolio: HashMap<PropertyId, Vec<Value>>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    subjects: HashMap<PropertyId, SubjectProperty>,
    research: HashMap<PropertyId, Vec<Value>>,
    history: HashMap<PropertyId, Vec<Value>>,
    portfolio: HashMap<PropertyId, Vec<Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        Self {
            subjects: fixture
                .subjects
                .into_iter()
                .map(|s| (s.id, s))
                .collect(),
            research: fixture.research,
            history: fixture.history,
            portfolio: fixture.portfolio,
        }
    }

    pub fn load_fixture(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        let fixture = serde_json::from_str::<Fixture>(&text)
            .with_context(|| format!("fixture {} is not valid", path.display()))?;
        Ok(Self::from_fixture(fixture))
    }

    pub fn with_subject(mut self, subject: SubjectProperty) -> Self {
        self.subjects.insert(subject.id, subject);
        self
    }

    pub fn with_research(mut self, property_id: PropertyId, comps: Vec<Value>) -> Self {
        self.research.insert(property_id, comps);
        self
    }

    pub fn with_history(mut self, property_id: PropertyId, comps: Vec<Value>) -> Self {
        self.history.insert(property_id, comps);
        self
    }

    pub fn with_portfolio(mut self, property_id: PropertyId, comps: Vec<Value>) -> Self {
        self.portfolio.insert(property_id, comps);
        self
    }

    pub fn subject_ids(&self) -> Vec<PropertyId> {
        let mut ids: Vec<_> = self.subjects.keys().copied().collect();
        ids.sort();
        ids
    }
}

#[async_trait::async_trait]
impl SubjectRepository for InMemoryStore {
    async fn get_subject(&self, property_id: PropertyId) -> Result<Option<SubjectProperty>> {
        Ok(self.subjects.get(&property_id).cloned())
    }
}

#[async_trait::async_trait]
impl ResearchCompsSource for InMemoryStore {
    async fn load_research_comps(&self, property_id: PropertyId) -> Result<Vec<Value>> {
        Ok(self.research.get(&property_id).cloned().unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl HistoryCompsSource for InMemoryStore {
    async fn load_history_comps(&self, property_id: PropertyId) -> Result<Vec<Value>> {
        Ok(self.history.get(&property_id).cloned().unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl PortfolioCompsSource for InMemoryStore {
    async fn load_portfolio_comps(&self, subject: &SubjectProperty) -> Result<Vec<Value>> {
        Ok(self.portfolio.get(&subject.id).cloned().unwrap_or_default())
    }
}
