pub mod domain;
pub mod engine;
pub mod error;
pub mod sources;
pub mod storage;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub research_source_base_url: Option<String>,
        pub research_source_api_key: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                research_source_base_url: std::env::var("RESEARCH_SOURCE_BASE_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                research_source_api_key: std::env::var("RESEARCH_SOURCE_API_KEY").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_research_source_base_url(&self) -> anyhow::Result<&str> {
            self.research_source_base_url
                .as_deref()
                .context("RESEARCH_SOURCE_BASE_URL is required")
        }
    }
}
