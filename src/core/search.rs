//! Debounced place search

use log::{debug, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strsim::jaro_winkler;

use crate::core::config::ProviderConfig;
use crate::core::error::Result;
use crate::core::http::TomTomSearch;
use crate::core::provider::{Place, SearchProvider};

/// Quiet period before a query is sent
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Shorter queries are not sent
pub const MIN_QUERY_LEN: usize = 2;

/// Search-as-you-type front end for a `SearchProvider`
pub struct SearchService {
    provider: Arc<dyn SearchProvider>,
    country: String,
    debounce: Duration,
    generation: AtomicU64,
}

impl SearchService {
    pub fn new(provider: impl SearchProvider + 'static, country: impl Into<String>) -> Self {
        Self {
            provider: Arc::new(provider),
            country: country.into(),
            debounce: SEARCH_DEBOUNCE,
            generation: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(TomTomSearch::from_config(config), config.country.clone())
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Search after the debounce window
    ///
    /// Resolves to `None` when a newer call arrived during the window, so
    /// only the latest keystroke reaches the provider. Provider failures
    /// degrade to an empty list.
    pub async fn search(&self, query: &str) -> Option<Vec<Place>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_LEN {
            return Some(Vec::new());
        }

        tokio::time::sleep(self.debounce).await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Search for '{query}' superseded");
            return None;
        }

        match self.search_now(query).await {
            Ok(places) => Some(places),
            Err(e) => {
                warn!("⚠️  Search for '{query}' failed: {e}");
                Some(Vec::new())
            }
        }
    }

    /// Query the provider right away and rank the hits
    pub async fn search_now(&self, query: &str) -> Result<Vec<Place>> {
        let places = self.provider.search(query, &self.country).await?;
        Ok(rank_places(query, places))
    }
}

/// Order places by name similarity to the query, best first; ties keep provider order
pub fn rank_places(query: &str, mut places: Vec<Place>) -> Vec<Place> {
    let query = query.to_lowercase();
    places.sort_by(|a, b| {
        let score_a = jaro_winkler(&query, &a.name.to_lowercase());
        let score_b = jaro_winkler(&query, &b.name.to_lowercase());
        score_b.total_cmp(&score_a)
    });
    places
}
