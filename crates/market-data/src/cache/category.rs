//! Cache categories, their TTL table and key scheme.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::errors::MarketDataError;

/// A class of cached resource with its own staleness tolerance.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Quote,
    Info,
    History,
    Sectors,
    News,
    Recommendation,
    Options,
    Analysis,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Quote,
        Category::Info,
        Category::History,
        Category::Sectors,
        Category::News,
        Category::Recommendation,
        Category::Options,
        Category::Analysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Info => "info",
            Self::History => "history",
            Self::Sectors => "sectors",
            Self::News => "news",
            Self::Recommendation => "recommendation",
            Self::Options => "options",
            Self::Analysis => "analysis",
        }
    }

    /// Build the cache key for `identifier` plus any request parameters.
    ///
    /// The identifier is trimmed and uppercased; parameters are trimmed and
    /// lowercased. An empty identifier or parameter is rejected.
    ///
    /// ```
    /// use alphasphere_market_data::cache::Category;
    ///
    /// let key = Category::History.key(" aapl ", &["1Y", "1d"]).unwrap();
    /// assert_eq!(key, "history_AAPL_1y_1d");
    /// ```
    pub fn key(&self, identifier: &str, params: &[&str]) -> Result<String, MarketDataError> {
        let identifier = normalize_symbol(identifier)?;
        let mut key = format!("{}_{}", self.as_str(), identifier);
        for param in params {
            let param = param.trim();
            if param.is_empty() {
                return Err(MarketDataError::InvalidKey(format!(
                    "empty parameter for {} key '{}'",
                    self, identifier
                )));
            }
            key.push('_');
            key.push_str(&param.to_lowercase());
        }
        Ok(key)
    }
}

impl Category {
    /// Like [`key`](Self::key) with a fixed sub-scope after the category,
    /// e.g. `options_expirations_AAPL`.
    pub fn scoped_key(
        &self,
        scope: &str,
        identifier: &str,
        params: &[&str],
    ) -> Result<String, MarketDataError> {
        let base = self.key(identifier, params)?;
        let prefix_len = self.as_str().len() + 1;
        Ok(format!("{}_{}_{}", self.as_str(), scope, &base[prefix_len..]))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trim and uppercase a ticker symbol, rejecting empty or malformed input.
pub fn normalize_symbol(symbol: &str) -> Result<String, MarketDataError> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(MarketDataError::InvalidKey("empty identifier".to_string()));
    }
    if symbol.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(MarketDataError::InvalidKey(format!(
            "malformed identifier '{}'",
            symbol
        )));
    }
    Ok(symbol.to_uppercase())
}

/// Static TTL per category, read once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryTtls {
    pub quote: Duration,
    pub info: Duration,
    pub history: Duration,
    pub sectors: Duration,
    pub news: Duration,
    pub recommendation: Duration,
    pub options: Duration,
    pub analysis: Duration,
}

impl CategoryTtls {
    pub fn get(&self, category: Category) -> Duration {
        match category {
            Category::Quote => self.quote,
            Category::Info => self.info,
            Category::History => self.history,
            Category::Sectors => self.sectors,
            Category::News => self.news,
            Category::Recommendation => self.recommendation,
            Category::Options => self.options,
            Category::Analysis => self.analysis,
        }
    }

    pub fn set(&mut self, category: Category, ttl: Duration) {
        match category {
            Category::Quote => self.quote = ttl,
            Category::Info => self.info = ttl,
            Category::History => self.history = ttl,
            Category::Sectors => self.sectors = ttl,
            Category::News => self.news = ttl,
            Category::Recommendation => self.recommendation = ttl,
            Category::Options => self.options = ttl,
            Category::Analysis => self.analysis = ttl,
        }
    }
}

impl Default for CategoryTtls {
    fn default() -> Self {
        Self {
            quote: Duration::from_secs(30),
            info: Duration::from_secs(60 * 60),
            history: Duration::from_secs(15 * 60),
            sectors: Duration::from_secs(5 * 60),
            news: Duration::from_secs(5 * 60),
            recommendation: Duration::from_secs(15 * 60),
            options: Duration::from_secs(5 * 60),
            analysis: Duration::from_secs(5 * 60),
        }
    }
}
