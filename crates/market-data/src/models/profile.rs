use serde::{Deserialize, Serialize};

/// Company profile data from market data providers
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyInfo {
    /// Normalized (uppercase) symbol
    pub symbol: String,

    /// Company/asset name
    pub name: Option<String>,

    /// Business sector (e.g., "Technology")
    pub sector: Option<String>,

    /// Industry within sector (e.g., "Consumer Electronics")
    pub industry: Option<String>,

    /// Listing exchange name
    pub exchange: Option<String>,

    /// Market capitalization
    pub market_cap: Option<f64>,

    /// Business description
    pub description: Option<String>,

    /// Trailing price-to-earnings ratio
    pub pe_ratio: Option<f64>,

    /// 52-week high price
    #[serde(rename = "high52Week")]
    pub high_52_week: Option<f64>,

    /// 52-week low price
    #[serde(rename = "low52Week")]
    pub low_52_week: Option<f64>,

    /// Average daily volume
    pub avg_volume: Option<u64>,
}

impl CompanyInfo {
    /// Create a profile with basic info
    pub fn with_name(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Set the sector
    pub fn sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    /// Set the industry
    pub fn industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = Some(industry.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_company_info_builder() {
        let info = CompanyInfo::with_name("AAPL", "Apple Inc.")
            .sector("Technology")
            .industry("Consumer Electronics");

        assert_eq!(info.name, Some("Apple Inc.".to_string()));
        assert_eq!(info.sector, Some("Technology".to_string()));
        assert_eq!(info.industry, Some("Consumer Electronics".to_string()));
    }

    #[test]
    fn test_company_info_field_names() {
        let info = CompanyInfo {
            symbol: "AAPL".to_string(),
            high_52_week: Some(199.6),
            low_52_week: Some(124.2),
            ..Default::default()
        };

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["high52Week"], 199.6);
        assert_eq!(json["low52Week"], 124.2);
        assert!(json.get("peRatio").is_some());
    }
}
