use chrono::Utc;

use crate::models::NewsItem;

const HEADLINES: [(&str, &str); 3] = [
    (
        "Market data is temporarily unavailable",
        "https://finance.yahoo.com/news/",
    ),
    (
        "Check back shortly for the latest headlines",
        "https://finance.yahoo.com/topic/stock-market-news/",
    ),
    (
        "Visit Yahoo Finance for live market coverage",
        "https://finance.yahoo.com/",
    ),
];

/// Placeholder headlines served when news cannot be fetched.
pub fn fallback_news(identifier: &str) -> Vec<NewsItem> {
    let now = Utc::now().timestamp();
    HEADLINES
        .iter()
        .enumerate()
        .map(|(i, (title, link))| {
            NewsItem::new(
                format!("fallback-{}-{}", identifier.to_lowercase(), i + 1),
                *title,
                "AlphaSphere",
                *link,
                now,
            )
        })
        .collect()
}
