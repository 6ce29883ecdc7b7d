use serde::{Deserialize, Serialize};

/// A news headline as served by the search endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub uuid: String,
    pub title: String,
    pub publisher: String,
    pub link: String,

    /// Unix timestamp (seconds) of publication
    pub provider_publish_time: i64,

    #[serde(rename = "type")]
    pub kind: String,
}

impl NewsItem {
    pub fn new(
        uuid: impl Into<String>,
        title: impl Into<String>,
        publisher: impl Into<String>,
        link: impl Into<String>,
        provider_publish_time: i64,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            title: title.into(),
            publisher: publisher.into(),
            link: link.into(),
            provider_publish_time,
            kind: "STORY".to_string(),
        }
    }
}
