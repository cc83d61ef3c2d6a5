use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Local row id, `0` until persisted.
    pub id: i64,
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    /// Price in the minor unit of the provider's currency.
    pub price: Option<i64>,
    pub list_price: Option<i64>,
    pub release_date: Option<NaiveDate>,
    pub thumbnail_url: Option<String>,
    pub sample_media_url: Option<String>,
    #[serde(default)]
    pub sample_images: Vec<String>,
    /// Affiliate link to the product.
    pub outbound_url: Option<String>,
    /// Plain product page on the provider's site.
    pub page_url: Option<String>,
    pub volume: Option<String>,
    pub review: Option<Review>,
    #[serde(default)]
    pub metadata: ItemMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub count: i64,
    pub average: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub performers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
}

impl ItemMetadata {
    pub fn is_empty(&self) -> bool {
        self.genres.is_empty()
            && self.performers.is_empty()
            && self.maker.is_none()
            && self.series.is_none()
    }
}

impl Item {
    pub fn new(external_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            external_id: external_id.into(),
            title: title.into(),
            description: None,
            price: None,
            list_price: None,
            release_date: None,
            thumbnail_url: None,
            sample_media_url: None,
            sample_images: Vec::new(),
            outbound_url: None,
            page_url: None,
            volume: None,
            review: None,
            metadata: ItemMetadata::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "(Untitled)"
        } else {
            &self.title
        }
    }

    /// Price with thousands separators, e.g. `1,980`.
    pub fn display_price(&self) -> Option<String> {
        self.price.map(group_thousands)
    }
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_title_with_title() {
        let item = Item::new("abc123", "My Video");
        assert_eq!(item.display_title(), "My Video");
    }

    #[test]
    fn test_display_title_without_title() {
        let item = Item::new("abc123", "");
        assert_eq!(item.display_title(), "(Untitled)");
    }

    #[test]
    fn test_display_price_grouping() {
        let mut item = Item::new("abc123", "X");
        assert_eq!(item.display_price(), None);

        item.price = Some(500);
        assert_eq!(item.display_price().as_deref(), Some("500"));

        item.price = Some(1234);
        assert_eq!(item.display_price().as_deref(), Some("1,234"));

        item.price = Some(1_234_567);
        assert_eq!(item.display_price().as_deref(), Some("1,234,567"));
    }

    #[test]
    fn test_metadata_is_empty() {
        let mut meta = ItemMetadata::default();
        assert!(meta.is_empty());
        meta.maker = Some("Studio".into());
        assert!(!meta.is_empty());
    }

    #[test]
    fn test_metadata_skips_empty_fields_when_serialized() {
        let meta = ItemMetadata {
            genres: vec!["Drama".into()],
            ..Default::default()
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"genres":["Drama"]}"#);

        let back: ItemMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
