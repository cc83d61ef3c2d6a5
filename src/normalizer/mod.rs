//! Provider item normalization.
//!
//! Provider responses come in more than one shape: the affiliate v3 item list
//! (`content_id`, `prices.price`, `imageURL.large`, `iteminfo.genre[]`) and a
//! flattened export shape (`cid`, `price`, `image_url`, `genres[]`). Rather
//! than modelling each shape, every canonical field resolves through an
//! ordered list of candidate key paths.

mod coerce;
mod paths;

use html_escape::decode_html_entities;
use serde_json::Value;

use crate::app::{CatalogError, Result};
use crate::domain::{Item, ItemMetadata, Review};

use paths::{first_names, first_present, first_text, KeyPath};

const EXTERNAL_ID: &[KeyPath] = &[&["content_id"], &["cid"], &["product_id"]];
const TITLE: &[KeyPath] = &[&["title"], &["name"]];
const DESCRIPTION: &[KeyPath] = &[&["description"], &["comment"], &["summary"]];
const PRICE: &[KeyPath] = &[
    &["prices", "price"],
    &["price"],
    &["prices", "deliveries", "delivery", "0", "price"],
];
const LIST_PRICE: &[KeyPath] = &[&["prices", "list_price"], &["list_price"]];
const RELEASE_DATE: &[KeyPath] = &[&["date"], &["release_date"], &["released_at"]];
const THUMBNAIL: &[KeyPath] = &[
    &["imageURL"],
    &["image_url"],
    &["thumbnail_url"],
    &["thumbnail"],
];
const SAMPLE_MEDIA: &[KeyPath] = &[
    &["sampleMovieURL"],
    &["sample_movie_url"],
    &["sample_media_url"],
];
const OUTBOUND: &[KeyPath] = &[&["affiliateURL"], &["affiliate_url"], &["outbound_url"]];
const PAGE_URL: &[KeyPath] = &[&["URL"], &["url"]];
const SAMPLE_IMAGES: &[KeyPath] = &[
    &["sampleImageURL", "sample_l", "image"],
    &["sampleImageURL", "sample_s", "image"],
    &["sample_images"],
];
const GENRES: &[KeyPath] = &[&["iteminfo", "genre"], &["genres"]];
const PERFORMERS: &[KeyPath] = &[
    &["iteminfo", "actress"],
    &["iteminfo", "actor"],
    &["performers"],
    &["actresses"],
];
const MAKER: &[KeyPath] = &[&["iteminfo", "maker", "0", "name"], &["maker"]];
const SERIES: &[KeyPath] = &[&["iteminfo", "series", "0", "name"], &["series"]];
const VOLUME: &[KeyPath] = &[&["volume"]];
const REVIEW_COUNT: &[KeyPath] = &[&["review", "count"], &["review_count"]];
const REVIEW_AVERAGE: &[KeyPath] = &[&["review", "average"], &["review_average"]];

#[derive(Clone, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Map one raw provider item onto the canonical [`Item`].
    ///
    /// Only a missing `external_id` is an error; every other field degrades
    /// to absent.
    pub fn normalize(&self, raw: &Value) -> Result<Item> {
        let external_id = first_text(raw, EXTERNAL_ID).ok_or_else(|| {
            CatalogError::Normalization("no candidate key holds an external id".into())
        })?;

        let title = first_text(raw, TITLE)
            .map(|t| decode_html_entities(&t).to_string())
            .unwrap_or_default();

        let mut item = Item::new(external_id, title);
        item.description =
            first_text(raw, DESCRIPTION).map(|d| decode_html_entities(&d).to_string());
        item.price = first_present(raw, PRICE).and_then(coerce::price);
        item.list_price = first_present(raw, LIST_PRICE).and_then(coerce::price);
        item.release_date = first_present(raw, RELEASE_DATE).and_then(coerce::date);
        item.thumbnail_url = first_present(raw, THUMBNAIL).and_then(coerce::largest_media);
        item.sample_media_url = first_present(raw, SAMPLE_MEDIA).and_then(coerce::largest_media);
        item.sample_images = first_present(raw, SAMPLE_IMAGES)
            .map(coerce::url_list)
            .unwrap_or_default();
        item.outbound_url = first_text(raw, OUTBOUND);
        item.page_url = first_text(raw, PAGE_URL);
        item.volume = first_text(raw, VOLUME);
        item.review = review(raw);
        item.metadata = ItemMetadata {
            genres: first_names(raw, GENRES),
            performers: first_names(raw, PERFORMERS),
            maker: first_text(raw, MAKER),
            series: first_text(raw, SERIES),
        };

        Ok(item)
    }

    /// Normalize a page of raw items, skipping the ones without an id.
    /// Returns the items and the number skipped.
    pub fn normalize_all(&self, raw_items: &[Value]) -> (Vec<Item>, usize) {
        let mut items = Vec::with_capacity(raw_items.len());
        let mut skipped = 0;

        for (index, raw) in raw_items.iter().enumerate() {
            match self.normalize(raw) {
                Ok(item) => items.push(item),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(index, error = %e, "Skipping malformed item");
                }
            }
        }

        (items, skipped)
    }
}

fn review(raw: &Value) -> Option<Review> {
    let count = first_text(raw, REVIEW_COUNT).and_then(|c| c.parse::<i64>().ok());
    let average = first_text(raw, REVIEW_AVERAGE).and_then(|a| a.parse::<f64>().ok());
    if count.is_none() && average.is_none() {
        return None;
    }
    Some(Review {
        count: count.unwrap_or(0),
        average: average.unwrap_or(0.0),
    })
}
