//! Catalog item shapes returned by the feed and item-lookup endpoints.

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Clone, Debug, Serialize, ToSchema)]
/// A single votable catalog item, normalised from the upstream provider.
pub struct CatalogItem {
    /// Stable item identifier (provider id).
    pub id: u64,
    /// Display title.
    pub title: String,
    /// Release year, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    /// Primary genre name, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    /// Poster image URL, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Average rating on a 0-10 scale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    /// Short synopsis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
