//! Thin HTTP client for the upstream movie catalog.
//!
//! Every failure path degrades to an empty result so catalog hiccups never
//! break room coordination. Callers that need to distinguish "not found"
//! from "provider down" should not exist; the feed is best-effort.

use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::{config::CatalogConfig, dto::catalog::CatalogItem};

/// Genre id to display name mapping used by the upstream provider.
const GENRES: &[(u64, &str)] = &[
    (28, "Action"),
    (12, "Adventure"),
    (16, "Animation"),
    (35, "Comedy"),
    (80, "Crime"),
    (99, "Documentary"),
    (18, "Drama"),
    (10751, "Family"),
    (14, "Fantasy"),
    (36, "History"),
    (27, "Horror"),
    (10402, "Music"),
    (9648, "Mystery"),
    (10749, "Romance"),
    (878, "Sci-Fi"),
    (10770, "TV Movie"),
    (53, "Thriller"),
    (10752, "War"),
    (37, "Western"),
];

fn genre_name(id: u64) -> Option<&'static str> {
    GENRES.iter().find(|(gid, _)| *gid == id).map(|(_, name)| *name)
}

#[derive(Clone)]
/// Client against the catalog provider's REST API.
pub struct CatalogClient {
    http: Client,
    config: CatalogConfig,
}

#[derive(Debug, Deserialize)]
struct DiscoverResponse {
    #[serde(default)]
    results: Vec<MovieListing>,
}

#[derive(Debug, Deserialize)]
struct MovieListing {
    id: u64,
    title: String,
    #[serde(default)]
    genre_ids: Vec<u64>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    poster_path: Option<String>,
    #[serde(default)]
    vote_average: Option<f64>,
    #[serde(default)]
    overview: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MovieDetails {
    id: u64,
    title: String,
    #[serde(default)]
    genres: Vec<GenreEntry>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    poster_path: Option<String>,
    #[serde(default)]
    vote_average: Option<f64>,
    #[serde(default)]
    overview: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenreEntry {
    name: String,
}

fn release_year(date: Option<&str>) -> Option<u32> {
    date?.split('-').next()?.parse().ok()
}

impl CatalogClient {
    /// Builds a client from catalog settings.
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn image_url(&self, poster_path: Option<&str>) -> Option<String> {
        poster_path.map(|path| format!("{}{path}", self.config.image_base_url))
    }

    fn listing_item(&self, movie: MovieListing) -> CatalogItem {
        CatalogItem {
            id: movie.id,
            title: movie.title,
            year: release_year(movie.release_date.as_deref()),
            genre: movie.genre_ids.first().copied().and_then(genre_name).map(str::to_owned),
            image_url: self.image_url(movie.poster_path.as_deref()),
            rating: movie.vote_average,
            description: movie.overview,
        }
    }

    /// Fetches a single catalog item by provider id. Returns `None` when the
    /// item does not exist, no API key is configured, or the provider errors.
    pub async fn lookup_item(&self, item_id: u64) -> Option<CatalogItem> {
        let api_key = self.config.api_key.as_deref()?;
        let url = format!(
            "{}/movie/{item_id}?api_key={api_key}&language=en-US",
            self.config.base_url
        );
        let movie: MovieDetails = match self.fetch_json(&url).await {
            Some(movie) => movie,
            None => return None,
        };
        Some(CatalogItem {
            id: movie.id,
            title: movie.title,
            year: release_year(movie.release_date.as_deref()),
            genre: movie.genres.into_iter().next().map(|g| g.name),
            image_url: self.image_url(movie.poster_path.as_deref()),
            rating: movie.vote_average,
            description: movie.overview,
        })
    }

    /// Runs a discovery query constrained by a room's filter map. Supported
    /// filter keys are `genre` (provider genre id), `min_rating`, and `year`;
    /// unknown keys are ignored.
    pub async fn items_for_filters(
        &self,
        filters: &serde_json::Map<String, serde_json::Value>,
    ) -> Vec<CatalogItem> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            warn!("catalog api key missing, serving an empty feed");
            return Vec::new();
        };
        let mut url = format!(
            "{}/discover/movie?api_key={api_key}&language=en-US&sort_by=popularity.desc",
            self.config.base_url
        );
        if let Some(genre) = filters.get("genre").and_then(filter_scalar) {
            url.push_str(&format!("&with_genres={genre}"));
        }
        if let Some(min_rating) = filters.get("min_rating").and_then(filter_scalar) {
            url.push_str(&format!("&vote_average.gte={min_rating}"));
        }
        if let Some(year) = filters.get("year").and_then(filter_scalar) {
            url.push_str(&format!("&primary_release_year={year}"));
        }
        let Some(response) = self.fetch_json::<DiscoverResponse>(&url).await else {
            return Vec::new();
        };
        response
            .results
            .into_iter()
            .map(|movie| self.listing_item(movie))
            .collect()
    }

    async fn fetch_json<T>(&self, url: &str) -> Option<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "catalog request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(status = %response.status(), "catalog provider returned an error");
            return None;
        }
        match response.json().await {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(error = %err, "failed to decode catalog response");
                None
            }
        }
    }
}

/// Renders a JSON filter value into a query parameter fragment. Strings and
/// numbers are accepted, anything structured is dropped.
fn filter_scalar(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_year_parses_iso_dates() {
        assert_eq!(release_year(Some("1999-10-15")), Some(1999));
        assert_eq!(release_year(Some("")), None);
        assert_eq!(release_year(None), None);
    }

    #[test]
    fn filter_scalars_reject_structured_values() {
        assert_eq!(
            filter_scalar(&serde_json::json!("878")),
            Some("878".to_owned())
        );
        assert_eq!(filter_scalar(&serde_json::json!(7.5)), Some("7.5".to_owned()));
        assert_eq!(filter_scalar(&serde_json::json!({"nested": true})), None);
    }

    #[test]
    fn genre_mapping_covers_known_ids() {
        assert_eq!(genre_name(878), Some("Sci-Fi"));
        assert_eq!(genre_name(1), None);
    }
}
