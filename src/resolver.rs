use crate::cache::TtlCache;
use crate::omdb::{OmdbApi, OmdbResponse};
use crate::tmdb::{TmdbApi, TmdbSearchResponse, POSTER_BASE};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Which upstream supplied the rating, rendered into the caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingSource {
    Tmdb,
    Imdb,
}

impl fmt::Display for RatingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RatingSource::Tmdb => write!(f, "TMDB"),
            RatingSource::Imdb => write!(f, "IMDB"),
        }
    }
}

/// One normalized match, whichever service produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieInfo {
    pub title: String,
    pub year: String,
    pub rating: String,
    pub source: RatingSource,
    pub poster: Option<String>,
}

/// Outcome of a title resolution.
///
/// `Unavailable` is reserved for the case where every configured service
/// failed at the transport level; a service that answered with zero matches
/// counts as a clean miss, not a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(MovieInfo),
    NotFound,
    Unavailable,
}

/// Lookup fallback chain: TMDB first, OMDb second, each behind a TTL cache.
pub struct Resolver {
    tmdb: Option<Arc<dyn TmdbApi>>,
    omdb: Option<Arc<dyn OmdbApi>>,
    tmdb_cache: TtlCache<TmdbSearchResponse>,
    omdb_cache: TtlCache<OmdbResponse>,
    cache_ttl_seconds: i64,
}

impl Resolver {
    pub fn new(
        tmdb: Option<Arc<dyn TmdbApi>>,
        omdb: Option<Arc<dyn OmdbApi>>,
        cache_ttl_seconds: i64,
    ) -> Self {
        Self {
            tmdb,
            omdb,
            tmdb_cache: TtlCache::new(),
            omdb_cache: TtlCache::new(),
            cache_ttl_seconds,
        }
    }

    /// Resolve a free-text title through the fallback chain.
    ///
    /// An upstream error is downgraded to a miss for that service; the chain
    /// only reports `Unavailable` when no configured service answered at all.
    pub async fn resolve(&self, query: &str) -> Resolution {
        let mut configured = 0usize;
        let mut errored = 0usize;

        if let Some(tmdb) = &self.tmdb {
            configured += 1;
            let key = format!("tmdb:{}", query.to_lowercase());
            match self
                .tmdb_cache
                .get_or_fetch(&key, self.cache_ttl_seconds, || tmdb.search_movie(query))
                .await
            {
                Ok(data) => {
                    if let Some(info) = movie_from_tmdb(query, &data) {
                        return Resolution::Found(info);
                    }
                }
                Err(e) => {
                    warn!("TMDB search failed for '{}': {}", query, e);
                    errored += 1;
                }
            }
        }

        if let Some(omdb) = &self.omdb {
            configured += 1;
            let key = format!("omdb:{}", query.to_lowercase());
            match self
                .omdb_cache
                .get_or_fetch(&key, self.cache_ttl_seconds, || omdb.lookup_title(query))
                .await
            {
                Ok(data) => {
                    if let Some(info) = movie_from_omdb(&data) {
                        return Resolution::Found(info);
                    }
                }
                Err(e) => {
                    warn!("OMDb lookup failed for '{}': {}", query, e);
                    errored += 1;
                }
            }
        }

        if configured > 0 && errored == configured {
            Resolution::Unavailable
        } else {
            Resolution::NotFound
        }
    }
}

/// Adapter for the TMDB search shape: first result wins, ranked upstream.
fn movie_from_tmdb(query: &str, data: &TmdbSearchResponse) -> Option<MovieInfo> {
    let top = data.results.first()?;
    let title = top
        .title
        .clone()
        .unwrap_or_else(|| query.to_string());
    let year = top
        .release_date
        .as_deref()
        .and_then(|d| d.get(..4))
        .unwrap_or("")
        .to_string();
    let rating = top
        .vote_average
        .map(|r| r.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let poster = top
        .poster_path
        .as_ref()
        .map(|p| format!("{POSTER_BASE}{p}"));
    Some(MovieInfo {
        title,
        year,
        rating,
        source: RatingSource::Tmdb,
        poster,
    })
}

/// Adapter for the OMDb shape. "N/A" is OMDb's sentinel for a missing poster.
fn movie_from_omdb(data: &OmdbResponse) -> Option<MovieInfo> {
    if !data.is_match() {
        return None;
    }
    let poster = data
        .poster
        .clone()
        .filter(|p| !p.is_empty() && p != "N/A");
    Some(MovieInfo {
        title: data.title.clone().unwrap_or_else(|| "?".to_string()),
        year: data.year.clone().unwrap_or_default(),
        rating: data
            .imdb_rating
            .clone()
            .unwrap_or_else(|| "N/A".to_string()),
        source: RatingSource::Imdb,
        poster,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tmdb::TmdbMovie;

    fn tmdb_hit() -> TmdbSearchResponse {
        TmdbSearchResponse {
            results: vec![TmdbMovie {
                title: Some("Jailer".to_string()),
                release_date: Some("2023-08-10".to_string()),
                vote_average: Some(7.8),
                poster_path: Some("/abc.jpg".to_string()),
            }],
        }
    }

    #[test]
    fn tmdb_adapter_extracts_year_prefix_and_poster_url() {
        let info = movie_from_tmdb("jailer", &tmdb_hit()).unwrap();
        assert_eq!(info.title, "Jailer");
        assert_eq!(info.year, "2023");
        assert_eq!(info.rating, "7.8");
        assert_eq!(info.source, RatingSource::Tmdb);
        assert_eq!(
            info.poster.as_deref(),
            Some("https://image.tmdb.org/t/p/w500/abc.jpg")
        );
    }

    #[test]
    fn tmdb_adapter_falls_back_to_query_title_and_na_rating() {
        let data = TmdbSearchResponse {
            results: vec![TmdbMovie {
                title: None,
                release_date: None,
                vote_average: None,
                poster_path: None,
            }],
        };
        let info = movie_from_tmdb("some query", &data).unwrap();
        assert_eq!(info.title, "some query");
        assert_eq!(info.year, "");
        assert_eq!(info.rating, "N/A");
        assert!(info.poster.is_none());
    }

    #[test]
    fn tmdb_adapter_rejects_empty_results() {
        let data = TmdbSearchResponse { results: vec![] };
        assert!(movie_from_tmdb("x", &data).is_none());
    }

    #[test]
    fn omdb_adapter_treats_na_poster_as_absent() {
        let data = OmdbResponse {
            response: "True".to_string(),
            title: Some("Jailer".to_string()),
            year: Some("2023".to_string()),
            imdb_rating: Some("8.1".to_string()),
            poster: Some("N/A".to_string()),
        };
        let info = movie_from_omdb(&data).unwrap();
        assert_eq!(info.source, RatingSource::Imdb);
        assert!(info.poster.is_none());
    }

    #[test]
    fn omdb_adapter_rejects_non_match() {
        let data = OmdbResponse {
            response: "False".to_string(),
            title: None,
            year: None,
            imdb_rating: None,
            poster: None,
        };
        assert!(movie_from_omdb(&data).is_none());
    }

    #[tokio::test]
    async fn unconfigured_resolver_reports_not_found() {
        let resolver = Resolver::new(None, None, 900);
        assert_eq!(resolver.resolve("anything").await, Resolution::NotFound);
    }
}
