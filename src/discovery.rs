//! Maps a [`ParsedQuery`] onto TMDB discover requests and walks the
//! fallback ladder: primary discover, title search, broadened discover.

use crate::models::{MediaKind, NormalizedItem};
use crate::query::{self, MediaType, ParsedQuery};
use crate::tmdb::TmdbApi;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, info, warn};

const ANIMATION_GENRE: &str = "Animation";
const ANIME_LANGUAGE: &str = "ja";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryFilter {
    pub media_type: MediaKind,
    pub region: String,
    pub provider_ids: Vec<i32>,
    pub genre_ids: Vec<i32>,
    pub max_runtime_minutes: Option<u32>,
    pub original_language: Option<String>,
}

impl DiscoveryFilter {
    /// Same filter without the platform and runtime constraints.
    pub fn broadened(&self) -> Self {
        Self {
            provider_ids: Vec::new(),
            max_runtime_minutes: None,
            ..self.clone()
        }
    }
}

/// Name-level request shape before provider and genre ids are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPlan {
    pub media_type: MediaKind,
    pub provider_names: Vec<String>,
    pub genre_names: Vec<String>,
    pub max_runtime_minutes: Option<u32>,
    pub original_language: Option<String>,
}

pub fn plan(parsed: &ParsedQuery) -> FilterPlan {
    let mut genre_names = parsed.genres.clone();
    let mut original_language = None;

    let media_type = match parsed.media_type {
        MediaType::Any | MediaType::Movie => MediaKind::Movie,
        MediaType::Tv => MediaKind::Tv,
        MediaType::Anime => {
            add_genre(&mut genre_names, ANIMATION_GENRE);
            original_language = Some(ANIME_LANGUAGE.to_string());
            parsed.explicit_format.unwrap_or(MediaKind::Tv)
        }
        // No genre constraint: documentaries are matched by endpoint only.
        MediaType::Documentary => parsed.explicit_format.unwrap_or(MediaKind::Tv),
    };

    // A dub request says nothing about the original language.
    if original_language.is_none() && !parsed.dub_required {
        original_language = parsed.language.clone();
    }

    FilterPlan {
        media_type,
        provider_names: parsed.providers.clone(),
        genre_names,
        max_runtime_minutes: parsed.max_duration_minutes,
        original_language,
    }
}

fn add_genre(genres: &mut Vec<String>, genre: &str) {
    if !genres.iter().any(|g| g.eq_ignore_ascii_case(genre)) {
        genres.push(genre.to_string());
    }
}

/// Resolves a plan's names to ids. Names that do not resolve, or whose lookup
/// fails, are dropped.
pub async fn resolve_filter(api: &dyn TmdbApi, plan: &FilterPlan, region: &str) -> DiscoveryFilter {
    let mut provider_ids = Vec::new();
    for name in &plan.provider_names {
        match api.resolve_provider_id(name, plan.media_type, region).await {
            Ok(Some(id)) => push_id(&mut provider_ids, id),
            Ok(None) => debug!(provider = %name, region, "provider not available, dropping"),
            Err(e) => warn!(provider = %name, "provider lookup failed, dropping: {:#}", e),
        }
    }

    let mut genre_ids = Vec::new();
    for name in &plan.genre_names {
        match api.resolve_genre_id(name, plan.media_type).await {
            Ok(Some(id)) => push_id(&mut genre_ids, id),
            Ok(None) => debug!(genre = %name, "unknown genre, dropping"),
            Err(e) => warn!(genre = %name, "genre lookup failed, dropping: {:#}", e),
        }
    }

    DiscoveryFilter {
        media_type: plan.media_type,
        region: region.to_string(),
        provider_ids,
        genre_ids,
        max_runtime_minutes: plan.max_runtime_minutes,
        original_language: plan.original_language.clone(),
    }
}

fn push_id(ids: &mut Vec<i32>, id: i32) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

pub async fn build_filter(api: &dyn TmdbApi, parsed: &ParsedQuery, region: &str) -> DiscoveryFilter {
    resolve_filter(api, &plan(parsed), region).await
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub region: String,
    pub auto_broaden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStage {
    Primary,
    TitleSearch,
    Broadened,
    Exhausted,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub query: ParsedQuery,
    pub filter: DiscoveryFilter,
    pub stage: SearchStage,
    pub items: Vec<NormalizedItem>,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}

pub async fn search_text(api: &dyn TmdbApi, text: &str, options: &SearchOptions) -> SearchOutcome {
    run_search(api, &query::parse(text), options).await
}

/// Runs the fallback ladder. Client failures are logged, recorded as warnings,
/// and treated as an empty step.
pub async fn run_search(
    api: &dyn TmdbApi,
    parsed: &ParsedQuery,
    options: &SearchOptions,
) -> SearchOutcome {
    let filter = build_filter(api, parsed, &options.region).await;
    debug!(?filter, "primary discovery filter");

    let mut warnings = Vec::new();
    let mut notes = Vec::new();
    if parsed.dub_required {
        notes.push(
            "Dub availability is not reliably recorded in metadata; check the platform directly."
                .to_string(),
        );
    }

    let mut stage = SearchStage::Primary;
    let mut items = attempt("discovery", api.discover(&filter, 1), &mut warnings).await;

    if items.is_empty() {
        if let Some(title) = parsed.title.as_deref() {
            info!("No discovery results, trying title search for '{}'", title);
            stage = SearchStage::TitleSearch;
            items = attempt(
                "title search",
                api.search_by_title(title, filter.media_type),
                &mut warnings,
            )
            .await;
        }
    }

    if items.is_empty() && options.auto_broaden {
        info!("No exact matches, broadening search (dropping platform and duration filters)");
        notes.push("No exact matches; platform and duration filters were removed.".to_string());
        stage = SearchStage::Broadened;
        let broadened = filter.broadened();
        items = attempt("broadened discovery", api.discover(&broadened, 1), &mut warnings).await;
    }

    if items.is_empty() {
        stage = SearchStage::Exhausted;
    }
    info!(stage = ?stage, count = items.len(), "search finished");

    SearchOutcome {
        query: parsed.clone(),
        filter,
        stage,
        items,
        warnings,
        notes,
    }
}

async fn attempt<F>(step: &str, call: F, warnings: &mut Vec<String>) -> Vec<NormalizedItem>
where
    F: Future<Output = Result<Vec<NormalizedItem>>>,
{
    match call.await {
        Ok(items) => items,
        Err(e) => {
            warn!("{} failed: {:#}", step, e);
            warnings.push(format!("{step} failed: {e}"));
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse;

    #[test]
    fn any_defaults_to_movie() {
        let p = plan(&parse("something fun on netflix"));
        assert_eq!(p.media_type, MediaKind::Movie);
        assert_eq!(p.provider_names, vec!["netflix"]);
        assert_eq!(p.original_language, None);
    }

    #[test]
    fn anime_maps_to_tv_with_animation_and_japanese() {
        let p = plan(&parse("hindi dubbed anime"));
        assert_eq!(p.media_type, MediaKind::Tv);
        assert_eq!(p.genre_names, vec!["anime", "Animation"]);
        assert_eq!(p.original_language.as_deref(), Some("ja"));
    }

    #[test]
    fn anime_movie_keeps_movie_target() {
        let p = plan(&parse("anime movie under 2 hours"));
        assert_eq!(p.media_type, MediaKind::Movie);
        assert_eq!(p.max_runtime_minutes, Some(120));
        assert_eq!(p.original_language.as_deref(), Some("ja"));
    }

    #[test]
    fn animation_genre_is_not_duplicated() {
        let p = plan(&parse("animation anime"));
        assert_eq!(p.genre_names, vec!["animation", "anime"]);
    }

    #[test]
    fn documentary_defaults_to_tv_without_genre() {
        let p = plan(&parse("documentary about space"));
        assert_eq!(p.media_type, MediaKind::Tv);
        assert!(p.genre_names.is_empty());

        let p = plan(&parse("documentary movies about food"));
        assert_eq!(p.media_type, MediaKind::Movie);
        assert!(p.genre_names.is_empty());
    }

    #[test]
    fn language_passes_through_unless_dubbed() {
        let p = plan(&parse("hindi thriller movies"));
        assert_eq!(p.original_language.as_deref(), Some("hi"));

        let p = plan(&parse("hindi dubbed thriller movies"));
        assert_eq!(p.original_language, None);
    }

    #[test]
    fn broadened_keeps_genres_and_language() {
        let filter = DiscoveryFilter {
            media_type: MediaKind::Tv,
            region: "US".to_string(),
            provider_ids: vec![8],
            genre_ids: vec![16],
            max_runtime_minutes: Some(30),
            original_language: Some("ja".to_string()),
        };
        let broad = filter.broadened();
        assert!(broad.provider_ids.is_empty());
        assert_eq!(broad.max_runtime_minutes, None);
        assert_eq!(broad.genre_ids, vec![16]);
        assert_eq!(broad.original_language.as_deref(), Some("ja"));
        assert_eq!(broad.region, "US");
    }
}
