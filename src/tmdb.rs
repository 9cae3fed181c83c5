use crate::cache::TtlCache;
use crate::config::Config;
use crate::discovery::DiscoveryFilter;
use crate::models::{poster_url, ItemDetails, MediaKind, NormalizedItem, TrendingWindow};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const MAX_SEARCH_RESULTS: usize = 10;

type ProviderTable = Vec<(String, i32)>;
type GenreTable = HashMap<String, i32>;

#[async_trait]
pub trait TmdbApi: Send + Sync {
    async fn resolve_provider_id(
        &self,
        name: &str,
        media: MediaKind,
        region: &str,
    ) -> Result<Option<i32>>;
    async fn resolve_genre_id(&self, name: &str, media: MediaKind) -> Result<Option<i32>>;
    async fn discover(&self, filter: &DiscoveryFilter, page: u32) -> Result<Vec<NormalizedItem>>;
    async fn search_by_title(&self, query: &str, media: MediaKind) -> Result<Vec<NormalizedItem>>;
    async fn trending(
        &self,
        media: MediaKind,
        window: TrendingWindow,
    ) -> Result<Vec<NormalizedItem>>;
    async fn recommendations(&self, media: MediaKind, id: i32) -> Result<Vec<NormalizedItem>>;
    async fn details(&self, media: MediaKind, id: i32) -> Result<ItemDetails>;
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
    base_url: String,
    providers: Arc<TtlCache<(MediaKind, String), ProviderTable>>,
    genres: Arc<TtlCache<MediaKind, GenreTable>>,
}

impl TmdbClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let user_agent = format!("cinescout/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()
            .context("Failed to build TMDB HTTP client")?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            providers: Arc::new(TtlCache::with_default_ttl()),
            genres: Arc::new(TtlCache::with_default_ttl()),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.tmdb_api_key.clone(), config.tmdb_base_url.clone())
    }

    async fn provider_table(&self, media: MediaKind, region: &str) -> Result<Arc<ProviderTable>> {
        self.providers
            .get_or_refresh((media, region.to_string()), move || async move {
                #[derive(Deserialize)]
                struct Provider {
                    provider_id: i32,
                    provider_name: Option<String>,
                }
                #[derive(Deserialize)]
                struct ProviderList {
                    #[serde(default)]
                    results: Vec<Provider>,
                }

                let url = self.url(
                    &format!("/watch/providers/{media}"),
                    &[
                        ("language", "en-US".to_string()),
                        ("watch_region", region.to_string()),
                    ],
                );
                let data: ProviderList = self.get_json(&url).await?;
                debug!(%media, region, count = data.results.len(), "loaded provider table");
                Ok(data
                    .results
                    .into_iter()
                    .map(|p| (p.provider_name.unwrap_or_default().to_lowercase(), p.provider_id))
                    .collect())
            })
            .await
    }

    async fn genre_table(&self, media: MediaKind) -> Result<Arc<GenreTable>> {
        self.genres
            .get_or_refresh(media, move || async move {
                #[derive(Deserialize)]
                struct Genre {
                    id: i32,
                    name: String,
                }
                #[derive(Deserialize)]
                struct GenreList {
                    #[serde(default)]
                    genres: Vec<Genre>,
                }

                let url = self.url(
                    &format!("/genre/{media}/list"),
                    &[("language", "en-US".to_string())],
                );
                let data: GenreList = self.get_json(&url).await?;
                debug!(%media, count = data.genres.len(), "loaded genre table");
                Ok(data
                    .genres
                    .into_iter()
                    .map(|g| (g.name.to_lowercase(), g.id))
                    .collect())
            })
            .await
    }

    async fn fetch_items(&self, url: &str, media: MediaKind) -> Result<Vec<NormalizedItem>> {
        let data: ResultsPage = self.get_json(url).await?;
        Ok(data
            .results
            .into_iter()
            .map(|raw| normalize_item(raw, media))
            .collect())
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> String {
        let mut url = format!(
            "{}{path}?api_key={}",
            self.base_url,
            urlencoding::encode(&self.api_key)
        );
        for (key, value) in params {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let res = self
            .client
            .get(url)
            .send()
            .await
            .context("TMDB request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading TMDB body failed")?;
        if !status.is_success() {
            return Err(anyhow!(
                "TMDB HTTP error (status {}): {}",
                status,
                redact_key(&text, &self.api_key)
            ));
        }
        let parsed: T = serde_json::from_str(&text).context("TMDB JSON parse failed")?;
        Ok(parsed)
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn resolve_provider_id(
        &self,
        name: &str,
        media: MediaKind,
        region: &str,
    ) -> Result<Option<i32>> {
        if name.trim().is_empty() {
            return Ok(None);
        }
        let table = self.provider_table(media, region).await?;
        Ok(lookup_provider_id(&table, name))
    }

    async fn resolve_genre_id(&self, name: &str, media: MediaKind) -> Result<Option<i32>> {
        if name.trim().is_empty() {
            return Ok(None);
        }
        let table = self.genre_table(media).await?;
        Ok(table.get(&name.trim().to_lowercase()).copied())
    }

    async fn discover(&self, filter: &DiscoveryFilter, page: u32) -> Result<Vec<NormalizedItem>> {
        let url = self.url(
            &format!("/discover/{}", filter.media_type),
            &discover_params(filter, page),
        );
        self.fetch_items(&url, filter.media_type).await
    }

    async fn search_by_title(&self, query: &str, media: MediaKind) -> Result<Vec<NormalizedItem>> {
        let url = self.url(
            &format!("/search/{media}"),
            &[
                ("query", query.to_string()),
                ("language", "en-US".to_string()),
                ("page", "1".to_string()),
            ],
        );
        let mut items = self.fetch_items(&url, media).await?;
        items.truncate(MAX_SEARCH_RESULTS);
        Ok(items)
    }

    async fn trending(
        &self,
        media: MediaKind,
        window: TrendingWindow,
    ) -> Result<Vec<NormalizedItem>> {
        let url = self.url(
            &format!("/trending/{media}/{}", window.as_str()),
            &[("language", "en-US".to_string())],
        );
        self.fetch_items(&url, media).await
    }

    async fn recommendations(&self, media: MediaKind, id: i32) -> Result<Vec<NormalizedItem>> {
        let url = self.url(
            &format!("/{media}/{id}/recommendations"),
            &[("language", "en-US".to_string()), ("page", "1".to_string())],
        );
        self.fetch_items(&url, media).await
    }

    async fn details(&self, media: MediaKind, id: i32) -> Result<ItemDetails> {
        let url = self.url(
            &format!("/{media}/{id}"),
            &[
                ("language", "en-US".to_string()),
                ("append_to_response", "external_ids".to_string()),
            ],
        );
        let raw: RawDetail = self.get_json(&url).await?;
        Ok(map_details(raw, media))
    }
}

/// Query parameters for a single discover page, in TMDB's naming.
/// Query for a single discover page. There is no release-date bound.
pub fn discover_params(filter: &DiscoveryFilter, page: u32) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("page", page.to_string()),
        ("sort_by", "popularity.desc".to_string()),
        ("include_adult", "false".to_string()),
        ("language", "en-US".to_string()),
    ];
    if !filter.provider_ids.is_empty() {
        params.push(("with_watch_providers", join_ids(&filter.provider_ids)));
        params.push(("watch_region", filter.region.clone()));
    }
    if !filter.genre_ids.is_empty() {
        params.push(("with_genres", join_ids(&filter.genre_ids)));
    }
    if let Some(runtime) = filter.max_runtime_minutes {
        params.push(("with_runtime.lte", runtime.to_string()));
    }
    if let Some(lang) = &filter.original_language {
        params.push(("with_original_language", lang.clone()));
    }
    params
}

fn join_ids(ids: &[i32]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Exact lower-case match first, then the first provider whose name contains `name`.
pub fn lookup_provider_id(table: &[(String, i32)], name: &str) -> Option<i32> {
    let key = name.trim().to_lowercase();
    table
        .iter()
        .find(|(provider, _)| *provider == key)
        .or_else(|| table.iter().find(|(provider, _)| provider.contains(&key)))
        .map(|(_, id)| *id)
}

fn redact_key(text: &str, api_key: &str) -> String {
    if api_key.is_empty() {
        text.to_string()
    } else {
        text.replace(api_key, "***")
    }
}

#[derive(Debug, Deserialize)]
struct ResultsPage {
    #[serde(default)]
    results: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    id: i32,
    title: Option<String>,
    name: Option<String>,
    original_title: Option<String>,
    original_name: Option<String>,
    poster_path: Option<String>,
    overview: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    media_type: Option<String>,
    vote_average: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct Genre {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    imdb_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDetail {
    #[serde(flatten)]
    item: RawItem,
    genres: Option<Vec<Genre>>,
    runtime: Option<i32>,
    episode_run_time: Option<Vec<i32>>,
    original_language: Option<String>,
    tagline: Option<String>,
    status: Option<String>,
    number_of_seasons: Option<i32>,
    homepage: Option<String>,
    imdb_id: Option<String>,
    external_ids: Option<ExternalIds>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn normalize_item(raw: RawItem, default_media: MediaKind) -> NormalizedItem {
    let media_type = non_empty(raw.media_type).unwrap_or_else(|| default_media.to_string());
    let title = non_empty(raw.title)
        .or_else(|| non_empty(raw.name))
        .or_else(|| non_empty(raw.original_title))
        .or_else(|| non_empty(raw.original_name));
    let poster_path = non_empty(raw.poster_path);
    NormalizedItem {
        id: raw.id,
        title,
        poster_url: poster_url(poster_path.as_deref()),
        poster_path,
        overview: non_empty(raw.overview),
        release_date: non_empty(raw.release_date).or_else(|| non_empty(raw.first_air_date)),
        media_type,
        vote_average: raw.vote_average,
    }
}

fn map_details(raw: RawDetail, media: MediaKind) -> ItemDetails {
    let runtime_minutes = raw.runtime.filter(|r| *r > 0).or_else(|| {
        raw.episode_run_time
            .as_ref()
            .and_then(|r| r.first().copied())
    });
    let imdb_page = non_empty(raw.imdb_id)
        .or_else(|| raw.external_ids.and_then(|e| non_empty(e.imdb_id)))
        .map(|id| format!("https://www.imdb.com/title/{id}"));
    let genres = raw
        .genres
        .map(|g| g.into_iter().map(|x| x.name).collect())
        .unwrap_or_default();

    ItemDetails {
        item: normalize_item(raw.item, media),
        genres,
        runtime_minutes,
        language: raw.original_language.as_deref().and_then(language_name),
        tagline: non_empty(raw.tagline),
        status: non_empty(raw.status),
        seasons: raw.number_of_seasons,
        homepage: non_empty(raw.homepage),
        imdb_page,
    }
}

fn language_name(code: &str) -> Option<String> {
    if code.is_empty() {
        return None;
    }
    let name = match code {
        "en" => "English",
        "fr" => "French",
        "es" => "Spanish",
        "de" => "German",
        "it" => "Italian",
        "ja" => "Japanese",
        "ko" => "Korean",
        "zh" => "Chinese",
        "hi" => "Hindi",
        "ta" => "Tamil",
        "te" => "Telugu",
        "ml" => "Malayalam",
        "bn" => "Bengali",
        "pt" => "Portuguese",
        "ru" => "Russian",
        "tr" => "Turkish",
        _ => return Some(code.to_string()),
    };
    Some(name.to_string())
}
