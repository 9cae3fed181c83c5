//! Free-form text to structured discovery filters.
//!
//! Matching is plain case-insensitive substring search over fixed keyword
//! tables, so a keyword embedded in an unrelated word still matches
//! ("prime" inside "primetime"). Keep it that way unless the tables change.

use crate::models::MediaKind;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Any,
    Movie,
    Tv,
    Anime,
    Documentary,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedQuery {
    pub media_type: MediaType,
    pub genres: Vec<String>,
    pub providers: Vec<String>,
    pub max_duration_minutes: Option<u32>,
    pub language: Option<String>,
    pub dub_required: bool,
    pub title: Option<String>,
    /// First plain movie/tv keyword in the text, even when anime or
    /// documentary won `media_type`.
    pub explicit_format: Option<MediaKind>,
}

// Anime and documentary come first: "anime series" is anime, not tv.
const MEDIA_KEYWORDS: &[(MediaType, &[&str])] = &[
    (MediaType::Anime, &["anime", "animes"]),
    (
        MediaType::Documentary,
        &["documentary", "documentaries", "docu"],
    ),
    (
        MediaType::Movie,
        &["movie", "movies", "film", "films", "feature"],
    ),
    (
        MediaType::Tv,
        &["tv", "series", "show", "shows", "tvshow", "serieses"],
    ),
];

const PLATFORM_CANON: &[(&str, &str)] = &[
    ("amazon", "amazon prime video"),
    ("amazon prime", "amazon prime video"),
    ("prime", "amazon prime video"),
    ("netflix", "netflix"),
    ("disney", "disney plus"),
    ("hotstar", "disney plus hotstar"),
    ("crunchyroll", "crunchyroll"),
    ("mxplayer", "mx player"),
    ("hulu", "hulu"),
    ("sonyliv", "sony liv"),
    ("sony liv", "sony liv"),
    ("youtube", "youtube"),
];

const GENRE_KEYWORDS: &[&str] = &[
    "rom-com",
    "romcom",
    "romantic comedy",
    "romance",
    "action",
    "thriller",
    "sci-fi",
    "science fiction",
    "comedy",
    "drama",
    "horror",
    "animated",
    "animation",
    "fantasy",
    "adventure",
    "mystery",
    "crime",
    "anime",
];

const HINDI_DUB_PHRASES: &[&str] = &["hindi dub", "hindi dubbed", "dub in hindi"];

static HOURS_PATTERNS: Lazy<[Regex; 4]> = Lazy::new(|| {
    [
        re(r"under\s+(\d+)\s*hr"),
        re(r"under\s+(\d+)\s*hours?"),
        re(r"less than\s+(\d+)\s*hr"),
        re(r"less than\s+(\d+)\s*hours?"),
    ]
});
static MINUTES_PATTERNS: Lazy<[Regex; 2]> =
    Lazy::new(|| [re(r"under\s+(\d+)\s*min"), re(r"under\s+(\d+)\s*minutes")]);
static BOUND_HOURS_PATTERN: Lazy<Regex> = Lazy::new(|| re(r"(?:<|less than)\s*(\d+)\s*(?:hours|hr)"));
static QUOTED_PATTERN: Lazy<Regex> = Lazy::new(|| re(r#"["'](.+?)["']"#));
static ON_PLATFORM_PATTERN: Lazy<Regex> = Lazy::new(|| re(r"on\s+([a-z0-9\-\s]+)"));

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in pattern {pattern}: {e}"))
}

/// Interprets one line of user text. Never fails; unknown input yields defaults.
pub fn parse(text: &str) -> ParsedQuery {
    let lower = text.to_lowercase();
    let (language, dub_required) = detect_language(&lower);

    ParsedQuery {
        media_type: detect_media_type(&lower),
        genres: detect_genres(&lower),
        providers: detect_providers(&lower),
        max_duration_minutes: extract_duration_minutes(&lower),
        language: language.map(str::to_string),
        dub_required,
        title: extract_title(text),
        explicit_format: detect_explicit_format(&lower),
    }
}

fn detect_media_type(lower: &str) -> MediaType {
    MEDIA_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(media, _)| *media)
        .unwrap_or_default()
}

fn detect_explicit_format(lower: &str) -> Option<MediaKind> {
    MEDIA_KEYWORDS
        .iter()
        .filter_map(|(media, keywords)| {
            let kind = match media {
                MediaType::Movie => MediaKind::Movie,
                MediaType::Tv => MediaKind::Tv,
                _ => return None,
            };
            keywords
                .iter()
                .any(|kw| lower.contains(kw))
                .then_some(kind)
        })
        .next()
}

fn detect_providers(lower: &str) -> Vec<String> {
    let mut providers = Vec::new();
    for (keyword, canonical) in PLATFORM_CANON {
        if lower.contains(keyword) {
            push_unique(&mut providers, canonical.to_string());
        }
    }
    if providers.is_empty() {
        if let Some(canonical) = platform_after_on(lower) {
            providers.push(canonical.to_string());
        }
    }
    providers
}

fn platform_after_on(lower: &str) -> Option<&'static str> {
    let caps = ON_PLATFORM_PATTERN.captures(lower)?;
    let word = caps.get(1)?.as_str().split_whitespace().next()?;
    canonical_platform(word)
}

/// Canonical platform name for an exact keyword, if the keyword is known.
pub fn canonical_platform(keyword: &str) -> Option<&'static str> {
    PLATFORM_CANON
        .iter()
        .find(|(k, _)| *k == keyword)
        .map(|(_, canonical)| *canonical)
}

fn detect_genres(lower: &str) -> Vec<String> {
    let mut genres = Vec::new();
    for genre in GENRE_KEYWORDS {
        if lower.contains(genre) {
            push_unique(&mut genres, genre.replace('-', " "));
        }
    }
    genres
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Recognizes "under 2hr", "under 90 min", "less than 2 hours" and "< 2 hours".
/// Other phrasings ("90 minutes or less") are not recognized.
pub fn extract_duration_minutes(text: &str) -> Option<u32> {
    let lower = text.to_lowercase();

    if let Some(minutes) = HOURS_PATTERNS
        .iter()
        .find_map(|p| first_number(p, &lower))
        .and_then(hours_to_minutes)
    {
        return Some(minutes);
    }
    if let Some(minutes) = MINUTES_PATTERNS
        .iter()
        .find_map(|p| first_number(p, &lower))
        .filter(|m| *m > 0)
    {
        return Some(minutes);
    }
    first_number(&BOUND_HOURS_PATTERN, &lower).and_then(hours_to_minutes)
}

fn first_number(pattern: &Regex, text: &str) -> Option<u32> {
    pattern.captures(text)?.get(1)?.as_str().parse().ok()
}

fn hours_to_minutes(hours: u32) -> Option<u32> {
    hours.checked_mul(60).filter(|m| *m > 0)
}

fn detect_language(lower: &str) -> (Option<&'static str>, bool) {
    if HINDI_DUB_PHRASES.iter().any(|p| lower.contains(p)) {
        (Some("hi"), true)
    } else if lower.contains("hindi") && !lower.contains("dub") {
        (Some("hi"), false)
    } else if lower.contains("japanese") || lower.contains("japan") {
        (Some("ja"), false)
    } else {
        (None, false)
    }
}

fn extract_title(original: &str) -> Option<String> {
    QUOTED_PATTERN
        .captures(original)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_romcom_movie_with_duration_and_platform() {
        let q = parse("romcom movies under 2hr on netflix");
        assert_eq!(q.media_type, MediaType::Movie);
        assert_eq!(q.genres, vec!["romcom"]);
        assert_eq!(q.providers, vec!["netflix"]);
        assert_eq!(q.max_duration_minutes, Some(120));
        assert_eq!(q.language, None);
        assert_eq!(q.explicit_format, Some(MediaKind::Movie));
    }

    #[test]
    fn parses_hindi_dubbed_anime_series() {
        let q = parse("hindi dubbed anime series");
        assert_eq!(q.media_type, MediaType::Anime);
        assert_eq!(q.language.as_deref(), Some("hi"));
        assert!(q.dub_required);
        assert_eq!(q.explicit_format, Some(MediaKind::Tv));
    }

    #[test]
    fn extracts_quoted_title_from_original_case() {
        assert_eq!(parse(r#"watch "Inception""#).title.as_deref(), Some("Inception"));
        assert_eq!(parse("find 'The Matrix' please").title.as_deref(), Some("The Matrix"));
        assert_eq!(parse("no quotes here").title, None);
    }

    #[test]
    fn dedupes_providers() {
        assert_eq!(parse("netflix netflix movies").providers, vec!["netflix"]);
        assert_eq!(
            parse("something on amazon prime").providers,
            vec!["amazon prime video"]
        );
    }

    #[test]
    fn hotstar_resolves_alongside_disney() {
        let q = parse("disney hotstar thriller");
        assert_eq!(q.providers, vec!["disney plus", "disney plus hotstar"]);
        assert_eq!(q.genres, vec!["thriller"]);
    }

    #[test]
    fn unrecognized_input_yields_defaults() {
        assert_eq!(parse("xyz"), ParsedQuery::default());
        assert_eq!(parse(""), ParsedQuery::default());
    }

    #[test]
    fn genres_keep_scan_order_and_replace_hyphens() {
        let q = parse("a sci-fi rom-com");
        assert_eq!(q.genres, vec!["rom com", "sci fi"]);
    }

    #[test]
    fn substring_matches_are_kept() {
        // "romantic comedy" also contains "comedy"
        let q = parse("romantic comedy");
        assert_eq!(q.genres, vec!["romantic comedy", "comedy"]);
        // "primetime" contains "prime"
        assert_eq!(parse("primetime").providers, vec!["amazon prime video"]);
    }

    #[test]
    fn documentary_beats_plain_formats() {
        let q = parse("docu series about space");
        assert_eq!(q.media_type, MediaType::Documentary);
        assert_eq!(q.explicit_format, Some(MediaKind::Tv));
    }

    #[test]
    fn duration_patterns() {
        assert_eq!(extract_duration_minutes("under 2 hours"), Some(120));
        assert_eq!(extract_duration_minutes("less than 3hr"), Some(180));
        assert_eq!(extract_duration_minutes("under 90 min"), Some(90));
        assert_eq!(extract_duration_minutes("under 45 minutes"), Some(45));
        assert_eq!(extract_duration_minutes("< 2 hours"), Some(120));
        assert_eq!(extract_duration_minutes("<1hr"), Some(60));
        assert_eq!(extract_duration_minutes("90 minutes or less"), None);
        assert_eq!(extract_duration_minutes("less than 90 minutes"), None);
        assert_eq!(extract_duration_minutes("under 0 hr"), None);
    }

    #[test]
    fn hour_phrases_win_over_minutes() {
        assert_eq!(extract_duration_minutes("under 90 min, under 1 hour"), Some(60));
    }

    #[test]
    fn language_detection_order() {
        let q = parse("dub in hindi please");
        assert_eq!((q.language.as_deref(), q.dub_required), (Some("hi"), true));

        let q = parse("hindi movies");
        assert_eq!((q.language.as_deref(), q.dub_required), (Some("hi"), false));

        // "hindi" with a stray "dub" that is not a dub phrase matches nothing
        let q = parse("hindi anime dubbed");
        assert_eq!(q.language, None);
        assert!(!q.dub_required);

        let q = parse("Japanese films");
        assert_eq!((q.language.as_deref(), q.dub_required), (Some("ja"), false));
    }

    #[test]
    fn on_heuristic_needs_known_platform() {
        assert!(parse("a film on somewhere").providers.is_empty());
        assert!(parse("on   ").providers.is_empty());
    }

    #[test]
    fn parse_is_idempotent() {
        let text = "Hindi dubbed anime on Crunchyroll under 30 min \"Naruto\"";
        assert_eq!(parse(text), parse(text));
        let q = parse(text);
        assert_eq!(q.providers, vec!["crunchyroll"]);
        assert_eq!(q.max_duration_minutes, Some(30));
        assert_eq!(q.title.as_deref(), Some("Naruto"));
    }

    #[test]
    fn dub_always_implies_language() {
        for text in ["hindi dub", "dub in hindi", "dubbed", "hindi dubbed japanese"] {
            let q = parse(text);
            assert!(!q.dub_required || q.language.is_some(), "{text}");
        }
    }
}
