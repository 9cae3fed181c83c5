use anyhow::{anyhow, Context, Result};
use std::env;
use std::net::SocketAddr;

pub const DEFAULT_TMDB_BASE: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_REGION: &str = "IN";
const DEFAULT_BIND: &str = "0.0.0.0:3146";

#[derive(Debug, Clone)]
pub struct Config {
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    pub default_region: String,
    pub auto_broaden: bool,
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let tmdb_api_key = get("TMDB_API_KEY").context("TMDB_API_KEY not set")?;
        let tmdb_base_url = get("TMDB_BASE_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_TMDB_BASE.to_string());
        let default_region = match get("CINESCOUT_REGION") {
            Some(r) => normalize_region(&r)?,
            None => DEFAULT_REGION.to_string(),
        };
        let auto_broaden = match get("CINESCOUT_AUTO_BROADEN") {
            Some(v) => parse_bool(&v)
                .ok_or_else(|| anyhow!("CINESCOUT_AUTO_BROADEN must be true or false, got '{}'", v))?,
            None => true,
        };
        let bind_addr = get("CINESCOUT_BIND")
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
            .parse()
            .context("CINESCOUT_BIND must be a socket address like 0.0.0.0:3146")?;

        Ok(Self {
            tmdb_api_key,
            tmdb_base_url,
            default_region,
            auto_broaden,
            bind_addr,
        })
    }
}

/// Upper-cases a two-letter territory code, rejecting anything else.
pub fn normalize_region(input: &str) -> Result<String> {
    let region = input.trim();
    if region.len() == 2 && region.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(region.to_ascii_uppercase())
    } else {
        Err(anyhow!("region must be a two-letter code, got '{}'", input))
    }
}

pub fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn applies_defaults() {
        let cfg = Config::from_lookup(lookup(&[("TMDB_API_KEY", "abc")])).unwrap();
        assert_eq!(cfg.tmdb_api_key, "abc");
        assert_eq!(cfg.tmdb_base_url, DEFAULT_TMDB_BASE);
        assert_eq!(cfg.default_region, "IN");
        assert!(cfg.auto_broaden);
        assert_eq!(cfg.bind_addr.port(), 3146);
    }

    #[test]
    fn missing_api_key_is_fatal() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("TMDB_API_KEY", "  ")])).is_err());
    }

    #[test]
    fn reads_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("TMDB_API_KEY", "abc"),
            ("TMDB_BASE_URL", "http://localhost:9000/3/"),
            ("CINESCOUT_REGION", "us"),
            ("CINESCOUT_AUTO_BROADEN", "off"),
            ("CINESCOUT_BIND", "127.0.0.1:8080"),
        ]))
        .unwrap();
        assert_eq!(cfg.tmdb_base_url, "http://localhost:9000/3");
        assert_eq!(cfg.default_region, "US");
        assert!(!cfg.auto_broaden);
        assert_eq!(cfg.bind_addr.port(), 8080);
    }

    #[test]
    fn rejects_bad_region() {
        assert!(normalize_region("IND").is_err());
        assert!(normalize_region("1N").is_err());
        assert_eq!(normalize_region(" gb ").unwrap(), "GB");
    }
}
