// Copyright 2023 Remi Bernotavicius

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: PathBuf,
    pub media_dir: PathBuf,
    pub media_url: String,
    pub page_size: i64,
    pub pool_size: u32,
    pub log_level: log::LevelFilter,
}

impl Config {
    /// Reads the configuration from the environment. Anything unset falls back to a default under
    /// `data_dir`.
    pub fn load(data_dir: PathBuf) -> crate::Result<Self> {
        Self::from_lookup(data_dir, |key| env::var(key).ok())
    }

    fn from_lookup(
        data_dir: PathBuf,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> crate::Result<Self> {
        let page_size = parse_or(&lookup, "RECIPE_SHARE_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(crate::Error::Config(format!(
                "RECIPE_SHARE_PAGE_SIZE must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
            )));
        }

        Ok(Self {
            port: parse_or(&lookup, "RECIPE_SHARE_PORT", 8000)?,
            database_path: lookup("RECIPE_SHARE_DATABASE")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("data.sqlite")),
            media_dir: lookup("RECIPE_SHARE_MEDIA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("media")),
            media_url: lookup("RECIPE_SHARE_MEDIA_URL")
                .map(|u| u.trim_end_matches('/').to_owned())
                .unwrap_or_else(|| "/media".into()),
            page_size,
            pool_size: parse_or(&lookup, "RECIPE_SHARE_POOL_SIZE", 8)?,
            log_level: parse_or(&lookup, "LOG_LEVEL", log::LevelFilter::Info)?,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> crate::Result<T>
where
    T::Err: Display,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| crate::Error::Config(format!("invalid {key} value {value:?}: {e}"))),
        None => Ok(default),
    }
}
