// File based cache of raw data provider responses

use std::fs;
use std::path::PathBuf;

use log::debug;

use crate::errors::BoxBoxError;

const SEASON_SLUG: &str = "season";

/// Identifies one cached response by season, race and kind of data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    year: u32,
    race: String,
    kind: String,
}

impl CacheKey {
    /// Key for data that belongs to a whole season, e.g. the calendar
    pub fn season(year: u32, kind: &str) -> Self {
        Self {
            year,
            race: SEASON_SLUG.to_string(),
            kind: kind.to_string(),
        }
    }

    pub fn race(year: u32, race_name: &str, kind: &str) -> Self {
        Self {
            year,
            race: normalize_name(race_name),
            kind: kind.to_string(),
        }
    }
}

/// Normalize a name for consistent file naming
pub(crate) fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

/// Cache storing every response as `<root>/<year>/<race>/<kind>.json`.
///
/// Entries are never expired by age, only skipped when the caller no longer
/// finds them usable. Writes go through a temporary file owned by the current
/// process and are renamed into place, so a concurrent reader only ever sees
/// complete files.
pub struct FileCache {
    root: PathBuf,
    enabled: bool,
}

impl FileCache {
    pub fn new(root: PathBuf, enabled: bool) -> Result<Self, BoxBoxError> {
        if enabled && !root.exists() {
            fs::create_dir_all(&root).map_err(|e| BoxBoxError::CacheIOError { source: e })?;
        }
        Ok(Self { root, enabled })
    }

    /// A cache that never stores anything
    pub fn disabled() -> Self {
        Self {
            root: PathBuf::new(),
            enabled: false,
        }
    }

    fn file_path_for(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(key.year.to_string())
            .join(&key.race)
            .join(format!("{}.json", normalize_name(&key.kind)))
    }

    pub fn load(&self, key: &CacheKey) -> Result<Option<String>, BoxBoxError> {
        if !self.enabled {
            return Ok(None);
        }
        let path = self.file_path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        debug!("Cache hit: {:?}", path);
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| BoxBoxError::CacheIOError { source: e })
    }

    pub fn store(&self, key: &CacheKey, body: &str) -> Result<(), BoxBoxError> {
        if !self.enabled {
            return Ok(());
        }
        let path = self.file_path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BoxBoxError::CacheIOError { source: e })?;
        }
        let temp_path = path.with_extension(format!("json.{}.tmp", std::process::id()));
        fs::write(&temp_path, body).map_err(|e| BoxBoxError::CacheIOError { source: e })?;
        fs::rename(&temp_path, &path).map_err(|e| BoxBoxError::CacheIOError { source: e })?;
        debug!("Cached response at {:?}", path);
        Ok(())
    }

    /// Return the cached body for `key`, or run `fetch` and cache what it returns.
    ///
    /// Only bodies accepted by `usable` are served from or written to the cache,
    /// an unusable fresh body is still handed back to the caller. A fetch
    /// returning `None` (no data upstream) is not cached.
    pub fn get_or_fetch<F, U>(
        &self,
        key: &CacheKey,
        fetch: F,
        usable: U,
    ) -> Result<Option<String>, BoxBoxError>
    where
        F: FnOnce() -> Result<Option<String>, BoxBoxError>,
        U: Fn(&str) -> bool,
    {
        if let Some(body) = self.load(key)? {
            if usable(&body) {
                return Ok(Some(body));
            }
            debug!("Cached {}/{} is not usable, fetching again", key.race, key.kind);
        }
        let fetched = fetch()?;
        match &fetched {
            Some(body) if usable(body) => self.store(key, body)?,
            Some(_) => debug!("Not caching incomplete {}/{}", key.race, key.kind),
            None => {}
        }
        Ok(fetched)
    }
}
