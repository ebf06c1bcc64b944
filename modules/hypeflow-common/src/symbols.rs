use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Read-only lookup of valid exchange symbols (e.g. AAPL, BRK.B).
///
/// Explicitly constructed and injected wherever validation is wanted —
/// there is no ambient singleton. `refresh` swaps the whole set in one
/// call so a periodic job can rebuild it from an upstream listing.
#[derive(Debug, Clone, Default)]
pub struct SymbolDirectory {
    symbols: HashSet<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize)]
struct CacheFile {
    symbols: Vec<String>,
    updated_at: Option<DateTime<Utc>>,
}

impl SymbolDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add symbols, normalizing to uppercase and filtering out anything that
    /// is not 1-6 chars of letters plus an optional dot class (BRK.B).
    pub fn insert_many<I, S>(&mut self, symbols: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for s in symbols {
            let s = s.as_ref().trim().to_uppercase();
            if (1..=6).contains(&s.len())
                && s.chars().all(|ch| ch.is_ascii_alphabetic() || ch == '.')
            {
                self.symbols.insert(s);
            }
        }
    }

    /// Replace the whole set and stamp the refresh time.
    pub fn refresh<I, S>(&mut self, symbols: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.symbols.clear();
        self.insert_many(symbols);
        self.refreshed_at = Some(Utc::now());
    }

    pub fn contains(&self, ticker: &str) -> bool {
        if ticker.is_empty() {
            return false;
        }
        self.symbols.contains(&ticker.trim().to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Load a directory from a JSON cache file. Missing file yields an
    /// empty directory rather than an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading symbol cache {}", path.display()))?;
        let cache: CacheFile = serde_json::from_str(&raw)
            .with_context(|| format!("parsing symbol cache {}", path.display()))?;

        let mut directory = Self::new();
        directory.insert_many(cache.symbols);
        directory.refreshed_at = cache.updated_at;
        info!(count = directory.len(), path = %path.display(), "Loaded symbol directory");
        Ok(directory)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut symbols: Vec<String> = self.symbols.iter().cloned().collect();
        symbols.sort();
        let cache = CacheFile {
            symbols,
            updated_at: self.refreshed_at,
        };
        std::fs::write(path, serde_json::to_string(&cache)?)
            .with_context(|| format!("writing symbol cache {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_malformed_symbols() {
        let mut dir = SymbolDirectory::new();
        dir.insert_many(["aapl", "BRK.B", "", "TOOLONGX", "BAD1", "  tsla "]);

        assert!(dir.contains("AAPL"));
        assert!(dir.contains("brk.b"));
        assert!(dir.contains("TSLA"));
        assert!(!dir.contains("TOOLONGX"));
        assert!(!dir.contains("BAD1"));
        assert_eq!(dir.len(), 3);
    }

    #[test]
    fn refresh_replaces_the_set() {
        let mut dir = SymbolDirectory::new();
        dir.insert_many(["AAPL"]);
        dir.refresh(["GME", "AMC"]);

        assert!(!dir.contains("AAPL"));
        assert!(dir.contains("GME"));
        assert!(dir.refreshed_at.is_some());
    }

    #[test]
    fn cache_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("symbols_cache.json");

        let mut dir = SymbolDirectory::new();
        dir.refresh(["TSLA", "AAPL"]);
        dir.save(&path).unwrap();

        let loaded = SymbolDirectory::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains("TSLA"));
        assert_eq!(loaded.refreshed_at, dir.refreshed_at);
    }

    #[test]
    fn missing_cache_is_empty() {
        let dir = SymbolDirectory::load(Path::new("/nonexistent/symbols.json")).unwrap();
        assert!(dir.is_empty());
    }
}
