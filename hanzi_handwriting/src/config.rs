use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use serde_derive::{Deserialize, Serialize};
use tracing::{info, warn};

/// How many candidates the UI shows
pub const DEFAULT_TOP_K: usize = 42;
/// Move events closer together than this are coalesced
pub const DEFAULT_THROTTLE_MS: u64 = 6;

/// A reference corpus to load at startup
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CorpusSpec {
    pub name: String,
    /// `.bin` files are read as bincode, anything else as compact JSON
    pub path: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub top_k: usize,
    #[serde(with = "millis")]
    pub throttle_window: Duration,
    /// Corpora in order of preference; on equal scores, earlier corpora win
    pub corpora: Vec<CorpusSpec>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::with_corpus_dir("data")
    }
}

impl SessionConfig {
    /// Defaults with the two standard corpora under `dir`
    pub fn with_corpus_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            top_k: DEFAULT_TOP_K,
            throttle_window: Duration::from_millis(DEFAULT_THROTTLE_MS),
            corpora: vec![
                CorpusSpec {
                    name: "mmah".to_string(),
                    path: dir.join("mmah.json"),
                },
                CorpusSpec {
                    name: "orig".to_string(),
                    path: dir.join("orig.json"),
                },
            ],
        }
    }

    /// Reads overrides from the environment, falling back to defaults
    pub fn load() -> Self {
        let corpus_dir: String = try_load("HANZI_CORPUS_DIR", "data");
        let mut config = Self::with_corpus_dir(corpus_dir);
        config.top_k = try_load("HANZI_TOP_K", &DEFAULT_TOP_K.to_string());
        if config.top_k == 0 {
            warn!("HANZI_TOP_K must be positive, using default: {DEFAULT_TOP_K}");
            config.top_k = DEFAULT_TOP_K;
        }
        config.throttle_window = Duration::from_millis(try_load("HANZI_THROTTLE_MS", &DEFAULT_THROTTLE_MS.to_string()));
        config
    }

    pub fn corpus_names(&self) -> impl Iterator<Item = &str> {
        self.corpora.iter().map(|c| c.name.as_str())
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    match raw.parse() {
        Ok(value) => value,
        Err(e) => {
            warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
            parse_default(default)
        }
    }
}

// Defaults are written in this file and always parse
fn parse_default<T: FromStr>(default: &str) -> T
where
    T::Err: Display,
{
    match default.parse() {
        Ok(value) => value,
        Err(e) => unreachable!("default {default:?} does not parse: {e}"),
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.top_k, 42);
        assert_eq!(config.throttle_window, Duration::from_millis(6));
        let names: Vec<&str> = config.corpus_names().collect();
        assert_eq!(names, vec!["mmah", "orig"]);
        assert_eq!(config.corpora[0].path, PathBuf::from("data/mmah.json"));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: SessionConfig = serde_json::from_str(r#"{"top_k": 10, "throttle_window": 12}"#).unwrap();
        assert_eq!(config.top_k, 10);
        assert_eq!(config.throttle_window, Duration::from_millis(12));
        assert_eq!(config.corpora.len(), 2);
    }

    #[test]
    fn test_invalid_value_falls_back() {
        let value: usize = try_load("HANZI_TEST_UNSET_VARIABLE_FOR_CONFIG", "7");
        assert_eq!(value, 7);
        env::set_var("HANZI_TEST_BAD_TOP_K", "lots");
        let value: usize = try_load("HANZI_TEST_BAD_TOP_K", "42");
        assert_eq!(value, 42);
    }
}
