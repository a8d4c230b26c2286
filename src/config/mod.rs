use std::{
    collections::HashMap,
    env,
    fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use directories::BaseDirs;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    overrides: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        Self::load_from(&default_config_path())
    }

    /// Defaults, then the rc file at `config_path`, then the environment.
    pub fn load_from(config_path: &Path) -> Self {
        let mut map = default_map();

        if config_path.exists() {
            if let Ok(file) = fs::File::open(config_path) {
                let reader = BufReader::new(file);
                for line in reader.lines().map_while(Result::ok) {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    if let Some((k, v)) = line.split_once('=') {
                        map.insert(k.trim().to_string(), v.trim().to_string());
                    }
                }
            }
        }

        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self {
            inner: map,
            overrides: HashMap::new(),
            config_path: config_path.to_path_buf(),
        }
    }

    /// Command-line values; these beat both the environment and the rc file.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.overrides.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(v) = self.overrides.get(key) {
            return Some(v.clone());
        }
        if let Ok(v) = env::var(key) {
            return Some(v);
        }
        self.inner.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.parse::<usize>().ok())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.parse::<u64>().ok())
    }

    pub fn get_f32(&self, key: &str) -> Option<f32> {
        self.get(key).and_then(|v| v.parse::<f32>().ok())
    }

    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).map(PathBuf::from)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.get_path("CACHE_PATH")
            .unwrap_or_else(|| env::temp_dir().join("invoice_agent").join("cache"))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.get_path("DATA_DIR").unwrap_or_else(|| PathBuf::from("data"))
    }
}

fn is_config_key(k: &str) -> bool {
    const KEYS: &[&str] = &[
        "OPENAI_API_KEY",
        "API_BASE_URL",
        "DEFAULT_MODEL",
        "TEMPERATURE",
        "MAX_COMPLETION_TOKENS",
        "REQUEST_TIMEOUT",
        "DATA_DIR",
        "LOG_LEVEL",
        "MAX_RETRIES",
        "RETRY_WITH_FEEDBACK",
        "EXECUTION_STEP_BUDGET",
        "CACHE_PATH",
        "CACHE_LENGTH",
        "PRETTIFY_MARKDOWN",
    ];

    KEYS.contains(&k) || k.starts_with("AGENT_") || k.starts_with("OPENAI_")
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("invoice_agent").join(".agentrc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();
    let temp = env::temp_dir().join("invoice_agent");

    // Paths
    m.insert(
        "CACHE_PATH".into(),
        temp.join("cache").to_string_lossy().into_owned(),
    );
    m.insert("DATA_DIR".into(), "data".into());

    // Numbers
    m.insert("CACHE_LENGTH".into(), "100".into());
    m.insert("REQUEST_TIMEOUT".into(), "60".into());
    m.insert("TEMPERATURE".into(), "0".into());
    m.insert("MAX_COMPLETION_TOKENS".into(), "5000".into());
    m.insert("MAX_RETRIES".into(), "2".into());
    m.insert("EXECUTION_STEP_BUDGET".into(), "1000000".into());

    // Strings
    m.insert("DEFAULT_MODEL".into(), "gpt-4o".into());
    m.insert("API_BASE_URL".into(), "default".into());
    m.insert("LOG_LEVEL".into(), "info".into());

    // Bools as strings
    m.insert("RETRY_WITH_FEEDBACK".into(), "false".into());
    m.insert("PRETTIFY_MARKDOWN".into(), "true".into());

    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rc_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join(".agentrc");
        fs::write(&rc, "# local settings\nAGENT_TEST_CACHE_LENGTH = 7\n\nnot a pair\n").unwrap();
        let cfg = Config::load_from(&rc);
        assert_eq!(cfg.get_usize("AGENT_TEST_CACHE_LENGTH"), Some(7));
        assert_eq!(cfg.config_path, rc);
    }

    #[test]
    fn test_missing_rc_file_keeps_defaults() {
        let cfg = Config::load_from(Path::new("/nonexistent/invoice_agent/.agentrc"));
        assert!(cfg.get("CACHE_PATH").is_some());
        assert!(cfg.get("AGENT_TEST_UNSET_KEY").is_none());
    }

    #[test]
    fn test_overrides_win() {
        let mut cfg = Config::load_from(Path::new("/nonexistent/.agentrc"));
        cfg.set("AGENT_TEST_MODEL", "gpt-4o-mini");
        cfg.set("AGENT_TEST_FEEDBACK", "TRUE");
        assert_eq!(cfg.get("AGENT_TEST_MODEL").as_deref(), Some("gpt-4o-mini"));
        assert!(cfg.get_bool("AGENT_TEST_FEEDBACK"));
        cfg.set("AGENT_TEST_TEMPERATURE", "0.5");
        assert_eq!(cfg.get_f32("AGENT_TEST_TEMPERATURE"), Some(0.5));
    }

    #[test]
    fn test_known_keys() {
        assert!(is_config_key("MAX_RETRIES"));
        assert!(is_config_key("AGENT_ANYTHING"));
        assert!(!is_config_key("HOME"));
    }
}
