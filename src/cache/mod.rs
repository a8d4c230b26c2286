//! On-disk cache of generated programs, keyed by model and question.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct ProgramCache {
    length: usize,
    cache_path: PathBuf,
}

impl ProgramCache {
    pub fn from_config(cfg: &Config) -> Self {
        let len = cfg.get_usize("CACHE_LENGTH").unwrap_or(100);
        Self::new(cfg.cache_path(), len)
    }

    pub fn new(cache_path: PathBuf, length: usize) -> Self {
        let _ = fs::create_dir_all(&cache_path);
        Self { length, cache_path }
    }

    pub fn key_for(&self, base_url: &str, model: &str, schema: &str, question: &str) -> String {
        let payload = serde_json::json!({
            "base_url": base_url,
            "model": model,
            "schema": schema,
            "question": question.trim(),
        });
        let data = serde_json::to_vec(&payload).unwrap_or_default();
        let digest = md5::compute(data);
        format!("{:x}", digest)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let p = self.cache_path.join(key);
        fs::read_to_string(p).ok()
    }

    pub fn set(&self, key: &str, program: &str) -> Result<()> {
        let p = self.cache_path.join(key);
        fs::write(&p, program).with_context(|| format!("failed to write cache entry {}", p.display()))?;
        self.prune()?;
        Ok(())
    }

    pub fn invalidate(&self, key: &str) {
        let _ = fs::remove_file(self.cache_path.join(key));
    }

    /// Oldest entries go first once the count exceeds `length`.
    fn prune(&self) -> Result<()> {
        let mut entries: Vec<_> = fs::read_dir(&self.cache_path)?.filter_map(|e| e.ok()).collect();
        entries.sort_by_key(|e| e.metadata().and_then(|m| m.modified()).ok());
        if entries.len() > self.length {
            let to_delete = entries.len() - self.length;
            for entry in entries.iter().take(to_delete) {
                let _ = fs::remove_file(entry.path());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ProgramCache::new(dir.path().to_path_buf(), 10);
        let key = cache.key_for("https://api.openai.com/v1", "gpt-4o", "schema", "How many clients?");
        assert!(cache.get(&key).is_none());
        cache.set(&key, "[]").unwrap();
        assert_eq!(cache.get(&key).as_deref(), Some("[]"));
        cache.invalidate(&key);
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_key_depends_on_model_and_question() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ProgramCache::new(dir.path().to_path_buf(), 10);
        let a = cache.key_for("u", "gpt-4o", "s", "q1");
        assert_eq!(a, cache.key_for("u", "gpt-4o", "s", "  q1 "));
        assert_ne!(a, cache.key_for("u", "gpt-4o-mini", "s", "q1"));
        assert_ne!(a, cache.key_for("u", "gpt-4o", "s", "q2"));
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_prune_bounds_entry_count() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ProgramCache::new(dir.path().to_path_buf(), 2);
        for i in 0..5 {
            cache.set(&format!("k{}", i), "[]").unwrap();
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }
}
