//! Site-wide YAML datasets (testimonials, services, ...) exposed to every page.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::context::RESERVED_KEYS;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("Error loading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Error loading {path}: {source}")]
    Parsing {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Error loading {path}: {source}")]
    Conversion {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Data file {path} would shadow the reserved template variable `{key}`")]
    ReservedKey { key: String, path: PathBuf },
}

/// Parsed data files keyed by normalized file stem.
#[derive(Debug, Clone, Default)]
pub struct DataCatalog {
    entries: BTreeMap<String, Value>,
}

impl DataCatalog {
    /// Load every `*.yaml` file directly under `dir`.
    ///
    /// A missing directory yields an empty catalog.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, DataError> {
        let dir = dir.as_ref();
        let mut catalog = Self::default();

        if !dir.is_dir() {
            tracing::warn!("Data directory not found: {}", dir.display());
            return Ok(catalog);
        }

        let entries = std::fs::read_dir(dir).map_err(|source| DataError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| DataError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "yaml") {
                files.push(path);
            }
        }
        files.sort();

        for path in files {
            let (key, value) = load_file(&path)?;
            if RESERVED_KEYS.contains(&key.as_str()) {
                return Err(DataError::ReservedKey { key, path });
            }
            tracing::info!("Loaded {}", key);
            catalog.entries.insert(key, value);
        }

        Ok(catalog)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Replace hyphens with underscores so the key is a valid template identifier.
pub fn normalize_key(stem: &str) -> String {
    stem.replace('-', "_")
}

fn load_file(path: &Path) -> Result<(String, Value), DataError> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let key = normalize_key(&stem);

    let raw = std::fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_err = |source| DataError::Parsing {
        path: path.to_path_buf(),
        source,
    };
    let mut parsed: serde_yaml::Value = serde_yaml::from_str(&raw).map_err(parse_err)?;
    // Resolve `<<: *anchor` merge keys
    parsed.apply_merge().map_err(parse_err)?;
    let value = serde_json::to_value(parsed).map_err(|source| DataError::Conversion {
        path: path.to_path_buf(),
        source,
    })?;

    Ok((key.clone(), unwrap_named(value, &stem, &key)))
}

/// A file `services.yaml` holding `services: [...]` contributes the list, not
/// the one-key mapping around it.
fn unwrap_named(value: Value, stem: &str, key: &str) -> Value {
    match value {
        Value::Object(mut map) => {
            if let Some(inner) = map.remove(stem) {
                inner
            } else if let Some(inner) = map.remove(key) {
                inner
            } else {
                Value::Object(map)
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_unwraps_key_matching_filename() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "testimonials.yaml",
            "testimonials:\n  - name: A\n    text: Great\n",
        );

        let catalog = DataCatalog::load(dir.path()).unwrap();
        assert_eq!(
            catalog.get("testimonials"),
            Some(&json!([{ "name": "A", "text": "Great" }]))
        );
    }

    #[test]
    fn test_hyphenated_stem_is_normalized() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "how-it-works.yaml", "how_it_works:\n  steps: 3\n");
        write(dir.path(), "team-members.yaml", "team-members: [Ana, Bo]\n");

        let catalog = DataCatalog::load(dir.path()).unwrap();
        assert_eq!(catalog.get("how_it_works"), Some(&json!({ "steps": 3 })));
        assert_eq!(catalog.get("team_members"), Some(&json!(["Ana", "Bo"])));
        assert!(catalog.get("how-it-works").is_none());
    }

    #[test]
    fn test_mapping_without_matching_key_kept_whole() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "contact.yaml", "email: hi@example.com\nphone: '555'\n");
        write(dir.path(), "tags.yaml", "- a\n- b\n");

        let catalog = DataCatalog::load(dir.path()).unwrap();
        assert_eq!(
            catalog.get("contact"),
            Some(&json!({ "email": "hi@example.com", "phone": "555" }))
        );
        assert_eq!(catalog.get("tags"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn test_merge_keys_are_resolved() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "plans.yaml",
            "base: &b\n  price: 10\npro:\n  <<: *b\n  name: Pro\n",
        );

        let catalog = DataCatalog::load(dir.path()).unwrap();
        assert_eq!(
            catalog.get("plans"),
            Some(&json!({ "base": { "price": 10 }, "pro": { "price": 10, "name": "Pro" } }))
        );
    }

    #[test]
    fn test_only_top_level_yaml_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "one.yaml", "1");
        write(dir.path(), "notes.yml", "ignored: true");
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        write(&dir.path().join("nested"), "two.yaml", "2");

        let catalog = DataCatalog::load(dir.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("one"), Some(&json!(1)));
    }

    #[test]
    fn test_malformed_file_aborts() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "broken.yaml", "key: [1, 2\n");

        let err = DataCatalog::load(dir.path()).unwrap_err();
        assert!(matches!(err, DataError::Parsing { .. }));
        assert!(err.to_string().contains("broken.yaml"));
    }

    #[test]
    fn test_reserved_key_rejected() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "page.yaml", "title: clash\n");

        let err = DataCatalog::load(dir.path()).unwrap_err();
        assert!(matches!(err, DataError::ReservedKey { ref key, .. } if key == "page"));
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let catalog = DataCatalog::load(dir.path().join("data")).unwrap();
        assert!(catalog.is_empty());
    }
}
