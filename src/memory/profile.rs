//! Persistent user profile.
//!
//! A small JSON document of durable facts about the user: hardware,
//! preferences, credential hints and recurring habits. Unknown top-level
//! keys written by other tools survive a load/save cycle.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::MemoryError;

/// The profile document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub hardware_specs: Map<String, Value>,
    #[serde(default)]
    pub preferences: Map<String, Value>,
    #[serde(default)]
    pub credentials_map: Map<String, Value>,
    /// Usually strings; other JSON values written by older tools are kept.
    #[serde(default)]
    pub behavior_patterns: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Which part of the profile an update targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileCategory {
    HardwareSpecs,
    Preferences,
    CredentialsMap,
    BehaviorPatterns,
    /// Any other top-level key; created on first use.
    Other(String),
}

impl FromStr for ProfileCategory {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "hardware_specs" | "hardware" => ProfileCategory::HardwareSpecs,
            "preferences" => ProfileCategory::Preferences,
            "credentials_map" | "credentials" => ProfileCategory::CredentialsMap,
            "behavior_patterns" | "habits" => ProfileCategory::BehaviorPatterns,
            other => ProfileCategory::Other(other.to_string()),
        })
    }
}

impl fmt::Display for ProfileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProfileCategory::HardwareSpecs => "hardware_specs",
            ProfileCategory::Preferences => "preferences",
            ProfileCategory::CredentialsMap => "credentials_map",
            ProfileCategory::BehaviorPatterns => "behavior_patterns",
            ProfileCategory::Other(name) => name,
        };
        f.write_str(name)
    }
}

/// Facts extracted from a user message by the harvester.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileInsights {
    #[serde(default)]
    pub hardware_specs: Option<Map<String, Value>>,
    #[serde(default)]
    pub preferences: Option<Map<String, Value>>,
    #[serde(default)]
    pub behavior_patterns: Option<Vec<String>>,
}

impl ProfileInsights {
    pub fn is_empty(&self) -> bool {
        self.hardware_specs.as_ref().map_or(true, Map::is_empty)
            && self.preferences.as_ref().map_or(true, Map::is_empty)
            && self.behavior_patterns.as_ref().map_or(true, Vec::is_empty)
    }
}

impl UserProfile {
    /// Apply one update in memory. Returns whether anything changed.
    pub fn update(
        &mut self,
        category: &ProfileCategory,
        key: Option<&str>,
        value: Value,
    ) -> Result<bool, MemoryError> {
        match category {
            ProfileCategory::BehaviorPatterns => {
                if self.behavior_patterns.contains(&value) {
                    return Ok(false);
                }
                self.behavior_patterns.push(value);
                Ok(true)
            }
            ProfileCategory::HardwareSpecs => set_key(&mut self.hardware_specs, category, key, value),
            ProfileCategory::Preferences => set_key(&mut self.preferences, category, key, value),
            ProfileCategory::CredentialsMap => {
                set_key(&mut self.credentials_map, category, key, value)
            }
            ProfileCategory::Other(name) => {
                let slot = self
                    .extra
                    .entry(name.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                match slot {
                    Value::Object(map) => set_key(map, category, key, value),
                    Value::Array(items) => {
                        if items.contains(&value) {
                            return Ok(false);
                        }
                        items.push(value);
                        Ok(true)
                    }
                    _ => Err(MemoryError::InvalidUpdate(format!(
                        "category '{}' is neither a map nor a list",
                        name
                    ))),
                }
            }
        }
    }
}

fn set_key(
    map: &mut Map<String, Value>,
    category: &ProfileCategory,
    key: Option<&str>,
    value: Value,
) -> Result<bool, MemoryError> {
    let key = key.ok_or_else(|| {
        MemoryError::InvalidUpdate(format!("category '{}' needs a key", category))
    })?;
    let changed = map.get(key) != Some(&value);
    map.insert(key.to_string(), value);
    Ok(changed)
}

/// A [`UserProfile`] bound to its file. Every update is saved immediately.
#[derive(Debug)]
pub struct ProfileStore {
    path: PathBuf,
    profile: UserProfile,
    /// Set when the file holds valid JSON of an unexpected shape.
    read_only: bool,
}

impl ProfileStore {
    /// Load the profile at `path`.
    ///
    /// A missing file is created with an empty profile. A file that is not
    /// JSON is logged and replaced by an empty profile in memory; it is only
    /// overwritten on the next update. Valid JSON that does not fit the
    /// profile shape is never overwritten: the store becomes read-only.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            let store = Self {
                path,
                profile: UserProfile::default(),
                read_only: false,
            };
            store.save()?;
            return Ok(store);
        }

        let raw = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<Value>(&content).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        let (profile, read_only) = match raw {
            Ok(value) => match serde_json::from_value(value) {
                Ok(profile) => (profile, false),
                Err(e) => {
                    tracing::warn!(
                        "Profile {} has an unexpected shape ({}); leaving it untouched",
                        path.display(),
                        e
                    );
                    (UserProfile::default(), true)
                }
            },
            Err(e) => {
                tracing::warn!("Error loading profile {}: {}", path.display(), e);
                (UserProfile::default(), false)
            }
        };

        Ok(Self {
            path,
            profile,
            read_only,
        })
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Write the profile as pretty JSON.
    pub fn save(&self) -> Result<(), MemoryError> {
        if self.read_only {
            return Err(MemoryError::InvalidUpdate(format!(
                "refusing to overwrite {}; fix or remove it first",
                self.path.display()
            )));
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| MemoryError::IoError(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(&self.profile)
            .map_err(|e| MemoryError::SerializeError(e.to_string()))?;
        fs::write(&self.path, content).map_err(|e| MemoryError::IoError(e.to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    /// Update one entry and persist.
    ///
    /// For `behavior_patterns` the key is ignored and the value is appended
    /// unless already present.
    pub fn update(
        &mut self,
        category: &ProfileCategory,
        key: Option<&str>,
        value: Value,
    ) -> Result<(), MemoryError> {
        if self.profile.update(category, key, value)? {
            self.save()?;
        }
        Ok(())
    }

    /// Apply everything in `insights`, saving once. Returns the number of changes.
    pub fn apply_insights(&mut self, insights: &ProfileInsights) -> Result<usize, MemoryError> {
        let mut changes = 0;

        let maps = [
            (ProfileCategory::HardwareSpecs, &insights.hardware_specs),
            (ProfileCategory::Preferences, &insights.preferences),
        ];
        for (category, map) in maps {
            for (key, value) in map.iter().flatten() {
                if self
                    .profile
                    .update(&category, Some(key.as_str()), value.clone())?
                {
                    changes += 1;
                }
            }
        }

        for pattern in insights.behavior_patterns.iter().flatten() {
            if self
                .profile
                .update(&ProfileCategory::BehaviorPatterns, None, Value::String(pattern.clone()))?
            {
                changes += 1;
            }
        }

        if changes > 0 {
            self.save()?;
        }
        Ok(changes)
    }
}
