//! Prompt storage interface.
//!
//! The prompt library lives in the host's key-value storage and is
//! owned by the UI surfaces; the page engine never touches it
//! directly. This module pins the shared contract: the key names, the
//! JSON shapes stored under them, and the defaults a reader applies
//! when a key has never been written. [`MemoryStore`] is the in-memory
//! backend used by tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Well-known storage keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StorageKey {
    Prompts,
    Projects,
    Settings,
    LastSelectedProject,
}

impl StorageKey {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageKey::Prompts => "prompts",
            StorageKey::Projects => "projects",
            StorageKey::Settings => "settings",
            StorageKey::LastSelectedProject => "lastSelectedProject",
        }
    }
}

/// Project id selected when nothing was ever picked. The UI surfaces
/// synthesize a project row under this id rather than storing one.
pub const DEFAULT_PROJECT: &str = "default";

/// A stored prompt. `created_at` is an ISO-8601 timestamp, the way
/// the UI surfaces stamp it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: String,
    pub title: String,
    pub content: String,
    pub project: String,
    pub created_at: String,
}

/// A stored project. `created_at` matches [`Prompt::created_at`],
/// except the synthesized default row, which carries an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub enable_notifications: bool,
    pub enable_context_menu: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_project_name: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable_notifications: true,
            enable_context_menu: true,
            default_project_name: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("stored value for {key} is malformed: {source}")]
    Decode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot encode value for {key}: {source}")]
    Encode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot read snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Async key-value access, the shape the host's storage area exposes.
/// Values are raw JSON documents; the typed loaders below apply the
/// per-key defaults.
pub trait KeyValueStore {
    async fn get(&self, key: StorageKey) -> Result<Option<serde_json::Value>, StoreError>;
    async fn set(&mut self, key: StorageKey, value: serde_json::Value) -> Result<(), StoreError>;
}

pub async fn load_prompts(store: &impl KeyValueStore) -> Result<Vec<Prompt>, StoreError> {
    load_or(store, StorageKey::Prompts, Vec::new).await
}

pub async fn load_projects(store: &impl KeyValueStore) -> Result<Vec<Project>, StoreError> {
    load_or(store, StorageKey::Projects, Vec::new).await
}

pub async fn load_settings(store: &impl KeyValueStore) -> Result<Settings, StoreError> {
    load_or(store, StorageKey::Settings, Settings::default).await
}

pub async fn load_last_selected_project(
    store: &impl KeyValueStore,
) -> Result<String, StoreError> {
    load_or(store, StorageKey::LastSelectedProject, || {
        DEFAULT_PROJECT.to_owned()
    })
    .await
}

pub async fn save_prompts(
    store: &mut impl KeyValueStore,
    prompts: &[Prompt],
) -> Result<(), StoreError> {
    save(store, StorageKey::Prompts, prompts).await
}

pub async fn save_projects(
    store: &mut impl KeyValueStore,
    projects: &[Project],
) -> Result<(), StoreError> {
    save(store, StorageKey::Projects, projects).await
}

pub async fn save_settings(
    store: &mut impl KeyValueStore,
    settings: &Settings,
) -> Result<(), StoreError> {
    save(store, StorageKey::Settings, settings).await
}

pub async fn save_last_selected_project(
    store: &mut impl KeyValueStore,
    project: &str,
) -> Result<(), StoreError> {
    save(store, StorageKey::LastSelectedProject, &project).await
}

async fn load_or<T, F>(
    store: &impl KeyValueStore,
    key: StorageKey,
    fallback: F,
) -> Result<T, StoreError>
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    match store.get(key).await? {
        Some(value) => serde_json::from_value(value).map_err(|source| StoreError::Decode {
            key: key.as_str(),
            source,
        }),
        None => Ok(fallback()),
    }
}

async fn save<T: Serialize + ?Sized>(
    store: &mut impl KeyValueStore,
    key: StorageKey,
    value: &T,
) -> Result<(), StoreError> {
    let value = serde_json::to_value(value).map_err(|source| StoreError::Encode {
        key: key.as_str(),
        source,
    })?;
    store.set(key, value).await
}

/// In-memory backend. Tests seed it directly; the CLI seeds it from a
/// snapshot file to inspect an exported library.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, serde_json::Value>,
}

impl MemoryStore {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path).map_err(|source| StoreError::Snapshot {
            path: path.to_owned(),
            source,
        })?;
        Self::from_snapshot(&text)
    }

    /// Parses a storage snapshot: one JSON object with the well-known
    /// keys at the top level, unknown keys carried along untouched.
    pub fn from_snapshot(text: &str) -> Result<Self, StoreError> {
        let object: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(text).map_err(|source| StoreError::Decode {
                key: "snapshot",
                source,
            })?;
        Ok(Self {
            entries: object.into_iter().collect(),
        })
    }

    /// Renders the store back to a snapshot object, keys sorted.
    pub fn to_snapshot(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(&self.entries).map_err(|source| StoreError::Encode {
            key: "snapshot",
            source,
        })
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: StorageKey) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.entries.get(key.as_str()).cloned())
    }

    async fn set(&mut self, key: StorageKey, value: serde_json::Value) -> Result<(), StoreError> {
        self.entries.insert(key.as_str().to_owned(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- Defaults --

    #[tokio::test]
    async fn absent_keys_load_as_defaults() {
        let store = MemoryStore::default();
        assert_eq!(load_prompts(&store).await.unwrap(), vec![]);
        assert_eq!(load_projects(&store).await.unwrap(), vec![]);
        assert_eq!(load_settings(&store).await.unwrap(), Settings::default());
        assert_eq!(load_last_selected_project(&store).await.unwrap(), "default");
    }

    #[test]
    fn default_settings_enable_everything() {
        let settings = Settings::default();
        assert!(settings.enable_notifications);
        assert!(settings.enable_context_menu);
        assert_eq!(settings.default_project_name, None);
    }

    // -- Round trips --

    #[tokio::test]
    async fn prompts_round_trip() {
        let mut store = MemoryStore::default();
        let prompts = vec![Prompt {
            id: "p1".to_owned(),
            title: "Greeting".to_owned(),
            content: "hello there".to_owned(),
            project: "default".to_owned(),
            created_at: "2023-11-14T22:13:20.000Z".to_owned(),
        }];

        save_prompts(&mut store, &prompts).await.unwrap();
        assert_eq!(load_prompts(&store).await.unwrap(), prompts);
    }

    #[tokio::test]
    async fn last_selected_project_round_trips() {
        let mut store = MemoryStore::default();
        save_last_selected_project(&mut store, "1738002400000").await.unwrap();
        assert_eq!(
            load_last_selected_project(&store).await.unwrap(),
            "1738002400000"
        );
    }

    // -- Wire shapes --

    #[test]
    fn prompt_uses_camel_case_fields() {
        let prompt = Prompt {
            id: "p1".to_owned(),
            title: "t".to_owned(),
            content: "c".to_owned(),
            project: "default".to_owned(),
            created_at: "2024-01-01T00:00:00.000Z".to_owned(),
        };
        assert_eq!(
            serde_json::to_string(&prompt).unwrap(),
            r#"{"id":"p1","title":"t","content":"c","project":"default","createdAt":"2024-01-01T00:00:00.000Z"}"#
        );
    }

    #[test]
    fn settings_omit_absent_default_project() {
        assert_eq!(
            serde_json::to_string(&Settings::default()).unwrap(),
            r#"{"enableNotifications":true,"enableContextMenu":true}"#
        );
    }

    // -- Snapshots --

    #[tokio::test]
    async fn snapshot_files_seed_a_store() {
        let store = MemoryStore::from_snapshot(
            r#"{"prompts":[{"id":"p1","title":"t","content":"c","project":"default","createdAt":"2024-01-01T00:00:00.000Z"}],"lastSelectedProject":"1738002400000","unrelated":true}"#,
        )
        .unwrap();

        assert_eq!(load_prompts(&store).await.unwrap().len(), 1);
        assert_eq!(
            load_last_selected_project(&store).await.unwrap(),
            "1738002400000"
        );
        assert_eq!(load_projects(&store).await.unwrap(), vec![]);
    }

    #[tokio::test]
    async fn exported_snapshots_use_iso_timestamps() {
        // Shape of a real storage export: ISO stamps on prompts, an
        // empty stamp on the synthesized default project row.
        let store = MemoryStore::from_snapshot(
            r#"{"prompts":[{"id":"1738002400000","title":"Summarize","content":"Summarize this page.","project":"default","createdAt":"2025-01-27T18:26:40.000Z"}],"projects":[{"id":"default","name":"Default","description":"","createdAt":""}]}"#,
        )
        .unwrap();

        let prompts = load_prompts(&store).await.unwrap();
        assert_eq!(prompts[0].created_at, "2025-01-27T18:26:40.000Z");
        let projects = load_projects(&store).await.unwrap();
        assert_eq!(projects[0].created_at, "");
        assert_eq!(projects[0].description.as_deref(), Some(""));
    }

    #[test]
    fn non_object_snapshot_is_rejected() {
        let err = MemoryStore::from_snapshot("[1,2]").unwrap_err();
        assert!(matches!(err, StoreError::Decode { key: "snapshot", .. }));
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_render() {
        let mut store = MemoryStore::default();
        save_last_selected_project(&mut store, "1738002400000").await.unwrap();
        save_settings(&mut store, &Settings::default()).await.unwrap();

        let reloaded = MemoryStore::from_snapshot(&store.to_snapshot().unwrap()).unwrap();
        assert_eq!(
            load_last_selected_project(&reloaded).await.unwrap(),
            "1738002400000"
        );
        assert_eq!(load_settings(&reloaded).await.unwrap(), Settings::default());
    }

    // -- Failure shapes --

    #[tokio::test]
    async fn malformed_stored_value_is_a_decode_error() {
        let mut store = MemoryStore::default();
        store
            .set(StorageKey::Prompts, serde_json::json!(42))
            .await
            .unwrap();
        let err = load_prompts(&store).await.unwrap_err();
        assert!(matches!(err, StoreError::Decode { key: "prompts", .. }));
    }
}
