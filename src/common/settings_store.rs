//! Key/value persistence for user preferences.
//!
//! Keys are dotted paths (`shortcuts.app_switch`) that map onto nested TOML
//! tables. Values are plain TOML values; typed access goes through [`read`]
//! and [`write`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use toml::{Table, Value};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("could not encode settings: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("`{key}` holds a value of the wrong type: {source}")]
    WrongType {
        key: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("`{0}` is not a table")]
    NotATable(String),
}

pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value) -> Result<(), SettingsError>;
}

/// Reads and decodes `key`. `None` when the key is absent.
pub fn read<T: DeserializeOwned>(
    store: &dyn SettingsStore,
    key: &str,
) -> Option<Result<T, SettingsError>> {
    let value = store.get(key)?;
    Some(value.try_into().map_err(|source| SettingsError::WrongType { key: key.to_string(), source }))
}

pub fn write<T: Serialize>(
    store: &mut dyn SettingsStore,
    key: &str,
    value: &T,
) -> Result<(), SettingsError> {
    store.set(key, Value::try_from(value)?)
}

fn lookup<'a>(table: &'a Table, key: &str) -> Option<&'a Value> {
    let mut parts = key.split('.');
    let mut value = table.get(parts.next()?)?;
    for part in parts {
        value = value.as_table()?.get(part)?;
    }
    Some(value)
}

fn insert(table: &mut Table, key: &str, value: Value) -> Result<(), SettingsError> {
    let mut parts: Vec<&str> = key.split('.').collect();
    let Some(leaf) = parts.pop() else {
        return Err(SettingsError::NotATable(key.to_string()));
    };
    let mut current = table;
    for part in parts {
        current = current
            .entry(part)
            .or_insert(Value::Table(Table::new()))
            .as_table_mut()
            .ok_or_else(|| SettingsError::NotATable(part.to_string()))?;
    }
    current.insert(leaf.to_string(), value);
    Ok(())
}

#[derive(Debug, Default, Clone)]
pub struct MemorySettingsStore {
    table: Table,
}

impl MemorySettingsStore {
    pub fn new() -> Self { Self::default() }

    pub fn table(&self) -> &Table { &self.table }
}

impl From<Table> for MemorySettingsStore {
    fn from(table: Table) -> Self { MemorySettingsStore { table } }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Option<Value> { lookup(&self.table, key).cloned() }

    fn set(&mut self, key: &str, value: Value) -> Result<(), SettingsError> {
        insert(&mut self.table, key, value)
    }
}

/// A settings table persisted as a TOML file. Every `set` rewrites the file.
#[derive(Debug)]
pub struct TomlSettingsStore {
    path: PathBuf,
    table: Table,
}

impl TomlSettingsStore {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rift-switch")
            .join("settings.toml")
    }

    /// Opens the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let table = match fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file yet");
                Table::new()
            }
            Err(source) => return Err(SettingsError::Io { path, source }),
        };
        Ok(Self { path, table })
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn table(&self) -> &Table { &self.table }

    fn flush(&self) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io { path: self.path.clone(), source };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let text = toml::to_string_pretty(&self.table)?;
        fs::write(&self.path, text).map_err(io_err)
    }
}

impl SettingsStore for TomlSettingsStore {
    fn get(&self, key: &str) -> Option<Value> { lookup(&self.table, key).cloned() }

    fn set(&mut self, key: &str, value: Value) -> Result<(), SettingsError> {
        insert(&mut self.table, key, value)?;
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn dotted_keys_create_nested_tables() {
        let mut store = MemorySettingsStore::new();
        write(&mut store, "shortcuts.app_switch", &"Alt+Tab").unwrap();
        write(&mut store, "long_press_threshold", &0.4).unwrap();

        assert_eq!(read::<String>(&store, "shortcuts.app_switch").unwrap().unwrap(), "Alt+Tab");
        assert_eq!(read::<f64>(&store, "long_press_threshold").unwrap().unwrap(), 0.4);
        assert!(store.table().get("shortcuts").is_some_and(Value::is_table));
        assert!(read::<bool>(&store, "missing").is_none());
    }

    #[test]
    fn wrong_type_is_reported() {
        let mut store = MemorySettingsStore::new();
        write(&mut store, "mode", &3).unwrap();
        assert!(matches!(
            read::<bool>(&store, "mode"),
            Some(Err(SettingsError::WrongType { .. }))
        ));
    }

    #[test]
    fn scalar_blocks_nested_key() {
        let mut store = MemorySettingsStore::new();
        write(&mut store, "shortcuts", &true).unwrap();
        assert!(matches!(
            write(&mut store, "shortcuts.toggle", &"Alt+Tab"),
            Err(SettingsError::NotATable(_))
        ));
    }

    #[test]
    fn toml_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let mut store = TomlSettingsStore::open(&path).unwrap();
        assert!(store.get("mode").is_none());
        write(&mut store, "mode", &"separate").unwrap();
        write(&mut store, "shortcuts.overlay", &"Alt+Space").unwrap();

        let reopened = TomlSettingsStore::open(&path).unwrap();
        assert_eq!(read::<String>(&reopened, "mode").unwrap().unwrap(), "separate");
        assert_eq!(
            read::<String>(&reopened, "shortcuts.overlay").unwrap().unwrap(),
            "Alt+Space"
        );
    }

    #[test]
    fn unparseable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "mode = = nope").unwrap();
        assert!(matches!(TomlSettingsStore::open(&path), Err(SettingsError::Parse(_))));
    }
}
