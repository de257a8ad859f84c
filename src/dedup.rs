//! Долговечный учёт уже опубликованных постов.
//!
//! Отсутствие ключа в хранилище - единственный критерий "нужно
//! публиковать", поэтому хранилище критично для корректности, а не
//! оптимизация. Запись на диск идёт через временный файл с переименованием,
//! чтобы после аварийного завершения load() не увидел полузаписанный файл.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::models::{CanonicalKey, DedupRecord};

pub trait DedupStore {
    fn contains(&self, key: &CanonicalKey) -> bool;

    /// Вызывается только после успешной доставки ВСЕХ отправок поста.
    fn commit(&mut self, key: CanonicalKey, record: DedupRecord) -> Result<(), StoreError>;

    /// Точка долговечности: после Ok запись переживает перезапуск.
    fn flush(&mut self) -> Result<(), StoreError>;
}

/// Файловое хранилище: JSON-словарь "{owner_id}_{post_id}" -> запись.
pub struct JsonDedupStore {
    path: PathBuf,
    entries: HashMap<CanonicalKey, DedupRecord>,
}

impl JsonDedupStore {
    /// Открывает хранилище. Нечитаемый или повреждённый файл не валит
    /// процесс: хранилище стартует пустым, а ошибка возвращается
    /// вызывающему, чтобы тот её залогировал.
    pub fn open(path: impl Into<PathBuf>) -> (Self, Option<StoreError>) {
        let path = path.into();
        let mut store = JsonDedupStore {
            path: path.clone(),
            entries: HashMap::new(),
        };

        if !path.exists() {
            return (store, None);
        }

        match Self::load(&path) {
            Ok(entries) => {
                store.entries = entries;
                (store, None)
            }
            // Пустое хранилище - консервативное восстановление: повторная
            // публикация части старых постов безопаснее потери новых.
            Err(e) => (store, Some(e)),
        }
    }

    fn load(path: &Path) -> Result<HashMap<CanonicalKey, DedupRecord>, StoreError> {
        let raw = fs::read_to_string(path)?;
        let parsed: BTreeMap<String, DedupRecord> = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Corrupted(format!("{}: {}", path.display(), e)))?;

        let mut entries = HashMap::with_capacity(parsed.len());
        for (raw_key, record) in parsed {
            let key = CanonicalKey::parse(&raw_key)
                .ok_or_else(|| StoreError::Corrupted(format!("invalid cache key '{}'", raw_key)))?;
            entries.insert(key, record);
        }
        Ok(entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DedupStore for JsonDedupStore {
    fn contains(&self, key: &CanonicalKey) -> bool {
        self.entries.contains_key(key)
    }

    fn commit(&mut self, key: CanonicalKey, record: DedupRecord) -> Result<(), StoreError> {
        self.entries.insert(key, record);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let serializable: BTreeMap<String, &DedupRecord> = self
            .entries
            .iter()
            .map(|(key, record)| (key.to_string(), record))
            .collect();
        let json = serde_json::to_string_pretty(&serializable)?;

        // Атомарная замена: полный файл или прежний, но не смесь.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Хранилище в памяти: тот же контракт, без долговечности. Используется
/// в тестах конвейера.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryDedupStore {
    entries: HashMap<CanonicalKey, DedupRecord>,
}

#[cfg(test)]
impl MemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
impl DedupStore for MemoryDedupStore {
    fn contains(&self, key: &CanonicalKey) -> bool {
        self.entries.contains_key(key)
    }

    fn commit(&mut self, key: CanonicalKey, record: DedupRecord) -> Result<(), StoreError> {
        self.entries.insert(key, record);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(message_ids: Vec<i64>) -> DedupRecord {
        DedupRecord {
            published_at: Utc::now(),
            message_ids,
        }
    }

    #[test]
    fn test_roundtrip_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let (mut store, warning) = JsonDedupStore::open(&path);
        assert!(warning.is_none());
        assert!(store.is_empty());

        let key = CanonicalKey::new(-42, 10);
        store.commit(key, record(vec![100, 101])).unwrap();
        store.flush().unwrap();

        let (reopened, warning) = JsonDedupStore::open(&path);
        assert!(warning.is_none());
        assert_eq!(reopened.len(), 1);
        assert!(reopened.contains(&key));
    }

    #[test]
    fn test_message_ids_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let (mut store, _) = JsonDedupStore::open(&path);
        store
            .commit(CanonicalKey::new(-1, 1), record(vec![7, 8, 9]))
            .unwrap();
        store.flush().unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let parsed: BTreeMap<String, DedupRecord> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["-1_1"].message_ids, vec![7, 8, 9]);
    }

    #[test]
    fn test_corrupted_file_surfaces_error_and_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{not json").unwrap();

        let (store, warning) = JsonDedupStore::open(&path);
        assert!(store.is_empty());
        assert!(matches!(warning, Some(StoreError::Corrupted(_))));
    }

    #[test]
    fn test_invalid_key_counts_as_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(
            &path,
            r#"{"oops": {"published_at": "2026-01-01T00:00:00Z", "message_ids": []}}"#,
        )
        .unwrap();

        let (store, warning) = JsonDedupStore::open(&path);
        assert!(store.is_empty());
        assert!(matches!(warning, Some(StoreError::Corrupted(_))));
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (store, warning) = JsonDedupStore::open(dir.path().join("absent.json"));
        assert!(store.is_empty());
        assert!(warning.is_none());
    }

    #[test]
    fn test_flush_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let (mut store, _) = JsonDedupStore::open(&path);
        store.commit(CanonicalKey::new(-1, 1), record(vec![1])).unwrap();
        store.flush().unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
