//! Process-lifetime memoisation of the reference tables.

use std::collections::HashMap;
use std::hash::Hash;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::classifier::CategoryClassifier;
use crate::error::Result;
use crate::reference::{
    load_country_data, load_error, load_trade_data, CountryTable, TradeTable,
};

static SHARED: Lazy<ReferenceCache> = Lazy::new(ReferenceCache::new);

/// Identity of a source file: a change in any part triggers a reload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SourceKey {
    path: PathBuf,
    len: u64,
    modified: Option<SystemTime>,
}

impl SourceKey {
    fn of(path: &Path) -> Result<Self> {
        let path = fs::canonicalize(path)?;
        let meta = fs::metadata(&path)?;
        Ok(Self {
            path,
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

/// Loaded tables keyed by source identity.
///
/// Trade tables are additionally keyed by the classifier fingerprint, since
/// their `category` column depends on it. Tables are handed out as `Arc`s and
/// never mutated, so concurrent readers share them freely.
#[derive(Default)]
pub struct ReferenceCache {
    trades: Mutex<HashMap<(PathBuf, u64), (SourceKey, Arc<TradeTable>)>>,
    countries: Mutex<HashMap<PathBuf, (SourceKey, Arc<CountryTable>)>>,
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache.
    pub fn shared() -> &'static ReferenceCache {
        &SHARED
    }

    pub fn trade_data(
        &self,
        path: impl AsRef<Path>,
        classifier: &CategoryClassifier,
    ) -> Result<Arc<TradeTable>> {
        let path = path.as_ref();
        let key = SourceKey::of(path).map_err(|e| load_error(path, e))?;
        let slot = (key.path.clone(), classifier.fingerprint());
        get_or_load(&self.trades, slot, key, || load_trade_data(path, classifier))
    }

    pub fn country_data(&self, path: impl AsRef<Path>) -> Result<Arc<CountryTable>> {
        let path = path.as_ref();
        let key = SourceKey::of(path).map_err(|e| load_error(path, e))?;
        get_or_load(&self.countries, key.path.clone(), key, || load_country_data(path))
    }

    /// Drop every cached table.
    pub fn clear(&self) {
        lock(&self.trades).clear();
        lock(&self.countries).clear();
    }
}

fn get_or_load<S: Eq + Hash, T>(
    slots: &Mutex<HashMap<S, (SourceKey, Arc<T>)>>,
    slot: S,
    key: SourceKey,
    load: impl FnOnce() -> Result<T>,
) -> Result<Arc<T>> {
    let mut slots = lock(slots);
    if let Some((cached_key, table)) = slots.get(&slot) {
        if *cached_key == key {
            debug!(path = %key.path.display(), "reference cache hit");
            return Ok(Arc::clone(table));
        }
    }
    let table = Arc::new(load()?);
    slots.insert(slot, (key, Arc::clone(&table)));
    Ok(table)
}

/// Lock, recovering the guard if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
