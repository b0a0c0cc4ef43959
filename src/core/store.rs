use crate::domain::model::{Facets, FilterSelection, Itinerary};
use crate::utils::error::{LoadError, NotFoundError};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Read-only collection of itineraries loaded from one JSON document.
#[derive(Debug, Clone, Default)]
pub struct ItineraryStore {
    itineraries: Vec<Itinerary>,
}

impl ItineraryStore {
    pub fn new(itineraries: Vec<Itinerary>) -> Self {
        Self { itineraries }
    }

    /// 從檔案載入行程集合
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| LoadError::NotFound {
            path: path.display().to_string(),
            source,
        })?;
        let store = Self::from_json_slice(&bytes)?;
        tracing::debug!(
            "Loaded {} itineraries from {}",
            store.len(),
            path.display()
        );
        Ok(store)
    }

    pub fn from_json_str(content: &str) -> Result<Self, LoadError> {
        Self::from_json_slice(content.as_bytes())
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, LoadError> {
        let document: Value = serde_json::from_slice(bytes)
            .map_err(|e| LoadError::malformed(format!("invalid JSON: {}", e)))?;

        let Value::Array(items) = document else {
            return Err(LoadError::malformed(
                "top-level value must be an array of itineraries",
            ));
        };

        let itineraries = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                Itinerary::from_value(item).map_err(|e| match e {
                    LoadError::Malformed { message } => {
                        LoadError::malformed(format!("entry {}: {}", index, message))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { itineraries })
    }

    pub fn itineraries(&self) -> &[Itinerary] {
        &self.itineraries
    }

    pub fn len(&self) -> usize {
        self.itineraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.itineraries.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.itineraries.iter().map(Itinerary::label).collect()
    }

    /// Exact match on the raw identifier.
    pub fn lookup(&self, itinerary_id: &str) -> Result<&Itinerary, NotFoundError> {
        self.itineraries
            .iter()
            .find(|itin| itin.itinerary_id == itinerary_id)
            .ok_or_else(|| NotFoundError {
                id: itinerary_id.to_string(),
            })
    }

    /// Resolve a display label such as `"Itinerary 42"`.
    pub fn lookup_label(&self, label: &str) -> Result<&Itinerary, NotFoundError> {
        self.itineraries
            .iter()
            .find(|itin| itin.label() == label)
            .ok_or_else(|| NotFoundError {
                id: label.strip_prefix("Itinerary ").unwrap_or(label).to_string(),
            })
    }

    pub fn facets(&self) -> Facets {
        let mut facets = Facets::default();
        for itin in &self.itineraries {
            facets
                .passenger_types
                .extend(
                    itin.passenger_types()
                        .filter(|pt| !pt.is_empty())
                        .map(str::to_string),
                );
            if let Some(route) = itin.route() {
                facets.routes.insert(route);
            }
            if let Some(date) = itin.departure_date() {
                facets.departure_dates.insert(date);
            }
        }
        facets
    }

    /// Itineraries matching the selection, in collection order.
    pub fn filter(&self, selection: &FilterSelection) -> Vec<&Itinerary> {
        self.itineraries
            .iter()
            .filter(|itin| selection.matches(itin))
            .collect()
    }
}

struct CachedStore {
    modified: Option<SystemTime>,
    store: Arc<ItineraryStore>,
}

/// Memoizes loaded stores by path and modification time, so a host that
/// re-runs the whole pipeline per interaction only parses the file once.
#[derive(Default)]
pub struct StoreCache {
    entries: Mutex<HashMap<PathBuf, CachedStore>>,
}

impl StoreCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Arc<ItineraryStore>, LoadError> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|source| LoadError::NotFound {
            path: path.display().to_string(),
            source,
        })?;
        let modified = metadata.modified().ok();

        {
            let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(cached) = entries.get(path) {
                if modified.is_some() && cached.modified == modified {
                    tracing::debug!("Using cached itineraries for {}", path.display());
                    return Ok(Arc::clone(&cached.store));
                }
            }
        }

        let store = Arc::new(ItineraryStore::load(path)?);
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.insert(
            path.to_path_buf(),
            CachedStore {
                modified,
                store: Arc::clone(&store),
            },
        );
        Ok(store)
    }

    pub fn invalidate<P: AsRef<Path>>(&self, path: P) {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.remove(path.as_ref());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
