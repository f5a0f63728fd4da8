//! Store registry for the HTTP front.
//!
//! Slides live as files in one directory and are addressed by file name.
//! Each slide is opened once, on first access, and its store kept in an LRU;
//! an evicted store closes when the last request holding it finishes.
//! Opening happens outside the LRU lock, and concurrent requests for the same
//! slide wait on a single open.
//!
//! All methods block. Handlers call them from `spawn_blocking`.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use lru::LruCache;
use tracing::{debug, info};

use crate::error::{GateError, IoError, RegistryError};
use crate::reader::{detect, has_accepted_suffix, Source};
use crate::store::{ChunkStore, StoreOptions};

/// Default number of open stores
pub const DEFAULT_STORE_CAPACITY: usize = 32;

type OpenResult = Result<Arc<ChunkStore>, RegistryError>;

/// Opens and caches one [`ChunkStore`] per slide file.
pub struct StoreRegistry {
    root: PathBuf,
    options: StoreOptions,
    stores: Mutex<LruCache<String, Arc<ChunkStore>>>,

    /// Opens in progress; the first caller runs the open, later ones wait
    in_flight: Mutex<HashMap<String, Arc<OnceLock<OpenResult>>>>,
}

impl StoreRegistry {
    /// Create a registry over the slides in `root`.
    ///
    /// A `capacity` of zero is treated as one.
    pub fn new(root: impl Into<PathBuf>, options: StoreOptions, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            root: root.into(),
            options,
            stores: Mutex::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Number of open stores.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Arc<ChunkStore>>> {
        self.stores.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<String, Arc<OnceLock<OpenResult>>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Map a slide id to its file, refusing anything outside the root.
    pub fn resolve(&self, slide_id: &str) -> Result<PathBuf, RegistryError> {
        let valid = !slide_id.is_empty()
            && !slide_id.starts_with('.')
            && !slide_id.contains(['/', '\\'])
            && has_accepted_suffix(Path::new(slide_id));
        if !valid {
            return Err(RegistryError::InvalidSlideId(slide_id.to_string()));
        }
        Ok(self.root.join(slide_id))
    }

    /// Store for `slide_id`, opening it on first access.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::SlideNotFound`] if the file is missing or
    /// is not a pyramidal slide this crate reads.
    pub fn get(&self, slide_id: &str) -> Result<Arc<ChunkStore>, RegistryError> {
        let path = self.resolve(slide_id)?;

        // Fast path: already open
        if let Some(store) = self.lock().get(slide_id) {
            return Ok(Arc::clone(store));
        }

        // Slow path: join an open in progress or start one
        let cell = Arc::clone(
            self.lock_in_flight()
                .entry(slide_id.to_string())
                .or_default(),
        );
        let result = cell
            .get_or_init(|| self.open_and_insert(slide_id, &path))
            .clone();

        {
            let mut in_flight = self.lock_in_flight();
            if in_flight
                .get(slide_id)
                .is_some_and(|current| Arc::ptr_eq(current, &cell))
            {
                in_flight.remove(slide_id);
            }
        }

        result
    }

    /// Gate and open `path` without holding the LRU lock, then cache it.
    fn open_and_insert(&self, slide_id: &str, path: &Path) -> OpenResult {
        // A previous open may have finished between the fast path and now
        if let Some(store) = self.lock().get(slide_id) {
            return Ok(Arc::clone(store));
        }

        let accepted = match detect(&Source::Path(path.to_path_buf())) {
            Ok(found) => found.is_some(),
            Err(GateError::Io(IoError::NotFound(_))) => {
                return Err(RegistryError::SlideNotFound(slide_id.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        if !accepted {
            return Err(RegistryError::SlideNotFound(slide_id.to_string()));
        }

        let store = Arc::new(ChunkStore::open(path, self.options.clone())?);

        let mut stores = self.lock();
        if let Some(existing) = stores.get(slide_id) {
            return Ok(Arc::clone(existing));
        }
        if let Some((evicted, _)) = stores.push(slide_id.to_string(), Arc::clone(&store)) {
            debug!(slide = %evicted, "evicted store");
        }
        info!(slide = slide_id, levels = store.level_count(), "opened slide");

        Ok(store)
    }

    /// File names in the root that the format gate accepts, sorted.
    pub fn list(&self) -> Result<Vec<String>, RegistryError> {
        let display = self.root.display().to_string();
        let entries = fs::read_dir(&self.root).map_err(|e| IoError::from_std(display.clone(), &e))?;

        let mut slides = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| IoError::from_std(display.clone(), &e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.resolve(&name).is_err() {
                continue;
            }
            match detect(&Source::Path(entry.path())) {
                Ok(Some(_)) => slides.push(name),
                Ok(None) => {}
                Err(err) => debug!(slide = %name, error = %err, "skipping unreadable file"),
            }
        }

        slides.sort();
        Ok(slides)
    }

    /// Close and forget every open store.
    pub fn clear(&self) {
        let mut stores = self.lock();
        for (_, store) in stores.iter() {
            store.close();
        }
        stores.clear();
    }
}

impl fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("root", &self.root)
            .field("options", &self.options)
            .field("open", &self.len())
            .finish()
    }
}
