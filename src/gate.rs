//! Dependency readiness gate.
//!
//! Each engine resource is loaded at most once per gate. Concurrent callers
//! that find a load in flight await the same shared future instead of
//! starting another one. A load settles its own slot when it finishes, so
//! the outcome sticks even if every caller stopped waiting: success marks
//! the slot ready, failure empties it so the next call retries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};

use crate::error::{Error, LoadError, Result};

/// An external engine resource (script, font, wasm blob, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub url: String,
}

impl Resource {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

/// Resources each engine needs before it can run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineManifest {
    pub text_renderer: Vec<Resource>,
    pub rasterizer: Vec<Resource>,
}

impl EngineManifest {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Options(format!("manifest: {e}")))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    fn required(&self, needs: Needs) -> impl Iterator<Item = &Resource> {
        let raster: &[Resource] = if needs.rasterizer {
            &self.rasterizer
        } else {
            &[]
        };
        self.text_renderer.iter().chain(raster)
    }
}

/// Which engines a call requires. The text renderer is always required.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Needs {
    pub rasterizer: bool,
}

/// Fetches resources into the host environment.
#[async_trait]
pub trait ResourceLoader: Send + Sync {
    /// Whether the host already has this resource (e.g. bundled or injected
    /// by someone else).
    fn is_present(&self, resource: &Resource) -> bool;

    async fn load(&self, resource: &Resource) -> std::result::Result<(), LoadError>;
}

type LoadFuture = Shared<BoxFuture<'static, std::result::Result<(), LoadError>>>;

enum Slot {
    /// `load` tells this load apart from a later one for the same id.
    InFlight { load: u64, fut: LoadFuture },
    Ready,
}

type Slots = Mutex<HashMap<String, Slot>>;

/// Shared between every generation call that uses the same engines.
pub struct ReadinessGate {
    loader: Arc<dyn ResourceLoader>,
    manifest: EngineManifest,
    slots: Arc<Slots>,
    next_load: AtomicU64,
}

impl std::fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("manifest", &self.manifest)
            .finish_non_exhaustive()
    }
}

impl ReadinessGate {
    pub fn new(loader: Arc<dyn ResourceLoader>, manifest: EngineManifest) -> Self {
        Self {
            loader,
            manifest,
            slots: Arc::default(),
            next_load: AtomicU64::new(0),
        }
    }

    pub fn manifest(&self) -> &EngineManifest {
        &self.manifest
    }

    /// Whether the resource `id` has finished loading.
    pub fn is_ready(&self, id: &str) -> bool {
        matches!(lock(&self.slots).get(id), Some(Slot::Ready))
    }

    /// Make sure every resource `needs` calls for is loaded.
    ///
    /// All pending loads run concurrently; the first failure (in manifest
    /// order) is returned once they have all settled.
    pub async fn ensure_ready(&self, needs: Needs) -> Result<()> {
        let pending: Vec<(String, LoadFuture)> = self
            .manifest
            .required(needs)
            .filter_map(|res| self.begin(res).map(|fut| (res.id.clone(), fut)))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }
        log::debug!("Waiting on {} engine resource(s)", pending.len());

        let outcomes = join_all(
            pending
                .into_iter()
                .map(|(id, fut)| async move { (id, fut.await) }),
        )
        .await;

        // Slots were already settled by the loads themselves.
        outcomes
            .into_iter()
            .find_map(|(id, outcome)| outcome.err().map(|source| (id, source)))
            .map_or(Ok(()), |(resource, source)| {
                Err(Error::ResourceLoad { resource, source })
            })
    }

    /// Return the future to wait on for `res`, starting the load if nobody
    /// has yet. `None` means the resource is ready.
    fn begin(&self, res: &Resource) -> Option<LoadFuture> {
        let mut slots = lock(&self.slots);
        match slots.get(&res.id) {
            Some(Slot::Ready) => None,
            Some(Slot::InFlight { fut, .. }) => Some(fut.clone()),
            None if self.loader.is_present(res) => {
                log::debug!("Engine resource {} already present", res.id);
                slots.insert(res.id.clone(), Slot::Ready);
                None
            }
            None => {
                log::info!("Loading engine resource {} from {}", res.id, res.url);
                let load = self.next_load.fetch_add(1, Ordering::Relaxed);
                let loader = Arc::clone(&self.loader);
                let owned = res.clone();
                let slots_ref = Arc::downgrade(&self.slots);
                let fut = async move {
                    let outcome = loader.load(&owned).await;
                    settle(&slots_ref, &owned.id, load, &outcome);
                    outcome
                }
                .boxed()
                .shared();
                slots.insert(
                    res.id.clone(),
                    Slot::InFlight {
                        load,
                        fut: fut.clone(),
                    },
                );
                Some(fut)
            }
        }
    }
}

fn lock(slots: &Slots) -> MutexGuard<'_, HashMap<String, Slot>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Record the outcome of load number `load` of `id`, unless the slot has
/// moved on to another load since.
fn settle(
    slots: &Weak<Slots>,
    id: &str,
    load: u64,
    outcome: &std::result::Result<(), LoadError>,
) {
    let Some(slots) = slots.upgrade() else {
        return;
    };
    let mut slots = lock(&slots);
    if !matches!(slots.get(id), Some(Slot::InFlight { load: current, .. }) if *current == load) {
        return;
    }
    match outcome {
        Ok(()) => {
            slots.insert(id.to_string(), Slot::Ready);
        }
        Err(e) => {
            log::warn!("Engine resource {id} failed to load: {e}");
            slots.remove(id);
        }
    }
}
