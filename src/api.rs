//! Handle-based boundary surface.
//!
//! A process-wide registry maps integer handles to emulator instances, all
//! sharing one process-wide [`RequestLoader`]. This is the surface a host
//! shim (e.g. a C ABI or FFI layer) marshals buffers through: the flow is
//! `load_dataset` / `slice_dataset_by_time` once, then any number of
//! `init_cache_emu` / `step` / `update_cache` conversations against the
//! returned handles.
//!
//! The dataset freezes at the first `init_cache_emu`: emulators borrow the
//! loader read-only, so later mutation attempts fail with
//! [`EmuError::LoaderFrozen`]. A handle that does not name a live emulator
//! fails with [`EmuError::InvalidHandle`]. The host treats both as fatal;
//! nothing here is retried.
//!
//! Buffer-returning operations hand out owned `Vec`s: the copy out of the
//! emulator happens at this boundary, so the result stays valid regardless
//! of later calls.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{EmuMode, EmulatorConfig, OgdKind};
use crate::emulator::{CacheEmu, StepResult};
use crate::error::EmuError;
use crate::trace::{Content, RequestLoader, Timestamp};

/// Registry index naming an emulator instance.
pub type Handle = usize;

struct Registry {
    /// Loader under construction; `None` once frozen (or never loaded).
    building: Option<RequestLoader>,
    /// Frozen loader shared by every emulator.
    shared: Option<Arc<RequestLoader>>,
    emus: Vec<CacheEmu>,
}

impl Registry {
    const fn new() -> Self {
        Registry {
            building: None,
            shared: None,
            emus: Vec::new(),
        }
    }
}

static REGISTRY: Mutex<Registry> = Mutex::new(Registry::new());

fn with_emu<T>(handle: Handle, f: impl FnOnce(&mut CacheEmu) -> T) -> Result<T, EmuError> {
    let mut reg = REGISTRY.lock();
    let emu = reg
        .emus
        .get_mut(handle)
        .ok_or(EmuError::InvalidHandle(handle))?;
    Ok(f(emu))
}

/// Appends requests to the process-wide dataset.
pub fn load_dataset(content_ids: &[Content], timestamps: &[Timestamp]) -> Result<(), EmuError> {
    let mut reg = REGISTRY.lock();
    if reg.shared.is_some() {
        return Err(EmuError::LoaderFrozen);
    }
    reg.building
        .get_or_insert_with(RequestLoader::new)
        .load_dataset(content_ids, timestamps);
    Ok(())
}

/// Cuts the process-wide dataset into time-slices; returns their number.
pub fn slice_dataset_by_time(
    t_begin: Timestamp,
    t_end: Timestamp,
    t_interval: Timestamp,
) -> Result<usize, EmuError> {
    let mut reg = REGISTRY.lock();
    if reg.shared.is_some() {
        return Err(EmuError::LoaderFrozen);
    }
    Ok(reg
        .building
        .get_or_insert_with(RequestLoader::new)
        .slice_by_time(t_begin, t_end, t_interval))
}

/// Creates an emulator over the process-wide dataset and returns its
/// handle. The first call freezes the dataset.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn init_cache_emu(capacity: usize, passive_mode: bool) -> Result<Handle, EmuError> {
    let capacity = core::num::NonZeroUsize::new(capacity).expect("cache capacity must be non-zero");

    let mut reg = REGISTRY.lock();
    if reg.shared.is_none() {
        let loader = reg.building.take().unwrap_or_default();
        reg.shared = Some(Arc::new(loader));
    }
    let loader = Arc::clone(reg.shared.as_ref().expect("loader frozen above"));

    let mode = if passive_mode {
        EmuMode::Passive
    } else {
        EmuMode::Active
    };
    let handle = reg.emus.len();
    reg.emus
        .push(CacheEmu::init(EmulatorConfig { capacity, mode }, loader));

    tracing::debug!(handle, %mode, capacity = capacity.get(), "init_cache_emu");
    Ok(handle)
}

/// Resets the emulator (installed extractors are kept).
pub fn reset(handle: Handle) -> Result<(), EmuError> {
    with_emu(handle, |e| e.reset())
}

/// Processes the emulator's next batch of requests.
pub fn step(handle: Handle) -> Result<StepResult, EmuError> {
    with_emu(handle, |e| e.step())?
}

/// Current cache occupancy in slot order.
pub fn get_cache_contents(handle: Handle) -> Result<Vec<Content>, EmuError> {
    with_emu(handle, |e| e.cache_contents().to_vec())
}

/// Candidates of the last step: cache contents, then its misses.
pub fn get_candidates(handle: Handle) -> Result<Vec<Content>, EmuError> {
    with_emu(handle, |e| e.candidates().to_vec())
}

/// Hit-test counts of the last step, one per candidate.
pub fn get_candidate_frequencies(handle: Handle) -> Result<Vec<f32>, EmuError> {
    with_emu(handle, |e| e.candidate_frequencies().to_vec())
}

/// Requests processed by the last step, in order.
pub fn get_step_elements(handle: Handle) -> Result<Vec<Content>, EmuError> {
    with_emu(handle, |e| e.step_elements().to_vec())
}

/// Number of requests processed by the last step.
pub fn get_num_step_elements(handle: Handle) -> Result<usize, EmuError> {
    with_emu(handle, |e| e.step_elements().len())
}

/// Rewrites the emulator's cache occupancy.
pub fn update_cache(handle: Handle, new_contents: &[Content]) -> Result<(), EmuError> {
    with_emu(handle, |e| e.update_cache(new_contents))
}

/// Installs the classic feature set: OGD-LFU, OGD-LRU, and/or OGD-Optimal.
pub fn setup_traditional_feature_types(
    handle: Handle,
    use_lfu_feature: bool,
    use_lru_feature: bool,
    use_ogd_opt_feature: bool,
) -> Result<(), EmuError> {
    with_emu(handle, |e| {
        if use_lfu_feature {
            e.use_ogd_feature(OgdKind::Lfu);
        }
        if use_lru_feature {
            e.use_ogd_feature(OgdKind::Lru);
        }
        if use_ogd_opt_feature {
            e.use_ogd_feature(OgdKind::Optimal);
        }
    })
}

/// Installs one sliding-window frequency feature per window length.
pub fn setup_swlfu_feature_types(handle: Handle, window_lens: &[usize]) -> Result<(), EmuError> {
    with_emu(handle, |e| {
        for &len in window_lens {
            e.use_swlfu_feature(len);
        }
    })
}

/// Feature matrix of `content_ids`, flattened row-major.
pub fn get_features(handle: Handle, content_ids: &[Content]) -> Result<Vec<f32>, EmuError> {
    with_emu(handle, |e| e.features(content_ids).as_slice().to_vec())
}

/// Whether every time-slice has been stepped through.
pub fn finished(handle: Handle) -> Result<bool, EmuError> {
    with_emu(handle, |e| e.finished())
}

/// Hit rate over every request processed since the last reset.
pub fn get_mean_hit_rate(handle: Handle) -> Result<f32, EmuError> {
    with_emu(handle, |e| e.mean_hit_rate())
}

/// Index of the emulator's current episode.
pub fn get_i_episode(handle: Handle) -> Result<usize, EmuError> {
    with_emu(handle, |e| e.i_episode())
}

/// Closes the current episode and returns its hit rate.
pub fn on_episode_end(handle: Handle) -> Result<f32, EmuError> {
    with_emu(handle, |e| e.on_episode_end())
}

/// Total feature columns installed on the emulator.
pub fn feature_dims(handle: Handle) -> Result<usize, EmuError> {
    with_emu(handle, |e| e.feature_dims())
}
