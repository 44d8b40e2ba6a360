//! Generational handle registry for engine-side values.
//!
//! Every engine pointer the host holds on to is wrapped in a [`HandleId`]:
//! a slot index plus a generation counter. Releasing a slot bumps its
//! generation, so a stale token can never alias a value that reuses the
//! slot. The registry is sharded; each shard has its own lock and free
//! list, and a token's index encodes which shard owns it.

use std::ffi::c_void;
use std::fmt;
use std::panic::Location;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use parking_lot::RwLock;
use thiserror::Error;

use rift_sys::api::EngineApi;
use rift_sys::types::{RawObject, RawVariant};

/// Slot index reserved for the null handle.
pub const NULL_INDEX: u32 = u32::MAX;

// ============================================================================
// Handle Tokens
// ============================================================================

/// Opaque token for an engine-side value.
///
/// Tokens are plain data: copying one copies a claim ticket, not the
/// value. All validity checking happens at [`resolve`] time.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId {
    index: u32,
    generation: u32,
}

impl HandleId {
    /// The null token. Resolving it fails with [`HandleError::Null`].
    pub const NULL: HandleId = HandleId {
        index: NULL_INDEX,
        generation: 0,
    };

    #[inline]
    pub const fn is_null(self) -> bool {
        self.index == NULL_INDEX
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Packs the token into 64 bits: generation in the high half, index in
    /// the low half. Stable across the process, suitable for FFI transport.
    #[inline]
    pub const fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }

    /// Rebuilds a token from [`Self::to_bits`] output.
    ///
    /// Arbitrary bit patterns are accepted; a token that never came from
    /// `to_bits` simply fails to resolve.
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        HandleId {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Debug for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "HandleId(null)")
        } else {
            write!(f, "HandleId({}v{})", self.index, self.generation)
        }
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::NULL
    }
}

// ============================================================================
// Ownership Vocabulary
// ============================================================================

/// How the host's claim on a value is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnershipKind {
    /// The engine reference-counts the value. Release decrements the
    /// count; the engine destroys the value when it reaches zero.
    RefCounted,
    /// The engine owns the value outright (scene members, singletons,
    /// borrowed views). Release frees the slot and nothing else.
    SceneOwned,
    /// The host owns an engine-allocated variant box. Release destroys
    /// the box.
    ValueOwned,
    /// Frame-scratch variant box. Individual release destroys it;
    /// whatever is still live gets destroyed in bulk by [`cycle`].
    Transient,
}

/// Ownership of a value coming back from an engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnOwnership {
    /// The engine transferred its reference to the caller.
    Owned,
    /// The engine keeps ownership; the caller must take its own claim.
    Borrowed,
    /// Engine scratch, valid until the next [`cycle`].
    Transient,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, Error)]
pub enum HandleError {
    #[error("handle is null")]
    Null,

    #[error("stale handle {index}v{generation}: slot is now at generation {current}")]
    Stale {
        index: u32,
        generation: u32,
        current: u32,
    },

    #[error("handle {index}v{generation} is out of bounds")]
    OutOfBounds { index: u32, generation: u32 },
}

// ============================================================================
// Registry
// ============================================================================

const DEFAULT_SHARD_COUNT: usize = 16;
const DEFAULT_SHARD_CAPACITY: usize = 256;
const MAX_SHARD_COUNT: usize = 256;

struct Slot {
    payload: usize,
    generation: u32,
    kind: OwnershipKind,
    live: bool,
    released_at: Option<&'static Location<'static>>,
}

struct ShardInner {
    slots: Vec<Slot>,
    free: Vec<u32>,
    /// Live transient slots, as (local index, generation) pairs.
    scratch: Vec<(u32, u32)>,
}

struct Shard {
    inner: RwLock<ShardInner>,
}

/// Sharded generational registry mapping tokens to raw engine pointers.
pub struct HandleRegistry {
    shards: Vec<Shard>,
    shard_bits: u32,
    next_shard: AtomicUsize,
    strict: bool,
}

impl HandleRegistry {
    /// Creates a registry with `shard_count` shards (rounded up to a power
    /// of two) of `shard_capacity` preallocated slots each.
    ///
    /// With `strict` set, resolving a stale token panics instead of
    /// returning an error; useful while hunting lifetime bugs.
    pub fn new(shard_count: usize, shard_capacity: usize, strict: bool) -> Self {
        let shard_count = shard_count.clamp(1, MAX_SHARD_COUNT).next_power_of_two();
        let shard_bits = shard_count.trailing_zeros();
        let shards = (0..shard_count)
            .map(|_| Shard {
                inner: RwLock::new(ShardInner {
                    slots: Vec::with_capacity(shard_capacity),
                    free: Vec::new(),
                    scratch: Vec::new(),
                }),
            })
            .collect();
        Self {
            shards,
            shard_bits,
            next_shard: AtomicUsize::new(0),
            strict,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_SHARD_COUNT, DEFAULT_SHARD_CAPACITY, false)
    }

    /// Number of shards, after clamping and rounding.
    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    #[inline]
    fn split_index(&self, index: u32) -> (usize, u32) {
        let shard = (index as usize) & (self.shard_count() - 1);
        (shard, index >> self.shard_bits)
    }

    /// Registers a claim on `payload` and returns a fresh token.
    ///
    /// The token is distinct from every token previously produced for
    /// this slot; slot reuse bumps the generation.
    pub fn acquire(&self, kind: OwnershipKind, payload: *mut c_void) -> HandleId {
        let shard_id = self.next_shard.fetch_add(1, Ordering::Relaxed) & (self.shard_count() - 1);
        let mut guard = self.shards[shard_id].inner.write();
        let inner = &mut *guard;

        let local = match inner.free.pop() {
            Some(local) => local,
            None => {
                let local = inner.slots.len() as u32;
                // One index pattern per shard is reserved for NULL.
                if local >= (u32::MAX >> self.shard_bits) {
                    panic!("handle registry exhausted ({} slots)", self.capacity());
                }
                inner.slots.push(Slot {
                    payload: 0,
                    generation: 0,
                    kind,
                    live: false,
                    released_at: None,
                });
                local
            }
        };

        let slot = &mut inner.slots[local as usize];
        slot.payload = payload as usize;
        slot.kind = kind;
        slot.live = true;
        slot.released_at = None;
        let generation = slot.generation;

        let index = (local << self.shard_bits) | shard_id as u32;
        if matches!(kind, OwnershipKind::Transient) {
            inner.scratch.push((local, generation));
        }
        HandleId { index, generation }
    }

    /// Looks up the payload behind a token.
    pub fn resolve(&self, id: HandleId) -> Result<*mut c_void, HandleError> {
        if id.is_null() {
            return Err(HandleError::Null);
        }
        let (shard_id, local) = self.split_index(id.index);
        let inner = self.shards[shard_id].inner.read();
        match inner.slots.get(local as usize) {
            Some(slot) if slot.live && slot.generation == id.generation => {
                Ok(slot.payload as *mut c_void)
            }
            Some(slot) => {
                self.report_stale(id, slot);
                Err(HandleError::Stale {
                    index: id.index,
                    generation: id.generation,
                    current: slot.generation,
                })
            }
            None => Err(HandleError::OutOfBounds {
                index: id.index,
                generation: id.generation,
            }),
        }
    }

    /// Whether a token currently resolves. Unlike [`Self::resolve`],
    /// a stale token here is an answer, not misuse: nothing is logged
    /// and strict mode stays quiet.
    pub fn is_live(&self, id: HandleId) -> bool {
        if id.is_null() {
            return false;
        }
        let (shard_id, local) = self.split_index(id.index);
        let inner = self.shards[shard_id].inner.read();
        matches!(
            inner.slots.get(local as usize),
            Some(slot) if slot.live && slot.generation == id.generation
        )
    }

    fn report_stale(&self, id: HandleId, slot: &Slot) {
        match slot.released_at {
            Some(site) => log::error!("Use of stale handle {id:?}, released at {site}"),
            None => log::error!("Use of stale handle {id:?}"),
        }
        if self.strict {
            panic!("use of stale handle {id:?}");
        }
    }

    /// Drops the claim behind a token and runs the release action for its
    /// ownership kind. Releasing the null token is a no-op.
    #[track_caller]
    pub fn release(&self, id: HandleId) -> Result<(), HandleError> {
        let (payload, kind) = match self.retire(id, Some(Location::caller()))? {
            Some(entry) => entry,
            None => return Ok(()),
        };
        self.engine_release(kind, payload);
        Ok(())
    }

    /// Drops the claim behind a token and hands the payload back without
    /// running any release action. Used when ownership moves back to the
    /// engine.
    #[track_caller]
    pub fn take(&self, id: HandleId) -> Result<*mut c_void, HandleError> {
        match self.retire(id, Some(Location::caller()))? {
            Some((payload, _)) => Ok(payload as *mut c_void),
            None => Err(HandleError::Null),
        }
    }

    /// Frees the slot behind `id`. Returns the payload and kind, or `None`
    /// for the null token. The engine is not touched.
    fn retire(
        &self,
        id: HandleId,
        site: Option<&'static Location<'static>>,
    ) -> Result<Option<(usize, OwnershipKind)>, HandleError> {
        if id.is_null() {
            return Ok(None);
        }
        let (shard_id, local) = self.split_index(id.index);
        let mut guard = self.shards[shard_id].inner.write();
        let inner = &mut *guard;
        match inner.slots.get_mut(local as usize) {
            Some(slot) if slot.live && slot.generation == id.generation => {
                slot.live = false;
                slot.generation = slot.generation.wrapping_add(1);
                slot.released_at = site;
                let out = (slot.payload, slot.kind);
                inner.free.push(local);
                Ok(Some(out))
            }
            Some(slot) => {
                self.report_stale(id, slot);
                Err(HandleError::Stale {
                    index: id.index,
                    generation: id.generation,
                    current: slot.generation,
                })
            }
            None => Err(HandleError::OutOfBounds {
                index: id.index,
                generation: id.generation,
            }),
        }
    }

    // Engine calls happen after the shard lock is dropped: the engine may
    // re-enter the binding (destructor notifications) and land back here.
    fn engine_release(&self, kind: OwnershipKind, payload: usize) {
        match kind {
            OwnershipKind::SceneOwned => {}
            OwnershipKind::RefCounted => {
                let api = EngineApi::get();
                // Safety: the payload was a live object pointer when the
                // claim was taken; the claim kept it alive until now.
                unsafe {
                    (api.ref_dec)(payload as *mut RawObject);
                }
            }
            OwnershipKind::ValueOwned | OwnershipKind::Transient => {
                let api = EngineApi::get();
                // Safety: as above, for a variant box.
                unsafe { (api.variant_destroy)(payload as *mut RawVariant) };
            }
        }
    }

    /// Invalidates and destroys every live transient slot.
    ///
    /// The host calls this once per frame, after engine callbacks for the
    /// frame have run. Returns the number of values destroyed.
    pub fn cycle(&self) -> usize {
        let mut doomed = Vec::new();
        for shard in &self.shards {
            let mut guard = shard.inner.write();
            let inner = &mut *guard;
            let scratch = std::mem::take(&mut inner.scratch);
            for (local, generation) in scratch {
                let Some(slot) = inner.slots.get_mut(local as usize) else {
                    continue;
                };
                // Individually released slots have moved on already.
                if !slot.live
                    || slot.generation != generation
                    || !matches!(slot.kind, OwnershipKind::Transient)
                {
                    continue;
                }
                slot.live = false;
                slot.generation = slot.generation.wrapping_add(1);
                slot.released_at = None;
                doomed.push(slot.payload);
                inner.free.push(local);
            }
        }
        let count = doomed.len();
        if count > 0 {
            let api = EngineApi::get();
            for payload in doomed {
                // Safety: each payload was a live transient variant box.
                unsafe { (api.variant_destroy)(payload as *mut RawVariant) };
            }
            log::trace!("Cycle destroyed {count} transient values");
        }
        count
    }

    /// Number of live claims across all shards.
    pub fn live_count(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.inner.read().slots.iter().filter(|slot| slot.live).count())
            .sum()
    }

    /// Total slot capacity across all shards, live or free.
    pub fn capacity(&self) -> usize {
        self.shards.iter().map(|s| s.inner.read().slots.len()).sum()
    }
}

// ============================================================================
// Process-Wide Registry
// ============================================================================

static GLOBAL: OnceLock<HandleRegistry> = OnceLock::new();

/// The process-wide registry. Created with default dimensions on first
/// use unless [`configure`] ran earlier.
pub fn global() -> &'static HandleRegistry {
    GLOBAL.get_or_init(HandleRegistry::with_defaults)
}

/// Installs a configured registry. Returns `false` if the registry was
/// already in use, in which case the existing one stays.
pub(crate) fn configure(registry: HandleRegistry) -> bool {
    GLOBAL.set(registry).is_ok()
}

/// See [`HandleRegistry::acquire`].
pub fn acquire(kind: OwnershipKind, payload: *mut c_void) -> HandleId {
    global().acquire(kind, payload)
}

/// See [`HandleRegistry::resolve`].
pub fn resolve(id: HandleId) -> Result<*mut c_void, HandleError> {
    global().resolve(id)
}

/// See [`HandleRegistry::is_live`].
pub fn is_live(id: HandleId) -> bool {
    global().is_live(id)
}

/// See [`HandleRegistry::release`].
#[track_caller]
pub fn release(id: HandleId) -> Result<(), HandleError> {
    global().release(id)
}

/// See [`HandleRegistry::take`].
#[track_caller]
pub fn take(id: HandleId) -> Result<*mut c_void, HandleError> {
    global().take(id)
}

/// See [`HandleRegistry::cycle`].
pub fn cycle() -> usize {
    global().cycle()
}
