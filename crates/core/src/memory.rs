use std::{fmt, ptr::NonNull, sync::Arc};

use crate::buffer::BufferLease;

/// Storage owned by an external runtime that a pipeline can borrow.
///
/// # Safety
/// `data_ptr` must point to `len` contiguous bytes that stay valid for reads
/// and writes, at the same address, for as long as `self` is alive.
pub unsafe trait ExternalBacking: Send + Sync {
    /// Base address of the storage.
    fn data_ptr(&self) -> NonNull<u8>;
    /// Length of the storage in bytes.
    fn len(&self) -> usize;
    /// Whether the storage is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pin that keeps externally managed storage alive.
///
/// A job holds one pin per buffer from enqueue until its completion callback
/// has returned; dropping the last clone releases the storage to its owner.
///
/// # Example
/// ```rust
/// use essence_core::prelude::{HostBuffer, KeepAlive};
///
/// let pin = KeepAlive::new(HostBuffer::new(16));
/// let extra = pin.clone();
/// assert_eq!(pin.holders(), 2);
/// drop(extra);
/// assert_eq!(pin.holders(), 1);
/// ```
#[derive(Clone)]
pub struct KeepAlive(Arc<dyn ExternalBacking>);

impl KeepAlive {
    /// Pin a backing.
    pub fn new(backing: impl ExternalBacking + 'static) -> Self {
        Self(Arc::new(backing))
    }

    /// Pin an already shared backing.
    pub fn from_arc(backing: Arc<dyn ExternalBacking>) -> Self {
        Self(backing)
    }

    /// Number of live pins on the storage.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Length of the pinned storage.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the pinned storage is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for KeepAlive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeepAlive")
            .field("len", &self.len())
            .field("holders", &self.holders())
            .finish()
    }
}

/// Heap storage standing in for runtime-allocated buffers.
///
/// # Example
/// ```rust
/// use essence_core::prelude::{HostBuffer, KeepAlive, Memory};
///
/// let pin = KeepAlive::new(HostBuffer::from_vec(vec![1, 2, 3]));
/// let view = Memory::pinned(pin);
/// assert_eq!(view.as_slice(), &[1, 2, 3]);
/// ```
pub struct HostBuffer {
    ptr: NonNull<u8>,
    len: usize,
}

impl HostBuffer {
    /// Zero-filled buffer of `len` bytes.
    pub fn new(len: usize) -> Self {
        Self::from_vec(vec![0; len])
    }

    /// Take ownership of existing bytes.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let boxed = data.into_boxed_slice();
        let len = boxed.len();
        let raw = Box::into_raw(boxed) as *mut u8;
        Self {
            // `Box::into_raw` never returns null.
            ptr: NonNull::new(raw).unwrap_or(NonNull::dangling()),
            len,
        }
    }
}

impl Drop for HostBuffer {
    fn drop(&mut self) {
        let slice = std::ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), self.len);
        unsafe { drop(Box::from_raw(slice)) };
    }
}

// SAFETY: the allocation is uniquely owned and freed only on drop.
unsafe impl Send for HostBuffer {}
unsafe impl Sync for HostBuffer {}

unsafe impl ExternalBacking for HostBuffer {
    fn data_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    fn len(&self) -> usize {
        self.len
    }
}

enum Storage {
    Raw,
    Pinned(KeepAlive),
    Owned(Vec<u8>),
    Leased(BufferLease),
}

/// Pointer and length window onto frame storage.
///
/// A view never owns the bytes it points at unless created as scratch with
/// [`Memory::make_new`] or [`Memory::from_lease`]. Multiple views may alias
/// the same storage; whoever schedules jobs guarantees that a view being
/// written is not read or written through another view at the same time.
///
/// # Example
/// ```rust
/// use essence_core::prelude::Memory;
///
/// let mut scratch = Memory::make_new(4);
/// scratch.as_mut_slice().copy_from_slice(&[9, 8, 7, 6]);
/// assert!(scratch.is_owned());
/// assert_eq!(scratch.as_slice()[0], 9);
/// ```
pub struct Memory {
    ptr: NonNull<u8>,
    len: usize,
    storage: Storage,
}

// SAFETY: a view is handed between threads as part of a job; the pipeline
// guarantees a single thread touches its bytes at a time.
unsafe impl Send for Memory {}
unsafe impl Sync for Memory {}

impl Memory {
    /// View the whole of a pinned buffer; the pin lives as long as the view.
    pub fn pinned(pin: KeepAlive) -> Self {
        let (ptr, len) = (pin.0.data_ptr(), pin.len());
        Self {
            ptr,
            len,
            storage: Storage::Pinned(pin),
        }
    }

    /// View `len` bytes of a pinned buffer starting at `offset`.
    ///
    /// Returns `None` if the range falls outside the pinned storage.
    pub fn pinned_range(pin: KeepAlive, offset: usize, len: usize) -> Option<Self> {
        let end = offset.checked_add(len)?;
        if end > pin.len() {
            return None;
        }
        // SAFETY: offset + len is inside the pinned allocation.
        let ptr = unsafe { NonNull::new_unchecked(pin.0.data_ptr().as_ptr().add(offset)) };
        Some(Self {
            ptr,
            len,
            storage: Storage::Pinned(pin),
        })
    }

    /// Unpinned view over raw storage.
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes of `len` bytes for the whole
    /// lifetime of the view, including while a job carrying it is in flight.
    pub unsafe fn from_raw_parts(ptr: NonNull<u8>, len: usize) -> Self {
        Self {
            ptr,
            len,
            storage: Storage::Raw,
        }
    }

    /// Scratch storage of `len` zeroed bytes owned by the view.
    pub fn make_new(len: usize) -> Self {
        Self::owning(Storage::Owned(vec![0u8; len]), len)
    }

    /// Scratch storage leased from a pool; returned to the pool on drop.
    pub fn from_lease(lease: BufferLease) -> Self {
        let len = lease.len();
        Self::owning(Storage::Leased(lease), len)
    }

    /// Point the view at storage it owns, once that storage is in place.
    fn owning(storage: Storage, len: usize) -> Self {
        let mut view = Self {
            ptr: NonNull::dangling(),
            len,
            storage,
        };
        let data = match &mut view.storage {
            Storage::Owned(bytes) => NonNull::new(bytes.as_mut_ptr()),
            Storage::Leased(lease) => NonNull::new(lease.as_mut_slice().as_mut_ptr()),
            Storage::Raw | Storage::Pinned(_) => None,
        };
        if let Some(ptr) = data {
            view.ptr = ptr;
        }
        view
    }

    /// Declared length of the window.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the view owns its storage.
    pub fn is_owned(&self) -> bool {
        matches!(self.storage, Storage::Owned(_) | Storage::Leased(_))
    }

    /// Pin carried by the view, if any.
    pub fn keep_alive(&self) -> Option<&KeepAlive> {
        match &self.storage {
            Storage::Pinned(pin) => Some(pin),
            _ => None,
        }
    }

    /// Borrow the bytes.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr/len describe live storage per the constructor contracts.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Borrow the bytes mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above; `&mut self` excludes other borrows of this view.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.storage {
            Storage::Raw => "raw",
            Storage::Pinned(_) => "pinned",
            Storage::Owned(_) => "owned",
            Storage::Leased(_) => "leased",
        };
        f.debug_struct("Memory")
            .field("len", &self.len)
            .field("storage", &kind)
            .finish()
    }
}
