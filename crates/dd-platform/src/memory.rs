//! Aligned heap allocation

use crate::{PlatformError, PlatformResult};
use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// Owned block of heap memory with a caller-chosen alignment
///
/// The block is released when the buffer is dropped.
pub struct AlignedBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
}

// SAFETY: the buffer exclusively owns its allocation; shared access only
// hands out `&[u8]`
unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}

impl AlignedBuffer {
    /// Allocate `size` bytes aligned to `alignment`, zero-filled if `zero`
    ///
    /// `size` must be non-zero and `alignment` a power of two.
    pub fn allocate(size: usize, alignment: usize, zero: bool) -> PlatformResult<Self> {
        if size == 0 {
            return Err(PlatformError::InvalidParameter("allocation size must be non-zero"));
        }
        let layout = Layout::from_size_align(size, alignment).map_err(|_| {
            PlatformError::InvalidParameter("alignment must be a power of two")
        })?;

        // SAFETY: layout has a non-zero size
        let raw = unsafe {
            if zero {
                alloc::alloc_zeroed(layout)
            } else {
                alloc::alloc(layout)
            }
        };
        let ptr = NonNull::new(raw).ok_or(PlatformError::Os {
            op: "aligned allocation",
            source: std::io::Error::from(std::io::ErrorKind::OutOfMemory),
        })?;

        Ok(Self { ptr, layout })
    }

    /// Start of the block
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Mutable start of the block
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.layout.size()
    }

    /// Always false; zero-sized buffers cannot be allocated
    pub fn is_empty(&self) -> bool {
        self.layout.size() == 0
    }

    /// Alignment in bytes
    pub fn alignment(&self) -> usize {
        self.layout.align()
    }

    /// View the block as bytes
    ///
    /// Contents of a buffer allocated without zeroing are unspecified until
    /// written through [`AlignedBuffer::as_mut_slice`].
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for layout.size() bytes for the buffer's lifetime
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }

    /// View the block as mutable bytes
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and &mut self guarantees exclusive access
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        // SAFETY: ptr was returned by alloc/alloc_zeroed with this layout
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

impl std::fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("ptr", &self.ptr)
            .field("len", &self.len())
            .field("alignment", &self.alignment())
            .finish()
    }
}
