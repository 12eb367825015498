/* STAGING.rs
 *   by Lut99
 *
 * Created:
 *   08 Oct 2022, 10:44:55
 * Last edited:
 *   14 Jan 2023, 15:10:36
 * Auto updated?
 *   Yes
 *
 * Description:
 *   Implements the per-frame temporary host buffer: a linear allocator
 *   on top of a mapped, CPU-visible buffer. Allocations bump an offset;
 *   the whole buffer is copied to its GPU mirror once per frame and the
 *   offset is reset when the slot is next selected for recording.
**/

use ash::vk;
use gpu_allocator::vulkan::Allocation;

pub use crate::errors::RenderSystemError as Error;
use crate::spec::HostBufferSlice;


/***** LIBRARY *****/
/// A per-frame linear allocator on top of a mapped, CPU-visible buffer.
pub struct TmpHostBuffer {
    /// The underlying buffer
    buffer     : vk::Buffer,
    /// The allocation backing the buffer
    allocation : Option<Allocation>,
    /// The mapped pointer to the start of the buffer
    base       : *mut u8,
    /// The capacity of the buffer, in bytes
    capacity   : vk::DeviceSize,
    /// The current bump offset, in bytes
    offset     : vk::DeviceSize,
}

impl TmpHostBuffer {
    /// Constructor for the TmpHostBuffer.
    ///
    /// # Arguments
    /// - `buffer`: The (already created) CPU-visible buffer to allocate from.
    /// - `allocation`: The allocation backing that buffer, if any. Kept so the render system can free it on teardown.
    /// - `base`: The mapped pointer to the start of the buffer.
    /// - `capacity`: The capacity of the buffer, in bytes.
    pub fn new(buffer: vk::Buffer, allocation: Option<Allocation>, base: *mut u8, capacity: vk::DeviceSize) -> Self {
        Self {
            buffer,
            allocation,
            base,
            capacity,
            offset : 0,
        }
    }



    /// Allocates a slice from the buffer by bumping the offset.
    ///
    /// # Arguments
    /// - `size`: The size of the allocation, in bytes.
    /// - `align`: The required alignment of the allocation's device offset and pointer. Zero means no alignment requirement.
    ///
    /// # Returns
    /// A HostBufferSlice with the underlying buffer, the byte offset and the mapped pointer.
    ///
    /// # Errors
    /// This function errors if the capacity would be exceeded; the caller must submit sooner or allocate a bigger buffer.
    pub fn alloc(&mut self, size: vk::DeviceSize, align: vk::DeviceSize) -> Result<HostBufferSlice, Error> {
        // Compute the padding to the next aligned offset
        let ptr = unsafe { self.base.add(self.offset as usize) };
        let padding: vk::DeviceSize = if align > 0 && (ptr as u64) % align != 0 {
            align - (ptr as u64) % align
        } else {
            0
        };

        // Range-check against the capacity
        let offset = self.offset + padding;
        if offset + size > self.capacity {
            return Err(Error::TmpHostBufferExhausted{ requested: size, capacity: self.capacity });
        }

        // Bump the offset and hand the slice out
        self.offset = offset + size;
        Ok(HostBufferSlice {
            buffer : self.buffer,
            offset,
            ptr    : unsafe { self.base.add(offset as usize) },
        })
    }

    /// Resets the bump offset to zero.
    ///
    /// Called when the main thread next selects this frame slot; by then the render thread has copied the contents to the GPU mirror.
    #[inline]
    pub fn reset(&mut self) {
        self.offset = 0;
    }



    /// Returns the underlying buffer.
    #[inline]
    pub fn buffer(&self) -> vk::Buffer { self.buffer }

    /// Returns the current bump offset (i.e., the number of bytes in use).
    #[inline]
    pub fn offset(&self) -> vk::DeviceSize { self.offset }

    /// Returns the capacity of the buffer, in bytes.
    #[inline]
    pub fn capacity(&self) -> vk::DeviceSize { self.capacity }

    /// Takes the backing allocation out, for freeing on teardown.
    #[inline]
    pub fn take_allocation(&mut self) -> Option<Allocation> { self.allocation.take() }
}





/***** TESTS *****/
#[cfg(test)]
mod test {
    use super::*;

    /// Builds a TmpHostBuffer over plain heap memory, so the allocator arithmetic can be tested without a device.
    fn heap_buffer(capacity: usize) -> (TmpHostBuffer, *mut u8) {
        // 16-byte aligned so the alignment tests behave predictably
        let memory: Box<[u128]> = vec![0u128; (capacity + 15) / 16].into_boxed_slice();
        let base = Box::leak(memory).as_mut_ptr().cast::<u8>();
        (TmpHostBuffer::new(vk::Buffer::null(), None, base, capacity as u64), base)
    }


    /// Tests that allocations bump the offset and respect alignment.
    #[test]
    fn test_bump_and_align() {
        let (mut buffer, base) = heap_buffer(1024);

        // First allocation starts at the beginning
        let a = buffer.alloc(10, 0).unwrap();
        assert_eq!(a.offset, 0);
        assert_eq!(a.ptr, base);

        // The next unaligned allocation continues right after
        let b = buffer.alloc(3, 0).unwrap();
        assert_eq!(b.offset, 10);

        // An aligned allocation skips the padding
        let c = buffer.alloc(16, 16).unwrap();
        assert_eq!(c.offset % 16, 0);
        assert!(c.offset >= 13);

        assert_eq!(buffer.offset(), c.offset + 16);
    }

    /// Tests that exceeding the capacity is an error, not a wraparound.
    #[test]
    fn test_overflow() {
        let (mut buffer, _) = heap_buffer(64);

        buffer.alloc(48, 0).unwrap();
        assert!(matches!(buffer.alloc(32, 0), Err(Error::TmpHostBufferExhausted{ .. })));

        // The failed allocation must not have bumped the offset
        assert_eq!(buffer.offset(), 48);
        buffer.alloc(16, 0).unwrap();
    }

    /// Tests that a reset brings the offset back to zero, like when the frame slot comes around again.
    #[test]
    fn test_reset() {
        let (mut buffer, base) = heap_buffer(256);

        buffer.alloc(100, 0).unwrap();
        assert_eq!(buffer.offset(), 100);

        buffer.reset();
        assert_eq!(buffer.offset(), 0);

        // And allocation starts from the beginning again
        let a = buffer.alloc(8, 0).unwrap();
        assert_eq!(a.offset, 0);
        assert_eq!(a.ptr, base);
    }

    /// Tests that the slice writes land where the offset says they do.
    #[test]
    fn test_slice_write() {
        let (mut buffer, base) = heap_buffer(64);

        let slice = buffer.alloc(4, 4).unwrap();
        slice.write_bytes(&[ 0xDE, 0xAD, 0xBE, 0xEF ]);

        let written: &[u8] = unsafe { std::slice::from_raw_parts(base.add(slice.offset as usize), 4) };
        assert_eq!(written, &[ 0xDE, 0xAD, 0xBE, 0xEF ]);
    }
}
