/* SPEC.rs
 *   by Lut99
 *
 * Created:
 *   08 Oct 2022, 10:30:09
 * Last edited:
 *   14 Jan 2023, 15:06:11
 * Auto updated?
 *   Yes
 *
 * Description:
 *   Defines the buffer/image handle types the render system hands out,
 *   plus the per-frame upload queues.
**/

use std::mem;

use ash::vk;
use gpu_allocator::vulkan::Allocation;

use sail_thr::spec::{BufferCopy, BufferImageCopy};


/***** LIBRARY *****/
/// A slice of the current frame's temporary host buffer.
///
/// The memory behind `ptr` stays writable until the render thread has consumed the frame; the (buffer, offset) pair is what goes into copy regions and descriptor writes.
#[derive(Clone, Copy, Debug)]
pub struct HostBufferSlice {
    /// The underlying buffer
    pub buffer : vk::Buffer,
    /// The offset of this slice in the buffer
    pub offset : vk::DeviceSize,
    /// The mapped pointer to the start of this slice
    pub ptr    : *mut u8,
}

impl HostBufferSlice {
    /// Copies the given value into the slice.
    ///
    /// The caller is responsible for having allocated the slice large (and aligned) enough for `T`.
    #[inline]
    pub fn write<T: Copy>(&self, value: &T) {
        unsafe { std::ptr::copy_nonoverlapping((value as *const T).cast::<u8>(), self.ptr, mem::size_of::<T>()); }
    }

    /// Copies the given bytes into the slice.
    ///
    /// The caller is responsible for having allocated the slice large enough.
    #[inline]
    pub fn write_bytes(&self, data: &[u8]) {
        unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), self.ptr, data.len()); }
    }
}



/// A persistent, CPU-visible buffer.
#[derive(Debug)]
pub struct HostBuffer {
    /// The buffer itself
    pub buffer     : vk::Buffer,
    /// The allocation backing the buffer
    pub allocation : Option<Allocation>,
    /// The mapped pointer to the buffer's memory
    pub ptr        : *mut u8,
    /// The size of the buffer, in bytes
    pub capacity   : vk::DeviceSize,
}

/// A persistent, device-local buffer.
#[derive(Debug)]
pub struct GpuBuffer {
    /// The buffer itself
    pub buffer     : vk::Buffer,
    /// The allocation backing the buffer
    pub allocation : Option<Allocation>,
}

/// A persistent, device-local image.
#[derive(Debug)]
pub struct GpuImage {
    /// The image itself
    pub image      : vk::Image,
    /// The allocation backing the image
    pub allocation : Option<Allocation>,
}



/// The per-frame queues of upload work, handed to the render thread at the end of the tick.
#[derive(Clone, Debug, Default)]
pub struct UploadQueues {
    /// The buffer-to-buffer copies
    pub buf_copies : Vec<BufferCopy>,
    /// The buffer-to-image copies
    pub img_copies : Vec<BufferImageCopy>,
}

impl UploadQueues {
    /// Constructor for the UploadQueues.
    #[inline]
    pub fn new() -> Self {
        Self {
            buf_copies : Vec::new(),
            img_copies : Vec::new(),
        }
    }



    /// Appends buffer-to-buffer copies to the queue.
    #[inline]
    pub fn push_buffers(&mut self, uploads: &[BufferCopy]) {
        self.buf_copies.extend_from_slice(uploads);
    }

    /// Appends buffer-to-image copies to the queue.
    #[inline]
    pub fn push_images(&mut self, uploads: &[BufferImageCopy]) {
        self.img_copies.extend_from_slice(uploads);
    }

    /// Hands the queued work to the given (render thread) queues, taking their (drained) storage in return so capacity survives the round trip.
    #[inline]
    pub fn hand_off(&mut self, buf_copies: &mut Vec<BufferCopy>, img_copies: &mut Vec<BufferImageCopy>) {
        mem::swap(&mut self.buf_copies, buf_copies);
        mem::swap(&mut self.img_copies, img_copies);
    }
}





/***** TESTS *****/
#[cfg(test)]
mod test {
    use super::*;

    /// Builds a dummy buffer copy of the given size.
    fn dummy_copy(size: u64) -> BufferCopy {
        BufferCopy {
            src    : vk::Buffer::null(),
            dst    : vk::Buffer::null(),
            region : vk::BufferCopy{ src_offset: 0, dst_offset: 0, size },
        }
    }


    /// Tests that uploads enqueued for one frame never leak into another frame's queue.
    #[test]
    fn test_upload_isolation() {
        let mut frames: Vec<UploadQueues> = (0..3).map(|_| UploadQueues::new()).collect();

        // Enqueue only in frame 0
        frames[0].push_buffers(&[ dummy_copy(16), dummy_copy(32) ]);

        assert_eq!(frames[0].buf_copies.len(), 2);
        assert_eq!(frames[1].buf_copies.len(), 0);
        assert_eq!(frames[2].buf_copies.len(), 0);
    }

    /// Tests the handoff round trip: the thread side gets the requests, the main side gets empty-but-warm storage back.
    #[test]
    fn test_upload_handoff_drain() {
        let mut queues = UploadQueues::new();
        for i in 0..100 {
            queues.push_buffers(&[ dummy_copy(i) ]);
        }
        for _ in 0..50 {
            queues.push_images(&[ BufferImageCopy {
                src           : vk::Buffer::null(),
                dst           : vk::Image::null(),
                region        : Default::default(),
                range         : Default::default(),
                generate_mips : false,
            } ]);
        }

        // Hand off to the "thread" side
        let mut thread_bufs: Vec<BufferCopy>      = Vec::new();
        let mut thread_imgs: Vec<BufferImageCopy> = Vec::new();
        queues.hand_off(&mut thread_bufs, &mut thread_imgs);
        assert_eq!(thread_bufs.len(), 100);
        assert_eq!(thread_imgs.len(), 50);
        assert_eq!(queues.buf_copies.len(), 0);
        assert_eq!(queues.img_copies.len(), 0);

        // The render thread drains the requests but keeps the storage
        let buf_watermark = thread_bufs.capacity();
        let img_watermark = thread_imgs.capacity();
        thread_bufs.clear();
        thread_imgs.clear();

        // Next lap of the same slot: the warm storage comes back to the main side
        queues.hand_off(&mut thread_bufs, &mut thread_imgs);
        assert_eq!(queues.buf_copies.len(), 0);
        assert!(queues.buf_copies.capacity() >= buf_watermark);
        assert!(queues.img_copies.capacity() >= img_watermark);
    }
}
