//  SPEC.rs
//    by Lut99
//
//  Created:
//    01 Oct 2022, 11:30:26
//  Last edited:
//    14 Jan 2023, 13:48:12
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the data that the main thread prepares and the render
//!   thread records: upload requests, pass contexts and draw contexts.
//!   Everything in here is plain handles and values, so the whole model
//!   can cross the thread boundary.
//

use std::mem;

use ash::vk;


/***** CONSTANTS *****/
/// The number of frames that may be in flight at once.
pub const MAX_FRAME_STATES: usize = 3;

/// The size of the per-frame temporary (staging) buffers, in bytes.
pub const TMP_BUFFER_SIZE: vk::DeviceSize = 64 * 1024 * 1024;





/***** UPLOADS *****/
/// A buffer-to-buffer copy, queued by the main thread and executed by the render thread at the start of the frame.
#[derive(Clone, Copy, Debug)]
pub struct BufferCopy {
    /// The buffer to copy from
    pub src    : vk::Buffer,
    /// The buffer to copy to
    pub dst    : vk::Buffer,
    /// The region to copy
    pub region : vk::BufferCopy,
}

/// A buffer-to-image copy, queued by the main thread and executed by the render thread at the start of the frame.
///
/// The render thread transitions the target subresource range to a transfer layout, performs the copy, and then either transitions the range to be shader-readable or generates the remaining mip chain with a blit cascade.
#[derive(Clone, Copy, Debug)]
pub struct BufferImageCopy {
    /// The buffer to copy from
    pub src           : vk::Buffer,
    /// The image to copy to
    pub dst           : vk::Image,
    /// The region to copy
    pub region        : vk::BufferImageCopy,
    /// The subresource range the layout transitions apply to
    pub range         : vk::ImageSubresourceRange,
    /// Whether to generate the image's mip chain after the copy
    pub generate_mips : bool,
}





/***** PASSES *****/
/// A pre-pass image memory barrier with its image handle already patched in for a concrete frame index.
#[derive(Clone, Copy, Debug)]
pub struct ImageTransition {
    /// The source pipeline stages to wait on
    pub src_stage  : vk::PipelineStageFlags,
    /// The destination pipeline stages that wait
    pub dst_stage  : vk::PipelineStageFlags,
    /// The source access mask
    pub src_access : vk::AccessFlags,
    /// The destination access mask
    pub dst_access : vk::AccessFlags,
    /// The layout the image is in before the barrier
    pub old_layout : vk::ImageLayout,
    /// The layout the image is in after the barrier
    pub new_layout : vk::ImageLayout,
    /// The subresource range the barrier applies to
    pub range      : vk::ImageSubresourceRange,
    /// The image itself; re-patched from the render target catalog on resize
    pub image      : vk::Image,
}

/// One resolved attachment of a pass, for a concrete frame index.
#[derive(Clone, Copy)]
pub struct AttachmentContext {
    /// The view to render to
    pub view        : vk::ImageView,
    /// The layout the attachment is rendered in
    pub layout      : vk::ImageLayout,
    /// Whether this is the depth attachment rather than a color one
    pub is_depth    : bool,
    /// What to do with the attachment's previous contents
    pub load_op     : vk::AttachmentLoadOp,
    /// What to do with the attachment's new contents
    pub store_op    : vk::AttachmentStoreOp,
    /// The clear value, if the load op clears
    pub clear_value : vk::ClearValue,
}

/// The render thread's view of one registered pass, for a concrete frame index.
#[derive(Clone)]
pub struct PassContext {
    /// The ID of the pass this context was built from
    pub id                   : u32,
    /// The index of the pass command buffer this pass records into
    pub command_buffer_index : u32,

    /// The pre-pass barriers, with patched image handles
    pub barriers    : Vec<ImageTransition>,
    /// The resolved attachments
    pub attachments : Vec<AttachmentContext>,

    /// The width of the framebuffer
    pub width       : u32,
    /// The height of the framebuffer
    pub height      : u32,
    /// The number of layers rendered (1 unless multiview is off and the target is layered)
    pub layer_count : u32,
    /// The multiview mask (0 for no multiview)
    pub view_mask   : u32,

    /// A debug label for the pass
    pub label : String,
}





/***** DRAWS *****/
/// A single draw batch as submitted by a game system (and as stored in the frame).
///
/// The user record that travels with a batch is copied by value into the owning DrawContext's RecordBuffer at the same index; callers do not need to keep their records alive.
#[derive(Clone, Copy, Debug)]
pub struct DrawBatch {
    /// The pipeline to bind
    pub pipeline : vk::Pipeline,
    /// The layout of that pipeline
    pub layout   : vk::PipelineLayout,
    /// The viewport to set
    pub viewport : vk::Viewport,
    /// The scissor rect to set
    pub scissor  : vk::Rect2D,
}

/// The function that records the draws of one context into a command buffer.
///
/// # Arguments
/// - The device to record with.
/// - The command buffer to record into.
/// - The draw batches submitted against this context this frame.
/// - The per-batch user records (same indices as the batches).
pub type RecordFn = fn(&ash::Device, vk::CommandBuffer, &[DrawBatch], &RecordBuffer);



/// A growable, type-erased buffer of user-batch records with a fixed stride.
///
/// Records are stored in 16-byte units so that any reasonably-aligned record type can be reinterpreted in place.
#[derive(Clone, Debug)]
pub struct RecordBuffer {
    /// The backing storage, in 16-byte units.
    data         : Vec<u128>,
    /// The registered stride, in bytes.
    stride       : usize,
    /// The registered stride, in backing units.
    stride_units : usize,
    /// The number of records currently stored.
    count        : usize,
}

impl RecordBuffer {
    /// Constructor for the RecordBuffer.
    ///
    /// # Arguments
    /// - `stride`: The size (in bytes) of the record type this buffer will carry.
    pub fn new(stride: usize) -> Self {
        Self {
            data         : Vec::new(),
            stride,
            stride_units : (stride + 15) / 16,
            count        : 0,
        }
    }



    /// Appends a record by value.
    ///
    /// # Panics
    /// This function panics if `T`'s size is not the registered stride, or if `T` requires more than 16-byte alignment.
    pub fn push<T: Copy>(&mut self, record: &T) {
        if mem::size_of::<T>() != self.stride { panic!("Record size {} does not match registered stride {}", mem::size_of::<T>(), self.stride); }
        if mem::align_of::<T>() > 16 { panic!("Record alignment {} exceeds the supported 16 bytes", mem::align_of::<T>()); }

        // Reserve the units for this record, then copy the bytes in
        let offset_units = self.count * self.stride_units;
        self.data.resize(offset_units + self.stride_units, 0);
        unsafe {
            std::ptr::copy_nonoverlapping(
                (record as *const T).cast::<u8>(),
                self.data.as_mut_ptr().add(offset_units).cast::<u8>(),
                self.stride,
            );
        }
        self.count += 1;
    }

    /// Returns the record at the given index, reinterpreted as `T`.
    ///
    /// # Panics
    /// This function panics if the index is out of range, if `T`'s size is not the registered stride, or if `T` requires more than 16-byte alignment.
    pub fn get<T: Copy>(&self, index: usize) -> &T {
        if index >= self.count { panic!("Record index {} is out of range for {} records", index, self.count); }
        if mem::size_of::<T>() != self.stride { panic!("Record size {} does not match registered stride {}", mem::size_of::<T>(), self.stride); }
        if mem::align_of::<T>() > 16 { panic!("Record alignment {} exceeds the supported 16 bytes", mem::align_of::<T>()); }

        unsafe { &*self.data.as_ptr().add(index * self.stride_units).cast::<T>() }
    }



    /// Removes all records, keeping the storage.
    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
        self.count = 0;
    }

    /// Returns the number of stored records.
    #[inline]
    pub fn len(&self) -> usize { self.count }

    /// Returns whether there are no stored records.
    #[inline]
    pub fn is_empty(&self) -> bool { self.count == 0 }

    /// Returns the registered stride, in bytes.
    #[inline]
    pub fn stride(&self) -> usize { self.stride }
}



/// A registration slot that associates a pass with a record callback and carries the frame's draw batches for it.
#[derive(Clone, Debug)]
pub struct DrawContext {
    /// The ID of the pass this context draws in
    pub pass_id   : u32,
    /// The function that records this context's draws
    pub record_fn : RecordFn,

    /// The draw batches submitted this frame
    pub batches : Vec<DrawBatch>,
    /// The per-batch user records, same indices as `batches`
    pub records : RecordBuffer,
}

impl DrawContext {
    /// Constructor for the DrawContext.
    ///
    /// # Arguments
    /// - `pass_id`: The ID of the pass this context will draw in.
    /// - `stride`: The size (in bytes) of the user record type.
    /// - `record_fn`: The function that records this context's draws.
    pub fn new(pass_id: u32, stride: usize, record_fn: RecordFn) -> Self {
        Self {
            pass_id,
            record_fn,

            batches : Vec::new(),
            records : RecordBuffer::new(stride),
        }
    }
}





/***** TESTS *****/
#[cfg(test)]
mod test {
    use super::*;

    /// A record the size and shape of the fullscreen passes' user batch.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    struct TestRecord {
        set : u64,
    }

    /// Tests that records are copied by value and survive mutation of the original.
    #[test]
    fn test_record_buffer_ownership() {
        let mut buffer = RecordBuffer::new(mem::size_of::<TestRecord>());

        let mut record = TestRecord{ set: 42 };
        buffer.push(&record);

        // Mutating the caller's record must not affect the stored copy
        record.set = 1337;
        assert_eq!(buffer.get::<TestRecord>(0), &TestRecord{ set: 42 });
    }

    /// Tests that records keep their indices as the buffer grows.
    #[test]
    fn test_record_buffer_growth() {
        let mut buffer = RecordBuffer::new(mem::size_of::<TestRecord>());
        for i in 0..100 {
            buffer.push(&TestRecord{ set: i });
        }
        assert_eq!(buffer.len(), 100);
        for i in 0..100 {
            assert_eq!(buffer.get::<TestRecord>(i as usize), &TestRecord{ set: i });
        }
    }

    /// Tests that clearing resets the count but subsequent pushes still work.
    #[test]
    fn test_record_buffer_clear() {
        let mut buffer = RecordBuffer::new(mem::size_of::<TestRecord>());
        buffer.push(&TestRecord{ set: 1 });
        buffer.clear();
        assert!(buffer.is_empty());

        buffer.push(&TestRecord{ set: 2 });
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.get::<TestRecord>(0), &TestRecord{ set: 2 });
    }

    /// Tests that a mismatched record size is caught.
    #[test]
    #[should_panic]
    fn test_record_buffer_stride_mismatch() {
        let mut buffer = RecordBuffer::new(4);
        buffer.push(&TestRecord{ set: 0 });
    }
}
