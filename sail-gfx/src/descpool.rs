/* DESCPOOL.rs
 *   by Lut99
 *
 * Created:
 *   08 Oct 2022, 11:02:28
 * Last edited:
 *   14 Jan 2023, 15:13:40
 * Auto updated?
 *   Yes
 *
 * Description:
 *   Defines the per-frame descriptor pools. Systems that write fresh
 *   descriptor sets every frame keep one pool per frame in flight and
 *   tick it through the render system; sets allocated from pool `i` are
 *   only referenced by commands recorded into frame `i`.
**/

use ash::vk;

use sail_thr::spec::MAX_FRAME_STATES;


/***** LIBRARY *****/
/// A single frame's descriptor pool, paired with the sets allocated from it this frame.
#[derive(Debug, Default)]
pub struct FrameDescriptorPool {
    /// The pool itself; null until the first tick
    pub set_pool  : vk::DescriptorPool,
    /// The number of sets the pool is sized for
    pub set_count : u32,
    /// The sets allocated from the pool this frame
    pub sets      : Vec<vk::DescriptorSet>,
}



/// One FrameDescriptorPool per frame in flight.
#[derive(Debug, Default)]
pub struct FrameDescriptorPools {
    /// The per-frame pools
    pub pools : [FrameDescriptorPool; MAX_FRAME_STATES],
}

impl FrameDescriptorPools {
    /// Constructor for the FrameDescriptorPools.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}
