pub type SetId = u32;
pub type RequestId = u32;
pub type WatchId = u32;
pub type FrameId = u64;
