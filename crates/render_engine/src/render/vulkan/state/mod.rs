//! Per-frame state: synchronization, swapchain and frame scheduling

pub mod frame;
pub mod swapchain;
pub mod sync;

pub use frame::{
    wait_for_nonzero_extent, AcquireOutcome, ActiveFrame, FrameBackend, FrameScheduler, PendingRequests,
    PresentOutcome,
};
pub use swapchain::{SwapchainManager, SwapchainObject, SwapchainResources};
pub use sync::{Fence, FrameSlot, FrameSync, Semaphore};
