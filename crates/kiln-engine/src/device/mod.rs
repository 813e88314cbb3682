//! GPU device + surface management.
//!
//! Creates the wgpu instance, adapter, device and queue for a window,
//! configures the swapchain, and owns the depth attachment the batch pass
//! renders into. Resizes recreate the depth texture to match.

mod error;
mod frame;
mod gpu;
mod init;
mod surface;

pub use error::SurfaceErrorAction;
pub use frame::GpuFrame;
pub use gpu::Gpu;
pub use init::GpuInit;
