pub mod context;

pub use context::GpuContext;
