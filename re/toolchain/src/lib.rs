mod backend;
mod toolchain;

pub use backend::CommandBackend;
pub use toolchain::Toolchain;
