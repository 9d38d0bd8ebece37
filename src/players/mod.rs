//! Player identity to network location mapping

pub mod registry;

pub use registry::PlayerRegistry;
