pub mod bounds;
pub mod numfmt;

// Foundation crate: small, well-tested primitives only.
pub use bounds::*;
pub use numfmt::*;
