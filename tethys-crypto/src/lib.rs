/// Blake2b digests of the sizes Cardano cares about
pub mod hash;

pub use hash::{Hash, Hasher};
