pub mod hash;
pub mod utf16;
pub mod varint;

pub use hash::{HashCombiner, string_hash};
