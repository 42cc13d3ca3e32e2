/// Traits shared by our interners.
mod traits;
pub use traits::{GetStr, InternStr, LookupStr};

/// Internals for mapping keys to interned strings.
mod key_to_str;
use key_to_str::KeyToStr;

/// Interner that checks for duplicates and only stores each unique string once.
mod packed;
pub use packed::PackedInterner;

type Hasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Interned string key {0} is out of range")]
    KeyOutOfRange(usize),
}
