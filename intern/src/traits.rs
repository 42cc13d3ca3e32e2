use anyhow::Result;

/// Reading interned strings back by key.
pub trait GetStr {
    type Key;

    /// The string stored under `k`; an error if `k` was never handed out.
    fn get(&self, k: Self::Key) -> Result<&str>;

    /// Number of distinct strings stored.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes used by the stored strings.
    fn str_len(&self) -> usize;
}

/// Storing strings. The same string always maps to the same key,
/// which is what lets graph addresses be compared as integers.
pub trait InternStr {
    type Key;

    fn intern<T: AsRef<str>>(&mut self, s: T) -> Result<Self::Key>;
}

/// Finding the key of a string without storing it, for read-only address lookups.
pub trait LookupStr {
    type Key;

    fn lookup<T: AsRef<str>>(&self, s: T) -> Option<Self::Key>;
}
