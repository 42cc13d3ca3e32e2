use std::hash::BuildHasher;

use anyhow::Result;
use hashbrown::hash_map::{HashMap, RawEntryMut};

use super::{Error, GetStr, InternStr, KeyToStr, LookupStr};

/// Interner that checks for duplicates and will only intern a given string once.
///
/// The dedup map stores keys only (with `()` values and no hasher of its own):
/// we hash the string ourselves and compare candidates against the packed buffer,
/// so each string's contents are stored exactly once.
#[derive(Debug)]
pub struct PackedInterner<Key, H = crate::Hasher> {
    map: HashMap<Key, (), ()>,
    hasher: H,
    strs: KeyToStr,
}

impl<Key, H: Default> PackedInterner<Key, H> {
    pub fn with_capacity_and_avg_len(cap: usize, avg_len: usize) -> Self {
        Self {
            map: HashMap::with_capacity_and_hasher(cap, ()),
            hasher: H::default(),
            strs: KeyToStr::with_capacity_and_avg_len(cap, avg_len),
        }
    }
}

impl<Key, H: Default> Default for PackedInterner<Key, H> {
    fn default() -> Self {
        Self::with_capacity_and_avg_len(64, 24)
    }
}

impl<Key, H> PackedInterner<Key, H>
where
    Key: Copy + From<usize> + Into<usize>,
{
    /// Iterate through all (key, string) pairs in the order they were interned.
    pub fn iter(&self) -> impl Iterator<Item = (Key, &str)> + '_ {
        (0..self.strs.len()).filter_map(|i| self.strs.get(i).map(|s| (Key::from(i), s)))
    }
}

// GetStr /////////////////////
impl<Key, H> GetStr for PackedInterner<Key, H>
where
    Key: Copy + Into<usize>,
{
    type Key = Key;

    fn get(&self, k: Key) -> Result<&str> {
        let idx = k.into();
        Ok(self.strs.get(idx).ok_or(Error::KeyOutOfRange(idx))?)
    }

    fn len(&self) -> usize {
        self.strs.len()
    }

    fn str_len(&self) -> usize {
        self.strs.str_len()
    }
}

// InternStr ///////////////////
impl<Key, H> InternStr for PackedInterner<Key, H>
where
    Key: Copy + From<usize> + Into<usize>,
    H: BuildHasher,
{
    type Key = Key;

    fn intern<T: AsRef<str>>(&mut self, s: T) -> Result<Key> {
        let s = s.as_ref();
        let Self { map, hasher, strs } = self;

        let hash = hasher.hash_one(s);
        let entry = map
            .raw_entry_mut()
            .from_hash(hash, |k| strs.get((*k).into()) == Some(s));

        match entry {
            RawEntryMut::Occupied(entry) => Ok(*entry.into_key()),
            RawEntryMut::Vacant(entry) => {
                let new_k = Key::from(strs.push(s));
                entry.insert_with_hasher(hash, new_k, (), |k| {
                    hasher.hash_one(strs.get((*k).into()).unwrap_or_default())
                });
                Ok(new_k)
            }
        }
    }
}

// LookupStr ///////////////////
impl<Key, H> LookupStr for PackedInterner<Key, H>
where
    Key: Copy + Into<usize>,
    H: BuildHasher,
{
    type Key = Key;

    fn lookup<T: AsRef<str>>(&self, s: T) -> Option<Key> {
        let s = s.as_ref();
        let hash = self.hasher.hash_one(s);
        self.map
            .raw_entry()
            .from_hash(hash, |k| self.strs.get((*k).into()) == Some(s))
            .map(|(k, _)| *k)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Key(u32);

    impl From<usize> for Key {
        fn from(v: usize) -> Self {
            Self(v as u32)
        }
    }

    impl From<Key> for usize {
        fn from(k: Key) -> Self {
            k.0 as usize
        }
    }

    #[test]
    fn test_intern_dedupes() -> Result<()> {
        let mut interner: PackedInterner<Key> = PackedInterner::default();
        let a = interner.intern("align.bam")?;
        let b = interner.intern("sort.bam")?;
        let a2 = interner.intern(String::from("align.bam"))?;
        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(interner.len(), 2);
        assert_eq!(interner.get(b)?, "sort.bam");
        Ok(())
    }

    #[test]
    fn test_lookup_does_not_insert() -> Result<()> {
        let mut interner: PackedInterner<Key> = PackedInterner::default();
        let a = interner.intern("call.vcf")?;
        assert_eq!(interner.lookup("call.vcf"), Some(a));
        assert_eq!(interner.lookup("missing"), None);
        assert_eq!(interner.len(), 1);
        assert!(interner.get(Key(5)).is_err());
        Ok(())
    }

    #[test]
    fn test_iter_order() -> Result<()> {
        let mut interner: PackedInterner<Key> = PackedInterner::default();
        interner.intern("b")?;
        interner.intern("a")?;
        let all: Vec<&str> = interner.iter().map(|(_, s)| s).collect();
        assert_eq!(all, vec!["b", "a"]);
        Ok(())
    }
}
