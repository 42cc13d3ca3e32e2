use std::marker::PhantomData;

/// Vec wrapper that uses typed indexes.
#[derive(Debug, Hash, PartialEq, Eq, Clone)]
pub struct IdVec<K, V> {
    vec: Vec<V>,
    _phantom: PhantomData<K>,
}

impl<K, V> Default for IdVec<K, V> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<K, V> IdVec<K, V> {
    fn new(vec: Vec<V>) -> Self {
        Self {
            vec,
            _phantom: PhantomData,
        }
    }

    /// Create a new `IdVec` with the given capacity.
    pub fn with_capacity(cap: usize) -> Self {
        Self::new(Vec::with_capacity(cap))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vec.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.vec.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, V> {
        self.vec.iter_mut()
    }
}

impl<K: Into<usize>, V> IdVec<K, V> {
    /// Get the value with id `k`. Panics if `k` was not issued by this `IdVec`.
    #[inline]
    pub fn get(&self, k: K) -> &V {
        &self.vec[k.into()]
    }

    /// Get a mutable reference to value with id `k`.
    #[inline]
    pub fn get_mut(&mut self, k: K) -> &mut V {
        &mut self.vec[k.into()]
    }

    /// Get the value with id `k`, or `None` if it's out of range.
    #[inline]
    pub fn try_get(&self, k: K) -> Option<&V> {
        self.vec.get(k.into())
    }
}

impl<K: From<usize>, V> IdVec<K, V> {
    /// Push `v` into the underlying vec, and return an id that can be used to retrieve it later.
    #[inline]
    pub fn push(&mut self, v: V) -> K {
        let id = self.vec.len().into();
        self.vec.push(v);
        id
    }

    /// Iterate through (id, value) pairs in id order.
    pub fn iter_ids(&self) -> impl Iterator<Item = (K, &V)> + '_ {
        self.vec.iter().enumerate().map(|(i, v)| (i.into(), v))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    id!(TestId, u16);

    #[test]
    fn test_push_and_get() {
        let mut ids: IdVec<TestId, &str> = IdVec::with_capacity(2);
        let a = ids.push("a");
        let b = ids.push("b");
        assert_eq!(*ids.get(a), "a");
        assert_eq!(*ids.get(b), "b");
        assert_eq!(ids.len(), 2);
        assert!(ids.try_get(TestId::from(7)).is_none());
        let collected: Vec<_> = ids.iter_ids().map(|(id, v)| (usize::from(id), *v)).collect();
        assert_eq!(collected, vec![(0, "a"), (1, "b")]);
    }
}
