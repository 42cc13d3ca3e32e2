/// Internals used by our interners:
/// all strings are packed into a single buffer, and we keep the start offset of each.
#[derive(Debug)]
pub struct KeyToStr {
    starts: Vec<usize>,
    strings: String,
}

impl KeyToStr {
    pub fn with_capacity_and_avg_len(cap: usize, avg_len: usize) -> Self {
        Self {
            starts: Vec::with_capacity(cap),
            strings: String::with_capacity(cap * avg_len),
        }
    }

    /// Get the string stored at index `k`.
    pub fn get(&self, k: usize) -> Option<&str> {
        let start = *self.starts.get(k)?;
        let end = self.starts.get(k + 1).copied().unwrap_or(self.strings.len());
        Some(&self.strings[start..end])
    }

    /// Store `s` and return its index.
    pub fn push(&mut self, s: &str) -> usize {
        let k = self.starts.len();
        self.starts.push(self.strings.len());
        self.strings.push_str(s);
        k
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn str_len(&self) -> usize {
        self.strings.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_push_and_get() {
        let mut strs = KeyToStr::with_capacity_and_avg_len(4, 8);
        let a = strs.push("align.out");
        let empty = strs.push("");
        let b = strs.push("sort.in");
        assert_eq!(strs.get(a), Some("align.out"));
        assert_eq!(strs.get(empty), Some(""));
        assert_eq!(strs.get(b), Some("sort.in"));
        assert_eq!(strs.get(3), None);
        assert_eq!(strs.str_len(), "align.outsort.in".len());
    }
}
