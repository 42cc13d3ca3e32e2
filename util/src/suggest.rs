use std::fmt;

/// Optional closest valid name, displayed as a "did you mean" hint
/// at the end of an error message (or as nothing at all).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suggestion(pub Option<String>);

impl Suggestion {
    pub fn none() -> Self {
        Self(None)
    }

    /// Find the closest of `candidates` to `name`.
    pub fn closest<'a, I>(name: &str, candidates: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self(closest_match(name, candidates).map(str::to_owned))
    }
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(s) => write!(f, " (did you mean '{s}'?)"),
            None => Ok(()),
        }
    }
}

/// Return the candidate with the smallest edit distance to `name`,
/// as long as that distance is small relative to the length of `name`.
pub fn closest_match<'a, I>(name: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let max_distance = (name.chars().count() / 3).max(2);
    let mut best: Option<(usize, &'a str)> = None;
    for candidate in candidates {
        if candidate == name {
            continue;
        }
        let d = levenshtein(name, candidate);
        if d > max_distance {
            continue;
        }
        match best {
            Some((best_d, _)) if best_d <= d => {}
            _ => best = Some((d, candidate)),
        }
    }
    best.map(|(_, s)| s)
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for (i, ca) in a.chars().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let sub = prev[j] + usize::from(ca != *cb);
            cur[j + 1] = sub.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}
