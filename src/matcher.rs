use crate::tracker::Identity;

/// Resolves one face embedding to an enrolled identity, or `Unknown`.
pub trait Classifier {
    fn resolve(&self, query: &[f32]) -> Identity;
}

/// Nearest-neighbor classifier over the enrolled embeddings.
///
/// The query matches the entry with the smallest euclidean distance, and
/// only when that distance is strictly below the threshold. Ties keep the
/// earliest enrolled entry.
pub struct NearestMatcher {
    entries: Vec<(String, Vec<f32>)>,
    threshold: f32,
}

impl NearestMatcher {
    pub fn new(entries: Vec<(String, Vec<f32>)>, threshold: f32) -> Self {
        Self { entries, threshold }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn distance(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            // A malformed enrollment can never win.
            return f32::INFINITY;
        }
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt()
    }
}

impl Classifier for NearestMatcher {
    fn resolve(&self, query: &[f32]) -> Identity {
        let mut best: Option<(&str, f32)> = None;
        for (name, embedding) in &self.entries {
            let d = Self::distance(embedding, query);
            match best {
                Some((_, least)) if d >= least => {}
                _ => best = Some((name, d)),
            }
        }
        match best {
            Some((name, d)) if d < self.threshold => Identity::Known(name.to_string()),
            _ => Identity::Unknown,
        }
    }
}
