use serde::{Deserialize, Serialize};

/// Below this normalized Levenshtein score a candidate is not worth suggesting.
pub const SUGGESTION_THRESHOLD: f64 = 0.55;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClosestMatch {
    pub candidate: String,
    pub similarity: f64,
}

/// Best candidate for a "did you mean" hint, if any is close enough.
pub fn closest_match<'a, I, S>(needle: &str, hay: I) -> Option<ClosestMatch>
where
    I: IntoIterator<Item = &'a S>,
    S: AsRef<str> + ?Sized + 'a,
{
    let mut best: Option<ClosestMatch> = None;

    for candidate in hay {
        let candidate = candidate.as_ref();
        let sim = strsim::normalized_levenshtein(needle, candidate);
        if sim >= SUGGESTION_THRESHOLD && best.as_ref().map_or(true, |b| sim > b.similarity) {
            best = Some(ClosestMatch {
                candidate: candidate.to_string(),
                similarity: sim,
            });
        }
    }
    best
}
