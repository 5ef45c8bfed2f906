use formcheck_common::LabeledSample;
use std::collections::HashSet;
use tracing::debug;

/// Drop exact duplicate rows, keeping the first occurrence
///
/// Two samples are duplicates when their feature vectors are bit-identical
/// and their labels match. Returns the kept samples and the number dropped.
#[must_use]
pub fn dedup_samples(samples: Vec<LabeledSample>) -> (Vec<LabeledSample>, usize) {
    let before = samples.len();
    let mut seen: HashSet<(Vec<u32>, u8)> = HashSet::with_capacity(before);

    let kept: Vec<LabeledSample> = samples
        .into_iter()
        .filter(|sample| {
            let key = (
                sample.features.as_slice().iter().map(|v| v.to_bits()).collect(),
                sample.label.as_u8(),
            );
            seen.insert(key)
        })
        .collect();

    let removed = before - kept.len();
    if removed > 0 {
        debug!("Removed {removed} duplicate samples");
    }
    (kept, removed)
}
