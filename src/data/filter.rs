use std::collections::BTreeSet;

use super::model::{MetadataValue, SpikeTrain};

/// Annotation written by manual curation (phy) with the cluster quality.
pub const CLUSTER_GROUP: &str = "cluster_group";

// ---------------------------------------------------------------------------
// Cluster-label exclusion
// ---------------------------------------------------------------------------

/// Drop spike trains whose `key` annotation contains `label`.
///
/// Curation labels are matched as substrings, so `"noise"` also removes
/// `"noise_mua"`. If any train lacks the annotation the data have not been
/// curated: a warning is logged and every train is returned.
pub fn exclude_label(trains: Vec<SpikeTrain>, key: &str, label: &str) -> Vec<SpikeTrain> {
    if let Some(missing) = trains.iter().find(|st| st.annotation(key).is_none()) {
        log::warn!(
            "spike train '{}' has no '{key}' annotation; data have to be curated to remove \
             '{label}' clusters, returning all {} spike trains",
            missing.name(),
            trains.len()
        );
        return trains;
    }

    let before = trains.len();
    let kept: Vec<SpikeTrain> = trains
        .into_iter()
        .filter(|st| match st.annotation(key) {
            Some(MetadataValue::String(value)) => !value.contains(label),
            Some(other) => !other.to_string().contains(label),
            None => true,
        })
        .collect();
    log::info!(
        "removed {} of {before} spike trains labelled '{label}'",
        before - kept.len()
    );
    kept
}

/// Sorted distinct values of one annotation. Trains without it contribute
/// [`MetadataValue::Null`].
pub fn unique_values(trains: &[SpikeTrain], key: &str) -> BTreeSet<MetadataValue> {
    trains
        .iter()
        .map(|st| st.annotation(key).cloned().unwrap_or(MetadataValue::Null))
        .collect()
}
