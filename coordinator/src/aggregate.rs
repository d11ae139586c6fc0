//! The weight-averaging merge producing the next canonical parameter set.

use rayon::prelude::*;

use model::{ModelErr, ParameterSet};

/// Merges one pending contribution into the canonical parameter set.
///
/// An absent canonical means no model has been trained yet, so the
/// contribution bootstraps it unchanged. Otherwise both sets must agree
/// layer for layer on their shapes and the result is the elementwise
/// two-way average `(canonical + contribution) / 2`.
///
/// Note that this is deliberately not a running mean over every
/// contribution ever merged: each merge averages the current canonical
/// against the single newest contribution, so later contributions carry
/// geometrically more weight. Compatible deployments depend on that exact
/// behavior.
///
/// # Arguments
/// * `canonical` - The current canonical set, if one exists.
/// * `contribution` - The validated pending contribution.
///
/// # Returns
/// The next canonical set, or `ShapeMismatch`/`LayerCountMismatch` when the
/// contribution is incompatible. Pure computation; persistence is the
/// store's job.
pub fn merge(
    canonical: Option<ParameterSet>,
    contribution: ParameterSet,
) -> Result<ParameterSet, ModelErr> {
    let Some(canonical) = canonical else {
        return Ok(contribution);
    };

    canonical.compatible(&contribution)?;

    let tensors = canonical
        .into_tensors()
        .into_par_iter()
        .zip(contribution.into_tensors())
        .map(|(ours, theirs)| (ours + theirs) / 2.0)
        .collect();

    Ok(ParameterSet::new(tensors))
}
