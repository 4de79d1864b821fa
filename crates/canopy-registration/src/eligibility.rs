//! Seed eligibility
//!
//! Drops registrations whose seed selector does not match the seed.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use canopy_common::crd::ControllerRegistration;
use canopy_common::selector::selector_matches;
use canopy_common::Error;

/// Keep the registration names whose seed selector matches `seed_labels`
///
/// A registration without selector matches every seed. A malformed selector
/// or a name without registration fails the whole filter.
pub fn filter_by_seed_selector(
    names: &BTreeSet<String>,
    registrations: &BTreeMap<String, ControllerRegistration>,
    seed: &str,
    seed_labels: &BTreeMap<String, String>,
) -> Result<BTreeSet<String>, Error> {
    let mut matching = BTreeSet::new();

    for name in names {
        let registration = registrations
            .get(name)
            .ok_or_else(|| Error::unknown_registration(seed, name))?;

        let matches = selector_matches(registration.spec.seed_selector(), seed_labels)
            .map_err(|msg| Error::invalid_seed_selector(name, msg))?;

        if matches {
            matching.insert(name.clone());
        } else {
            debug!(seed, registration = %name, "seed selector does not match");
        }
    }

    Ok(matching)
}
