//! Controller-repository resolution (see §4.3 step 5, DESIGN NOTES / cyclic
//! references).

use std::collections::HashSet;

use refward_crypto::principal::PrincipalId;

use crate::policy::root::ControllerLink;

/// A visited-set key: controllers are only revisited if both their
/// location and their declared initial-root principal set repeat, since
/// the same location can legitimately appear twice with different root
/// principals across a rename/fork.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VisitKey {
    location: String,
    initial_root_principal_ids: Vec<PrincipalId>,
}

impl From<&ControllerLink> for VisitKey {
    fn from(link: &ControllerLink) -> Self {
        let mut ids = link.initial_root_principal_ids.clone();
        ids.sort();
        Self {
            location: link.location.clone(),
            initial_root_principal_ids: ids,
        }
    }
}

/// Tracks controller links visited so far in one policy-load call, breaking
/// cycles formed by controllers that recursively reference each other.
#[derive(Debug, Default)]
pub struct VisitedControllers(HashSet<VisitKey>);

impl VisitedControllers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `link` has not been visited yet, and marks it
    /// visited.
    pub fn visit(&mut self, link: &ControllerLink) -> bool {
        self.0.insert(VisitKey::from(link))
    }
}
