//! The root of trust for a repository's policy (see DATA MODEL / RootMetadata).

use std::collections::BTreeMap;

use refward_crypto::principal::{Principal, PrincipalId};

use crate::policy::rule::Pattern;

/// A registered third-party code-review system whose approval attestations
/// can top up a verifier's credits.
#[derive(Debug, Clone)]
pub struct ApprovalApp {
    pub name: String,
    pub principal_ids: Vec<PrincipalId>,
    pub threshold: usize,
}

/// A constraint that applies to a matching pattern independent of any
/// named rule.
#[derive(Debug, Clone)]
pub enum GlobalRule {
    /// Require at least `threshold` distinct credited principals for any
    /// entry matching `pattern`, on top of whatever named rules require.
    Threshold { pattern: Pattern, threshold: usize },
    /// Forbid non-fast-forward updates to references matching `pattern`.
    BlockForcePushes { pattern: Pattern },
}

impl GlobalRule {
    pub fn pattern(&self) -> &Pattern {
        match self {
            Self::Threshold { pattern, .. } => pattern,
            Self::BlockForcePushes { pattern } => pattern,
        }
    }
}

/// A merged-in global rule, tagged with the controller repository it was
/// inherited from (`None` for rules declared directly in this policy).
#[derive(Debug, Clone)]
pub struct TaggedGlobalRule {
    pub rule: GlobalRule,
    pub origin: Option<String>,
}

/// A link to a controller (or network) repository whose policy this one
/// inherits global rules from.
#[derive(Debug, Clone)]
pub struct ControllerLink {
    pub name: String,
    pub location: String,
    pub initial_root_principal_ids: Vec<PrincipalId>,
}

/// The root of trust: who may sign root updates, who may sign the primary
/// rule file, and what applies regardless of named rules.
#[derive(Debug, Clone)]
pub struct RootMetadata {
    /// Every principal this policy knows of, keyed by id. Root principals,
    /// primary-rule-file principals, and delegated-rule-file principals all
    /// draw from this one table.
    pub principals: BTreeMap<PrincipalId, Principal>,
    pub root_principal_ids: Vec<PrincipalId>,
    pub root_threshold: usize,
    pub primary_rule_file_principal_ids: Vec<PrincipalId>,
    pub primary_rule_file_threshold: usize,
    pub approval_app: Option<ApprovalApp>,
    pub global_rules: Vec<GlobalRule>,
    pub controllers: Vec<ControllerLink>,
    pub network_repositories: Vec<ControllerLink>,
}

impl RootMetadata {
    pub fn root_principals(&self) -> Vec<Principal> {
        self.resolve(&self.root_principal_ids)
    }

    pub fn primary_rule_file_principals(&self) -> Vec<Principal> {
        self.resolve(&self.primary_rule_file_principal_ids)
    }

    pub fn principal(&self, id: &PrincipalId) -> Option<&Principal> {
        self.principals.get(id)
    }

    pub fn resolve(&self, ids: &[PrincipalId]) -> Vec<Principal> {
        ids.iter().filter_map(|id| self.principals.get(id).cloned()).collect()
    }
}
