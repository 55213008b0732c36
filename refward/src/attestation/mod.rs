//! Reference-authorization and approval-app attestations (see DATA MODEL /
//! AttestationsState).

pub mod store;

pub use store::AttestationStore;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::envelope::{Envelope, EnvelopeError};
use crate::vcs::{Oid, ReadVcs, RefName, VcsError};

#[derive(Debug, Error)]
pub enum AttestationError {
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("vcs error: {0}")]
    Vcs(#[from] VcsError),
}

/// A key identifying one prospective reference update: the reference being
/// moved, the commit it currently points at, and the commit (or tag target,
/// or prospective merge tree) it is proposed to move to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AttestationKey {
    pub ref_name: RefName,
    pub from_id: Oid,
    pub to_id: Oid,
}

impl AttestationKey {
    pub fn new(ref_name: RefName, from_id: Oid, to_id: Oid) -> Self {
        Self {
            ref_name,
            from_id,
            to_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApprovalPayload {
    pub approvers: Vec<String>,
}

/// Immutable snapshot assembled from one RSL attestations entry: every
/// reference-authorization and approval-app envelope recorded under the
/// tree that entry points at.
///
/// Layout: `authorizations/<refName>/<from>-<to>.json` for reference
/// authorizations; `approvals/<appName>/<refName>/<from>-<to>.json` for
/// third-party approvals.
#[derive(Debug, Clone, Default)]
pub struct AttestationsState {
    authorizations: BTreeMap<AttestationKey, Envelope>,
    approvals: BTreeMap<(String, AttestationKey), (Envelope, Vec<String>)>,
}

impl AttestationsState {
    pub fn load<V: ReadVcs>(vcs: &V, tree: Oid) -> Result<Self, AttestationError> {
        let mut state = Self::default();

        for path in vcs.list_tree(tree, "authorizations")? {
            let Some(key) = parse_key("authorizations", &path) else {
                continue;
            };
            let blob = vcs.resolve_path(tree, &path)?;
            if let Some(blob) = blob {
                let envelope = Envelope::from_json(&vcs.read_object(blob)?)?;
                state.authorizations.insert(key, envelope);
            }
        }

        for path in vcs.list_tree(tree, "approvals")? {
            let Some((app, key)) = parse_approval_key(&path) else {
                continue;
            };
            let blob = vcs.resolve_path(tree, &path)?;
            if let Some(blob) = blob {
                let envelope = Envelope::from_json(&vcs.read_object(blob)?)?;
                let approvers = envelope
                    .payload_as::<ApprovalPayload>()
                    .map(|p| p.approvers)
                    .unwrap_or_default();
                state.approvals.insert((app, key), (envelope, approvers));
            }
        }

        Ok(state)
    }
}

impl AttestationStore for AttestationsState {
    fn get_reference_authorization_for(&self, key: &AttestationKey) -> Option<&Envelope> {
        self.authorizations.get(key)
    }

    fn get_pull_request_approval_attestation_for(
        &self,
        app_name: &str,
        key: &AttestationKey,
    ) -> Option<(&Envelope, &[String])> {
        self.approvals
            .get(&(app_name.to_owned(), key.clone()))
            .map(|(env, approvers)| (env, approvers.as_slice()))
    }
}

fn parse_key(prefix: &str, path: &str) -> Option<AttestationKey> {
    let rest = path.strip_prefix(prefix)?.strip_prefix('/')?;
    let (ref_part, file) = rest.rsplit_once('/')?;
    let stem = file.strip_suffix(".json")?;
    let (from, to) = stem.split_once('-')?;
    Some(AttestationKey::new(
        RefName::new(ref_part),
        from.parse().ok()?,
        to.parse().ok()?,
    ))
}

fn parse_approval_key(path: &str) -> Option<(String, AttestationKey)> {
    let rest = path.strip_prefix("approvals/")?;
    let (app, rest) = rest.split_once('/')?;
    let (ref_part, file) = rest.rsplit_once('/')?;
    let stem = file.strip_suffix(".json")?;
    let (from, to) = stem.split_once('-')?;
    Some((
        app.to_owned(),
        AttestationKey::new(RefName::new(ref_part), from.parse().ok()?, to.parse().ok()?),
    ))
}
