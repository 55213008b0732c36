//! Loading an immutable [`PolicyState`] from one RSL policy entry (§4.3).

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use refward_crypto::key::{Key, KeyId, KeyType};
use refward_crypto::principal::{AssociatedIdentity, Principal, PrincipalId};
use refward_crypto::threshold::Verifier;
use refward_crypto::PublicKey;

use crate::envelope::Envelope;
use crate::policy::controller::VisitedControllers;
use crate::policy::root::{ApprovalApp, ControllerLink, GlobalRule, RootMetadata, TaggedGlobalRule};
use crate::policy::rule::{Pattern, Rule};
use crate::policy::rulefile::RuleFile;
use crate::policy::PolicyError;
use crate::vcs::{Oid, ReadVcs, RefName};

const ROOT_PATH: &str = "metadata/root.json";
const PRIMARY_RULE_FILE_PATH: &str = "metadata/targets.json";

/// The fully resolved policy in force at one RSL policy entry.
#[derive(Debug, Clone)]
pub struct PolicyState {
    pub root: RootMetadata,
    pub primary: RuleFile,
    pub delegated: BTreeMap<String, RuleFile>,
    pub global_rules: Vec<TaggedGlobalRule>,
    pub has_file_rule: bool,
    pub approval_app: Option<ResolvedApprovalApp>,
}

#[derive(Debug, Clone)]
pub struct ResolvedApprovalApp {
    pub name: String,
    pub principals: Vec<Principal>,
    pub threshold: usize,
}

impl PolicyState {
    /// Load the very first policy state a repository has, trusting
    /// `bootstrap_root` as the root principal set (the caller is expected to
    /// have obtained this out of band, e.g. from the initial commit it
    /// reviewed directly).
    pub fn load_initial<V: ReadVcs>(
        vcs: &V,
        tree: Oid,
        bootstrap_root: &[Principal],
        bootstrap_threshold: usize,
    ) -> Result<Self, PolicyError> {
        Self::load(vcs, tree, bootstrap_root, bootstrap_threshold)
    }

    /// Load a candidate policy state rooted at `tree`, requiring its root
    /// envelope to be accepted by a verifier built from *this* state's root
    /// principals and threshold. This is the monotonicity check the
    /// verification workflow runs on every policy reference entry it
    /// encounters.
    pub fn verify_new_state<V: ReadVcs>(&self, vcs: &V, tree: Oid) -> Result<Self, PolicyError> {
        let principals = self.root.root_principals();
        Self::load(vcs, tree, &principals, self.root.root_threshold)
    }

    fn load<V: ReadVcs>(
        vcs: &V,
        tree: Oid,
        trusted_root: &[Principal],
        trusted_root_threshold: usize,
    ) -> Result<Self, PolicyError> {
        let root_env = read_envelope(vcs, tree, ROOT_PATH)?;
        let root_verifier = Verifier::new("root", trusted_root.to_vec(), trusted_root_threshold);
        root_verifier.verify(None, Some(&root_env))?;

        let root_doc: RootDoc = root_env.payload_as()?;
        let root = root_doc.into_domain()?;

        let primary_env = read_envelope(vcs, tree, PRIMARY_RULE_FILE_PATH)?;
        let primary_verifier = Verifier::new(
            "targets",
            root.primary_rule_file_principals(),
            root.primary_rule_file_threshold,
        );
        primary_verifier.verify(None, Some(&primary_env))?;
        let primary: RuleFile = primary_env.payload_as::<RuleFileDoc>()?.into_domain("targets")?;

        let mut delegated = BTreeMap::new();
        let mut queue: Vec<(String, Vec<PrincipalId>, usize)> = primary
            .rules
            .iter()
            .filter_map(|r| {
                r.delegate
                    .clone()
                    .map(|name| (name, r.principal_ids.clone(), r.threshold))
            })
            .collect();

        while let Some((name, principal_ids, threshold)) = queue.pop() {
            if delegated.contains_key(&name) {
                continue;
            }
            let path = format!("metadata/{name}.json");
            let env = read_envelope(vcs, tree, &path)?;
            let verifier = Verifier::new(name.clone(), primary.resolve(&principal_ids), threshold);
            verifier.verify(None, Some(&env))?;
            let file: RuleFile = env.payload_as::<RuleFileDoc>()?.into_domain(&name)?;

            for rule in &file.rules {
                if let Some(child) = &rule.delegate {
                    queue.push((child.clone(), rule.principal_ids.clone(), rule.threshold));
                }
            }
            delegated.insert(name, file);
        }

        let mut global_rules: Vec<TaggedGlobalRule> = root
            .global_rules
            .iter()
            .cloned()
            .map(|rule| TaggedGlobalRule { rule, origin: None })
            .collect();

        let mut visited = VisitedControllers::new();
        for link in root.controllers.iter().chain(root.network_repositories.iter()) {
            if !visited.visit(link) {
                continue;
            }
            let controller_tree = resolve_controller_tree(vcs, tree, link)?;
            let controller_state = Self::load(
                vcs,
                controller_tree,
                &root.resolve(&link.initial_root_principal_ids),
                link.initial_root_principal_ids.len(),
            )
            .map_err(|_| PolicyError::ControllerMetadataNotVerified(link.name.clone()))?;

            global_rules.extend(controller_state.global_rules.into_iter().map(|mut g| {
                g.origin.get_or_insert_with(|| link.name.clone());
                g
            }));
        }

        let has_file_rule =
            primary.has_file_rule() || delegated.values().any(RuleFile::has_file_rule);

        let approval_app = root.approval_app.as_ref().map(|app| ResolvedApprovalApp {
            name: app.name.clone(),
            principals: root.resolve(&app.principal_ids),
            threshold: app.threshold,
        });

        Ok(PolicyState {
            root,
            primary,
            delegated,
            global_rules,
            has_file_rule,
            approval_app,
        })
    }

    /// Every rule file a reference/file pattern may be evaluated against:
    /// the primary rule file plus every rule file reachable by delegation.
    pub fn rule_file(&self, name: &str) -> Option<&RuleFile> {
        if name == "targets" {
            Some(&self.primary)
        } else {
            self.delegated.get(name)
        }
    }

    /// Verifiers applicable to a reference update, in rule-declaration
    /// order, following delegations depth-first. An unmatched pattern
    /// yields no verifiers (the update is unauthorized, not implicitly
    /// allowed); a terminal `allow-rule` with no principals yields a
    /// verifier no one can ever satisfy.
    pub fn verifiers_for_ref(&self, ref_name: &RefName) -> Vec<Verifier> {
        self.collect_verifiers(&self.primary, |file| file.rules_for_ref(ref_name))
    }

    pub fn verifiers_for_path(&self, path: &str) -> Vec<Verifier> {
        self.collect_verifiers(&self.primary, |file| file.rules_for_path(path))
    }

    fn collect_verifiers(
        &self,
        file: &RuleFile,
        matched_rules: impl Fn(&RuleFile) -> Vec<&Rule> + Copy,
    ) -> Vec<Verifier> {
        let mut out = Vec::new();
        for rule in matched_rules(file) {
            if rule.is_terminal_allow() {
                out.push(Verifier::new(rule.name.clone(), Vec::new(), rule.threshold));
                continue;
            }
            match &rule.delegate {
                Some(child_name) => {
                    if let Some(child) = self.rule_file(child_name) {
                        out.extend(self.collect_verifiers(child, matched_rules));
                    }
                }
                None => out.push(Verifier::new(
                    rule.name.clone(),
                    file.resolve(&rule.principal_ids),
                    rule.threshold,
                )),
            }
        }
        out
    }
}

fn read_envelope<V: ReadVcs>(vcs: &V, tree: Oid, path: &'static str) -> Result<Envelope, PolicyError> {
    let blob = vcs
        .resolve_path(tree, path)?
        .ok_or(PolicyError::MissingBlob(path))?;
    let bytes = vcs.read_object(blob)?;
    Ok(Envelope::from_json(&bytes)?)
}

fn resolve_controller_tree<V: ReadVcs>(
    vcs: &V,
    tree: Oid,
    link: &ControllerLink,
) -> Result<Oid, PolicyError> {
    let path = format!("controller-metadata/{}", link.name);
    vcs.resolve_path(tree, &path)?
        .ok_or_else(|| PolicyError::ControllerMetadataNotVerified(link.name.clone()))
}

// --- Wire formats -----------------------------------------------------
//
// These mirror the JSON shape of the signed metadata blobs; they exist only
// to deserialize, then get converted into the borrow-friendly domain types
// above via `into_domain`.

#[derive(Debug, Serialize, Deserialize)]
struct KeyDoc {
    id: String,
    #[serde(rename = "type")]
    key_type: String,
    /// For `ed25519`, the `did:key`-style human encoding; for every other
    /// type, implementation-defined opaque material the host's
    /// [`refward_crypto::key::RawVerifier`] understands.
    material: String,
}

impl KeyDoc {
    fn into_domain(self) -> Result<Key, PolicyError> {
        match self.key_type.as_str() {
            "ed25519" => {
                let pk = PublicKey::from_str(&self.material)
                    .map_err(|e| PolicyError::InvalidRootMetadata(e.to_string()))?;
                Ok(Key::ed25519(pk))
            }
            other => {
                let material = hex::decode(&self.material)
                    .map_err(|e| PolicyError::InvalidRootMetadata(e.to_string()))?;
                let key_type = match other {
                    "rsa" => KeyType::Rsa(material),
                    "ecdsa" => KeyType::Ecdsa(material),
                    "ssh" => KeyType::Ssh(material),
                    "gpg" => KeyType::Gpg(material),
                    "sigstore" => KeyType::Sigstore(material),
                    unknown => {
                        return Err(PolicyError::InvalidRootMetadata(format!(
                            "unknown key type '{unknown}'"
                        )))
                    }
                };
                Ok(Key::unverified(KeyId::from(self.id), key_type))
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PrincipalDoc {
    keys: Vec<KeyDoc>,
    #[serde(default)]
    associated_identities: BTreeMap<String, String>,
}

impl PrincipalDoc {
    fn into_domain(self, id: PrincipalId) -> Result<Principal, PolicyError> {
        let keys = self
            .keys
            .into_iter()
            .map(KeyDoc::into_domain)
            .collect::<Result<Vec<_>, _>>()?;
        let identities = self
            .associated_identities
            .into_iter()
            .map(|(issuer, identity)| AssociatedIdentity { issuer, identity });
        Ok(Principal::new(id, keys).with_associated_identities(identities))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApprovalAppDoc {
    name: String,
    principal_ids: Vec<String>,
    threshold: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum GlobalRuleDoc {
    Threshold { pattern: String, threshold: usize },
    BlockForcePushes { pattern: String },
}

impl GlobalRuleDoc {
    fn into_domain(self) -> Result<GlobalRule, PolicyError> {
        Ok(match self {
            Self::Threshold { pattern, threshold } => GlobalRule::Threshold {
                pattern: parse_pattern(&pattern)?,
                threshold,
            },
            Self::BlockForcePushes { pattern } => GlobalRule::BlockForcePushes {
                pattern: parse_pattern(&pattern)?,
            },
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ControllerLinkDoc {
    name: String,
    location: String,
    initial_root_principal_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RootDoc {
    principals: BTreeMap<String, PrincipalDoc>,
    root_principal_ids: Vec<String>,
    root_threshold: usize,
    primary_rule_file_principal_ids: Vec<String>,
    primary_rule_file_threshold: usize,
    #[serde(default)]
    approval_app: Option<ApprovalAppDoc>,
    #[serde(default)]
    global_rules: Vec<GlobalRuleDoc>,
    #[serde(default)]
    controllers: Vec<ControllerLinkDoc>,
    #[serde(default)]
    network_repositories: Vec<ControllerLinkDoc>,
}

impl RootDoc {
    fn into_domain(self) -> Result<RootMetadata, PolicyError> {
        let principals = self
            .principals
            .into_iter()
            .map(|(id, doc)| {
                let id = PrincipalId::from(id);
                doc.into_domain(id.clone()).map(|p| (id, p))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(RootMetadata {
            principals,
            root_principal_ids: self.root_principal_ids.into_iter().map(PrincipalId::from).collect(),
            root_threshold: self.root_threshold,
            primary_rule_file_principal_ids: self
                .primary_rule_file_principal_ids
                .into_iter()
                .map(PrincipalId::from)
                .collect(),
            primary_rule_file_threshold: self.primary_rule_file_threshold,
            approval_app: self.approval_app.map(|a| ApprovalApp {
                name: a.name,
                principal_ids: a.principal_ids.into_iter().map(PrincipalId::from).collect(),
                threshold: a.threshold,
            }),
            global_rules: self
                .global_rules
                .into_iter()
                .map(GlobalRuleDoc::into_domain)
                .collect::<Result<Vec<_>, _>>()?,
            controllers: self.controllers.into_iter().map(ControllerLinkDoc::into_domain).collect(),
            network_repositories: self
                .network_repositories
                .into_iter()
                .map(ControllerLinkDoc::into_domain)
                .collect(),
        })
    }
}

impl ControllerLinkDoc {
    fn into_domain(self) -> ControllerLink {
        ControllerLink {
            name: self.name,
            location: self.location,
            initial_root_principal_ids: self
                .initial_root_principal_ids
                .into_iter()
                .map(PrincipalId::from)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RuleDoc {
    name: String,
    patterns: Vec<String>,
    principal_ids: Vec<String>,
    threshold: usize,
    #[serde(default)]
    delegate: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RuleFileDoc {
    rules: Vec<RuleDoc>,
    principals: BTreeMap<String, PrincipalDoc>,
}

impl RuleFileDoc {
    fn into_domain(self, name: &str) -> Result<RuleFile, PolicyError> {
        let principals = self
            .principals
            .into_iter()
            .map(|(id, doc)| {
                let id = PrincipalId::from(id);
                doc.into_domain(id.clone()).map(|p| (id, p))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        let rules = self
            .rules
            .into_iter()
            .map(|r| {
                Ok(Rule {
                    name: r.name,
                    patterns: r
                        .patterns
                        .iter()
                        .map(|p| parse_pattern(p))
                        .collect::<Result<Vec<_>, _>>()?,
                    principal_ids: r.principal_ids.into_iter().map(PrincipalId::from).collect(),
                    threshold: r.threshold,
                    delegate: r.delegate,
                })
            })
            .collect::<Result<Vec<_>, PolicyError>>()?;

        Ok(RuleFile {
            name: name.to_owned(),
            rules,
            principals,
        })
    }
}

fn parse_pattern(raw: &str) -> Result<Pattern, PolicyError> {
    Pattern::parse(raw).map_err(|e| PolicyError::InvalidPolicy(e.to_string()))
}
