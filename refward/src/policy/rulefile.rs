//! An ordered set of rules plus the principals they name (see DATA MODEL /
//! RuleFile).

use std::collections::BTreeMap;

use refward_crypto::principal::{Principal, PrincipalId};

use crate::policy::rule::Rule;
use crate::vcs::RefName;

#[derive(Debug, Clone)]
pub struct RuleFile {
    pub name: String,
    pub rules: Vec<Rule>,
    pub principals: BTreeMap<PrincipalId, Principal>,
}

impl RuleFile {
    pub fn principal(&self, id: &PrincipalId) -> Option<&Principal> {
        self.principals.get(id)
    }

    pub fn resolve(&self, ids: &[PrincipalId]) -> Vec<Principal> {
        ids.iter()
            .filter_map(|id| self.principals.get(id).cloned())
            .collect()
    }

    /// Rules in declaration order whose pattern matches `ref_name`,
    /// stopping at (and including) the first terminal allow-rule.
    pub fn rules_for_ref<'a>(&'a self, ref_name: &RefName) -> Vec<&'a Rule> {
        let mut out = Vec::new();
        for rule in &self.rules {
            if rule.is_terminal_allow() {
                if rule.matches_ref(ref_name) {
                    out.push(rule);
                }
                break;
            }
            if rule.matches_ref(ref_name) {
                out.push(rule);
            }
        }
        out
    }

    pub fn rules_for_path<'a>(&'a self, path: &str) -> Vec<&'a Rule> {
        let mut out = Vec::new();
        for rule in &self.rules {
            if rule.is_terminal_allow() {
                if rule.matches_path(path) {
                    out.push(rule);
                }
                break;
            }
            if rule.matches_path(path) {
                out.push(rule);
            }
        }
        out
    }

    pub fn has_file_rule(&self) -> bool {
        self.rules.iter().any(Rule::has_file_pattern)
    }
}
