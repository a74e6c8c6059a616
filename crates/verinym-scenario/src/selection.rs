//! Choosing one credential when several satisfy a referent.

use std::collections::BTreeMap;

use verinym_core::{SelectionConfig, SelectionPolicyKind};
use verinym_sdk::RequestedCredential;

/// Holder-side tie-break between candidate credentials.
///
/// Candidates arrive in the order the wallet stored them, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionPolicy {
    kind: SelectionPolicyKind,
    per_referent: BTreeMap<String, usize>,
}

impl SelectionPolicy {
    pub fn first() -> Self {
        Self::default()
    }

    pub fn newest() -> Self {
        Self {
            kind: SelectionPolicyKind::Newest,
            per_referent: BTreeMap::new(),
        }
    }

    pub fn per_referent(indexes: BTreeMap<String, usize>) -> Self {
        Self {
            kind: SelectionPolicyKind::PerReferent,
            per_referent: indexes,
        }
    }

    pub fn from_config(config: &SelectionConfig) -> Self {
        Self {
            kind: config.policy,
            per_referent: config.per_referent.clone(),
        }
    }

    pub fn kind(&self) -> SelectionPolicyKind {
        self.kind
    }

    /// Pick a candidate for `referent`; `None` only when there are none.
    pub fn select<'a>(
        &self,
        referent: &str,
        candidates: &'a [RequestedCredential],
    ) -> Option<&'a RequestedCredential> {
        let index = match self.kind {
            SelectionPolicyKind::First => 0,
            SelectionPolicyKind::Newest => candidates.len().saturating_sub(1),
            SelectionPolicyKind::PerReferent => {
                let wanted = self.per_referent.get(referent).copied().unwrap_or(0);
                if wanted < candidates.len() {
                    wanted
                } else {
                    tracing::debug!(referent, wanted, available = candidates.len(), "index out of range, using first candidate");
                    0
                }
            }
        };
        candidates.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verinym_sdk::CredentialInfo;

    fn candidate(referent: &str) -> RequestedCredential {
        RequestedCredential {
            cred_info: CredentialInfo {
                referent: referent.to_string(),
                attrs: BTreeMap::new(),
                schema_id: "schema".into(),
                cred_def_id: "cred_def".into(),
                rev_reg_id: None,
                cred_rev_id: None,
            },
            interval: None,
        }
    }

    fn referent_of(c: Option<&RequestedCredential>) -> Option<&str> {
        c.map(|c| c.cred_info.referent.as_str())
    }

    #[test]
    fn test_first_and_newest() {
        let candidates = vec![candidate("a"), candidate("b"), candidate("c")];
        assert_eq!(referent_of(SelectionPolicy::first().select("attr1_referent", &candidates)), Some("a"));
        assert_eq!(referent_of(SelectionPolicy::newest().select("attr1_referent", &candidates)), Some("c"));
    }

    #[test]
    fn test_per_referent_with_fallback() {
        let candidates = vec![candidate("a"), candidate("b")];
        let policy = SelectionPolicy::per_referent(BTreeMap::from([
            ("attr3_referent".to_string(), 1),
            ("attr4_referent".to_string(), 7),
        ]));
        assert_eq!(referent_of(policy.select("attr3_referent", &candidates)), Some("b"));
        assert_eq!(referent_of(policy.select("attr4_referent", &candidates)), Some("a"));
        assert_eq!(referent_of(policy.select("predicate1_referent", &candidates)), Some("a"));
    }

    #[test]
    fn test_empty_candidates() {
        assert!(SelectionPolicy::newest().select("attr1_referent", &[]).is_none());
    }

    #[test]
    fn test_from_config() {
        let config = SelectionConfig {
            policy: SelectionPolicyKind::PerReferent,
            per_referent: BTreeMap::from([("attr5_referent".to_string(), 1)]),
        };
        let policy = SelectionPolicy::from_config(&config);
        assert_eq!(policy.kind(), SelectionPolicyKind::PerReferent);
    }
}
