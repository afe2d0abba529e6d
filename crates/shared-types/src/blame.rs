//! Attribution of a failed threshold round.

use serde::{Deserialize, Serialize};

/// One blamed participant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlameNode {
    /// Node public key (bech32)
    #[serde(default)]
    pub pubkey: String,
}

/// Blame returned by the threshold service when a round fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blame {
    /// Free-form reason
    #[serde(default)]
    pub fail_reason: String,
    /// Nodes held responsible
    #[serde(default)]
    pub blame_nodes: Vec<BlameNode>,
}

impl Blame {
    /// Build a blame from a reason and node keys.
    pub fn new(fail_reason: impl Into<String>, nodes: &[&str]) -> Self {
        Self {
            fail_reason: fail_reason.into(),
            blame_nodes: nodes
                .iter()
                .map(|pk| BlameNode {
                    pubkey: (*pk).to_string(),
                })
                .collect(),
        }
    }

    /// A blame naming nobody cannot be attributed.
    pub fn is_empty(&self) -> bool {
        self.blame_nodes.is_empty()
    }
}

impl std::fmt::Display for Blame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let nodes: Vec<&str> = self.blame_nodes.iter().map(|n| n.pubkey.as_str()).collect();
        write!(f, "reason: {}, nodes: [{}]", self.fail_reason, nodes.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blame_is_empty() {
        assert!(Blame::default().is_empty());
        assert!(Blame::new("timeout", &[]).is_empty());
        assert!(!Blame::new("timeout", &["n3"]).is_empty());
    }

    #[test]
    fn test_blame_display() {
        let blame = Blame::new("timeout", &["n3", "n4"]);
        assert_eq!(blame.to_string(), "reason: timeout, nodes: [n3, n4]");
    }

    #[test]
    fn test_blame_tolerates_missing_fields() {
        let blame: Blame = serde_json::from_str(r#"{"fail_reason":"x"}"#).unwrap();
        assert!(blame.is_empty());
    }
}
