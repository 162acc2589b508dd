//! Node registry: dense integer ids for (account, bank) pairs.

use crate::error::{GraphGuardError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Escape character used in persisted composite keys.
const ESCAPE: char = '\\';

/// Structured identity of a graph node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    pub account: String,
    pub bank: String,
}

impl NodeKey {
    pub fn new(account: impl Into<String>, bank: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            bank: bank.into(),
        }
    }

    /// Render as `"{account}{delim}{bank}"`, escaping any occurrence of the
    /// delimiter or the escape character inside either field so that
    /// distinct keys never render to the same string.
    pub fn composite(&self, delim: char) -> String {
        let mut out = String::with_capacity(self.account.len() + self.bank.len() + 1);
        push_escaped(&mut out, &self.account, delim);
        out.push(delim);
        push_escaped(&mut out, &self.bank, delim);
        out
    }

    /// Inverse of [`NodeKey::composite`]. Splits on the first unescaped
    /// delimiter.
    pub fn parse_composite(raw: &str, delim: char) -> Option<Self> {
        let mut account = String::new();
        let mut bank = String::new();
        let mut in_bank = false;
        let mut chars = raw.chars();

        while let Some(c) = chars.next() {
            let target = if in_bank { &mut bank } else { &mut account };
            if c == ESCAPE {
                target.push(chars.next()?);
            } else if c == delim && !in_bank {
                in_bank = true;
            } else {
                target.push(c);
            }
        }

        in_bank.then_some(Self { account, bank })
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.composite('_'))
    }
}

fn push_escaped(out: &mut String, field: &str, delim: char) {
    for c in field.chars() {
        if c == delim || c == ESCAPE {
            out.push(ESCAPE);
        }
        out.push(c);
    }
}

/// How ids are assigned to distinct keys at fit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdOrder {
    /// Sorted by the persisted composite key string.
    #[default]
    Lexicographic,
    /// Order of first appearance in the fitted sequence.
    FirstSeen,
}

/// Bijective mapping between node keys and dense ids `0..len`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeRegistry {
    keys: Vec<NodeKey>,
    index: HashMap<NodeKey, usize>,
    /// Account number → node ids at every bank holding it, in id order
    by_account: HashMap<String, Vec<usize>>,
}

impl NodeRegistry {
    /// Fit a registry over every endpoint key of the ledger.
    ///
    /// The sequence is not expected to be de-duplicated; repeats are
    /// collapsed. Output is a pure function of the input sequence, `order`
    /// and `delim`.
    pub fn fit<'a, I>(keys: I, order: IdOrder, delim: char) -> Self
    where
        I: IntoIterator<Item = &'a NodeKey>,
    {
        let distinct: Vec<NodeKey> = match order {
            IdOrder::Lexicographic => {
                let mut sorted: Vec<(String, NodeKey)> = keys
                    .into_iter()
                    .collect::<HashSet<_>>()
                    .into_iter()
                    .map(|k| (k.composite(delim), k.clone()))
                    .collect();
                // composite rendering is injective, so this order is total
                sorted.sort_unstable_by(|a, b| a.0.cmp(&b.0));
                sorted.into_iter().map(|(_, k)| k).collect()
            }
            IdOrder::FirstSeen => {
                let mut seen = HashSet::new();
                keys.into_iter()
                    .filter(|k| seen.insert(*k))
                    .cloned()
                    .collect()
            }
        };

        Self::from_distinct(distinct)
    }

    /// Rebuild a registry from a persisted id-ordered key list.
    pub fn from_keys(keys: Vec<NodeKey>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(keys.len());
        for key in &keys {
            if !seen.insert(key) {
                return Err(GraphGuardError::DuplicateNode(key.to_string()));
            }
        }
        Ok(Self::from_distinct(keys))
    }

    fn from_distinct(keys: Vec<NodeKey>) -> Self {
        let mut index = HashMap::with_capacity(keys.len());
        let mut by_account: HashMap<String, Vec<usize>> = HashMap::new();
        for (id, key) in keys.iter().enumerate() {
            index.insert(key.clone(), id);
            by_account.entry(key.account.clone()).or_default().push(id);
        }
        Self {
            keys,
            index,
            by_account,
        }
    }

    /// Id of a key seen at fit time.
    pub fn transform(&self, key: &NodeKey) -> Result<usize> {
        self.index
            .get(key)
            .copied()
            .ok_or_else(|| GraphGuardError::NodeNotFound(key.to_string()))
    }

    /// Key for an id.
    pub fn key(&self, id: usize) -> Result<&NodeKey> {
        self.keys.get(id).ok_or(GraphGuardError::NodeIdOutOfRange {
            id,
            num_nodes: self.keys.len(),
        })
    }

    /// All node ids whose account number matches, in id order. The same
    /// account number may exist at several banks.
    pub fn ids_for_account(&self, account: &str) -> &[usize] {
        self.by_account
            .get(account)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Keys in id order.
    pub fn keys(&self) -> &[NodeKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(raw: &[(&str, &str)]) -> Vec<NodeKey> {
        raw.iter().map(|(a, b)| NodeKey::new(*a, *b)).collect()
    }

    #[test]
    fn test_lexicographic_fit() {
        let seq = keys(&[("C", "1"), ("A", "2"), ("C", "1"), ("B", "1"), ("A", "1")]);
        let registry = NodeRegistry::fit(&seq, IdOrder::Lexicographic, '_');

        assert_eq!(registry.len(), 4);
        assert_eq!(registry.transform(&NodeKey::new("A", "1")).unwrap(), 0);
        assert_eq!(registry.transform(&NodeKey::new("A", "2")).unwrap(), 1);
        assert_eq!(registry.transform(&NodeKey::new("B", "1")).unwrap(), 2);
        assert_eq!(registry.transform(&NodeKey::new("C", "1")).unwrap(), 3);
    }

    #[test]
    fn test_first_seen_fit() {
        let seq = keys(&[("C", "1"), ("A", "2"), ("C", "1"), ("B", "1")]);
        let registry = NodeRegistry::fit(&seq, IdOrder::FirstSeen, '_');

        let order: Vec<_> = registry.keys().iter().map(|k| k.account.as_str()).collect();
        assert_eq!(order, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_bijective() {
        let seq = keys(&[("X", "9"), ("Y", "9"), ("X", "8"), ("Y", "9")]);
        let registry = NodeRegistry::fit(&seq, IdOrder::Lexicographic, '_');

        for id in 0..registry.len() {
            let key = registry.key(id).unwrap();
            assert_eq!(registry.transform(key).unwrap(), id);
        }
    }

    #[test]
    fn test_unknown_key() {
        let registry = NodeRegistry::fit(&keys(&[("A", "1")]), IdOrder::Lexicographic, '_');
        let err = registry.transform(&NodeKey::new("Z", "1")).unwrap_err();
        assert!(matches!(err, GraphGuardError::NodeNotFound(_)));
        assert!(registry.key(5).is_err());
    }

    #[test]
    fn test_delimiter_collision_is_escaped() {
        // "A_B" @ "C" vs "A" @ "B_C" collide under a raw join
        let left = NodeKey::new("A_B", "C");
        let right = NodeKey::new("A", "B_C");

        assert_ne!(left.composite('_'), right.composite('_'));
        assert_eq!(NodeKey::parse_composite(&left.composite('_'), '_'), Some(left.clone()));
        assert_eq!(NodeKey::parse_composite(&right.composite('_'), '_'), Some(right));
        assert_eq!(left.composite('_'), "A\\_B_C");
    }

    #[test]
    fn test_parse_plain_composite() {
        assert_eq!(
            NodeKey::parse_composite("8000EBD30_10", '_'),
            Some(NodeKey::new("8000EBD30", "10"))
        );
        assert_eq!(NodeKey::parse_composite("no-delimiter", '_'), None);
    }

    #[test]
    fn test_from_keys_rejects_duplicates() {
        let err = NodeRegistry::from_keys(keys(&[("A", "1"), ("A", "1")])).unwrap_err();
        assert!(matches!(err, GraphGuardError::DuplicateNode(_)));
    }

    #[test]
    fn test_ids_for_account() {
        let registry =
            NodeRegistry::fit(&keys(&[("A", "1"), ("A", "2"), ("B", "1")]), IdOrder::Lexicographic, '_');
        assert_eq!(registry.ids_for_account("A"), &[0, 1]);
        assert!(registry.ids_for_account("Q").is_empty());

        // rebuilt from a persisted mapping, the lookup follows the stored ids
        let reloaded = NodeRegistry::from_keys(keys(&[("B", "1"), ("A", "2"), ("A", "1")])).unwrap();
        assert_eq!(reloaded.ids_for_account("A"), &[1, 2]);
        assert_eq!(reloaded.ids_for_account("B"), &[0]);
    }

    #[test]
    fn test_lexicographic_order_follows_composite_key() {
        // "800_2" > "8000_1" because '_' sorts after the digits
        let seq = keys(&[("800", "2"), ("8000", "1"), ("80", "3")]);
        let registry = NodeRegistry::fit(&seq, IdOrder::Lexicographic, '_');

        let rendered: Vec<String> = registry.keys().iter().map(|k| k.composite('_')).collect();
        let mut sorted = rendered.clone();
        sorted.sort();
        assert_eq!(rendered, sorted);
        assert_eq!(rendered, vec!["8000_1", "800_2", "80_3"]);
    }
}
