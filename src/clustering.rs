// 🔗 Identity Clusterer - group party mentions into canonical persons
//
// Mentions are nodes; every match rule contributes edges; connected
// components are persons. Components are tracked with a disjoint-set
// (parent + size arrays over mention indices) rather than a materialized graph.
//
// Two mentions share a person_id iff a chain of rule matches connects them.
// Identifiers depend on the run seed, the partition does not.

use crate::entities::Person;
use crate::parties::PartyMention;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

// ============================================================================
// RUN SEED
// ============================================================================

/// Run-scoped random token mixed into every generated identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSeed(Uuid);

impl RunSeed {
    pub fn random() -> Self {
        RunSeed(Uuid::new_v4())
    }

    pub fn from_u128(value: u128) -> Self {
        RunSeed(Uuid::from_u128(value))
    }
}

impl fmt::Display for RunSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

// ============================================================================
// DISJOINT SET
// ============================================================================

#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    pub fn new(len: usize) -> Self {
        DisjointSet {
            parent: (0..len).collect(),
            size: vec![1; len],
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        // Path compression
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }

        root
    }

    /// Merge the sets of `a` and `b`; returns false if already together
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }

        // Union by size
        let (big, small) = if self.size[ra] >= self.size[rb] { (ra, rb) } else { (rb, ra) };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        true
    }

    /// Components with members ascending, ordered by their smallest member
    pub fn components(&mut self) -> Vec<Vec<usize>> {
        let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
        let mut components: Vec<Vec<usize>> = Vec::new();

        for node in 0..self.len() {
            let root = self.find(node);
            let slot = *slot_of_root.entry(root).or_insert_with(|| {
                components.push(Vec::new());
                components.len() - 1
            });
            components[slot].push(node);
        }

        components
    }
}

// ============================================================================
// MATCH RULES
// ============================================================================

/// A matching rule proposes edges between mentions believed to be the same person.
///
/// Rules only add edges; the partition is always the connected components of
/// the union of all rules' edges.
pub trait MatchRule {
    fn name(&self) -> &str;

    fn edges(&self, mentions: &[PartyMention]) -> Vec<(usize, usize)>;
}

/// Exact equality of normalized aliases.
///
/// A group of k mentions sharing an alias yields k-1 edges to the group's
/// first member, which connects the group exactly as all pairs would.
#[derive(Debug, Clone, Copy, Default)]
pub struct AliasEqualityRule;

impl MatchRule for AliasEqualityRule {
    fn name(&self) -> &str {
        "alias_equality"
    }

    fn edges(&self, mentions: &[PartyMention]) -> Vec<(usize, usize)> {
        let mut first_with_alias: HashMap<String, usize> = HashMap::new();
        let mut edges = Vec::new();

        for (index, mention) in mentions.iter().enumerate() {
            let Some(key) = mention.alias_key() else {
                continue;
            };
            match first_with_alias.get(&key) {
                Some(&first) => edges.push((first, index)),
                None => {
                    first_with_alias.insert(key, index);
                }
            }
        }

        edges
    }
}

// ============================================================================
// CLUSTERER
// ============================================================================

pub struct IdentityClusterer {
    rules: Vec<Box<dyn MatchRule>>,
}

impl IdentityClusterer {
    /// Clusterer with the shipped rule set (alias equality)
    pub fn new() -> Self {
        IdentityClusterer {
            rules: vec![Box::new(AliasEqualityRule)],
        }
    }

    /// Clusterer with no rules: every mention is its own person
    pub fn empty() -> Self {
        IdentityClusterer { rules: Vec::new() }
    }

    pub fn with_rule<R: MatchRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn cluster(&self, mentions: &[PartyMention], seed: RunSeed) -> Clustering {
        let mut sets = DisjointSet::new(mentions.len());

        for rule in &self.rules {
            let edges = rule.edges(mentions);
            let mut merges = 0usize;
            for (a, b) in edges.iter().copied() {
                if a < mentions.len() && b < mentions.len() && sets.union(a, b) {
                    merges += 1;
                }
            }
            debug!(rule = rule.name(), edges = edges.len(), merges, "applied match rule");
        }

        let clustering = Clustering::from_components(sets.components(), mentions.len(), seed);

        info!(
            mentions = mentions.len(),
            persons = clustering.clusters.len(),
            merged_clusters = clustering.merged_count(),
            "identity clustering complete"
        );

        clustering
    }
}

impl Default for IdentityClusterer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// CLUSTERING RESULT
// ============================================================================

#[derive(Debug, Clone)]
pub struct Clustering {
    /// person_id per mention index
    person_ids: Vec<String>,

    /// Mention indexes per person, ordered by first mention
    clusters: Vec<Vec<usize>>,
}

impl Clustering {
    fn from_components(clusters: Vec<Vec<usize>>, len: usize, seed: RunSeed) -> Self {
        let mut person_ids = vec![String::new(); len];
        let mut ordinal = 0usize;

        for members in &clusters {
            let id = if members.len() > 1 {
                let id = format!("ENTITY_{}_{}", ordinal, seed);
                ordinal += 1;
                id
            } else {
                format!("{}_{}", seed, members[0])
            };

            for &member in members {
                person_ids[member] = id.clone();
            }
        }

        Clustering {
            person_ids,
            clusters,
        }
    }

    pub fn person_id(&self, mention: usize) -> Option<&str> {
        self.person_ids.get(mention).map(|s| s.as_str())
    }

    pub fn person_ids(&self) -> &[String] {
        &self.person_ids
    }

    pub fn same_cluster(&self, a: usize, b: usize) -> bool {
        match (self.person_ids.get(a), self.person_ids.get(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    pub fn clusters(&self) -> &[Vec<usize>] {
        &self.clusters
    }

    /// Clusters holding two or more mentions
    pub fn merged_count(&self) -> usize {
        self.clusters.iter().filter(|c| c.len() > 1).count()
    }

    /// SHA-256 of the partition itself; equal across runs with different seeds
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for members in &self.clusters {
            let line = members
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(",");
            hasher.update(line.as_bytes());
            hasher.update(b";");
        }
        format!("{:x}", hasher.finalize())
    }

    /// One Person per cluster, in cluster order
    pub fn persons(&self, mentions: &[PartyMention]) -> Vec<Person> {
        self.clusters
            .iter()
            .map(|members| {
                Person::from_mentions(
                    self.person_ids[members[0]].clone(),
                    members.iter().map(|&m| &mentions[m]),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parties::PartyRole;

    fn mention(alias: Option<&str>) -> PartyMention {
        PartyMention {
            alias: alias.map(String::from),
            location: None,
            phone: None,
            sex: None,
            birthdate: None,
            occupation: None,
            role: PartyRole::Sender,
        }
    }

    fn mentions(aliases: &[Option<&str>]) -> Vec<PartyMention> {
        aliases.iter().map(|a| mention(*a)).collect()
    }

    /// Links mentions sharing a phone number (test-only rule)
    struct SamePhoneRule;

    impl MatchRule for SamePhoneRule {
        fn name(&self) -> &str {
            "same_phone"
        }

        fn edges(&self, mentions: &[PartyMention]) -> Vec<(usize, usize)> {
            let mut edges = Vec::new();
            for i in 0..mentions.len() {
                for j in (i + 1)..mentions.len() {
                    if mentions[i].phone.is_some() && mentions[i].phone == mentions[j].phone {
                        edges.push((i, j));
                    }
                }
            }
            edges
        }
    }

    #[test]
    fn test_disjoint_set_union_find() {
        let mut sets = DisjointSet::new(6);
        assert!(sets.union(0, 3));
        assert!(sets.union(3, 5));
        assert!(!sets.union(5, 0));
        assert!(sets.union(1, 2));

        assert_eq!(sets.find(0), sets.find(5));
        assert_ne!(sets.find(0), sets.find(1));
        assert_eq!(sets.components(), vec![vec![0, 3, 5], vec![1, 2], vec![4]]);
    }

    #[test]
    fn test_alias_equality_closure() {
        let ms = mentions(&[Some("john doe"), Some("john doe"), Some("jane roe")]);
        let clustering = IdentityClusterer::new().cluster(&ms, RunSeed::from_u128(1));

        assert!(clustering.same_cluster(0, 1));
        assert!(!clustering.same_cluster(0, 2));
        assert_eq!(clustering.clusters(), &[vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_distinct_alias_never_joins_chain() {
        let ms = mentions(&[Some("a"), Some("a"), Some("b"), Some("a")]);
        let clustering = IdentityClusterer::new().cluster(&ms, RunSeed::from_u128(1));

        assert_eq!(clustering.clusters(), &[vec![0, 1, 3], vec![2]]);
    }

    #[test]
    fn test_alias_normalization_before_matching() {
        let ms = mentions(&[Some("Abebe  Kebede"), Some(" abebe kebede ")]);
        let clustering = IdentityClusterer::new().cluster(&ms, RunSeed::from_u128(1));

        assert!(clustering.same_cluster(0, 1));
    }

    #[test]
    fn test_missing_aliases_are_always_singletons() {
        let ms = mentions(&[None, None, Some(""), Some("  ")]);
        let clustering = IdentityClusterer::new().cluster(&ms, RunSeed::from_u128(1));

        assert_eq!(clustering.clusters().len(), 4);
        assert_eq!(clustering.merged_count(), 0);
    }

    #[test]
    fn test_partition_is_equivalence_relation() {
        let ms = mentions(&[Some("a"), Some("b"), Some("a"), None, Some("b"), Some("c")]);
        let c = IdentityClusterer::new().cluster(&ms, RunSeed::from_u128(9));
        let n = ms.len();

        for i in 0..n {
            assert!(c.same_cluster(i, i));
            for j in 0..n {
                assert_eq!(c.same_cluster(i, j), c.same_cluster(j, i));
                for k in 0..n {
                    if c.same_cluster(i, j) && c.same_cluster(j, k) {
                        assert!(c.same_cluster(i, k));
                    }
                }
            }
        }
    }

    #[test]
    fn test_identifiers_change_partition_does_not() {
        let ms = mentions(&[Some("a"), Some("b"), Some("a"), None]);
        let clusterer = IdentityClusterer::new();

        let first = clusterer.cluster(&ms, RunSeed::from_u128(1));
        let second = clusterer.cluster(&ms, RunSeed::from_u128(2));

        assert_ne!(first.person_id(0), second.person_id(0));
        assert_eq!(first.clusters(), second.clusters());
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn test_identifier_shapes() {
        let seed = RunSeed::from_u128(0xabc);
        let ms = mentions(&[Some("a"), Some("b"), Some("a")]);
        let clustering = IdentityClusterer::new().cluster(&ms, seed);

        assert_eq!(clustering.person_id(0), Some(format!("ENTITY_0_{}", seed).as_str()));
        assert_eq!(clustering.person_id(2), clustering.person_id(0));
        assert_eq!(clustering.person_id(1), Some(format!("{}_1", seed).as_str()));
        assert_eq!(seed.to_string().len(), 32);
    }

    #[test]
    fn test_extra_rule_merges_across_aliases() {
        let mut ms = mentions(&[Some("abebe"), Some("abebe k"), Some("sara")]);
        ms[0].phone = Some("251911000000".to_string());
        ms[1].phone = Some("251911000000".to_string());

        let clusterer = IdentityClusterer::new().with_rule(SamePhoneRule);
        assert_eq!(clusterer.rule_names(), vec!["alias_equality", "same_phone"]);

        let clustering = clusterer.cluster(&ms, RunSeed::from_u128(3));
        assert!(clustering.same_cluster(0, 1));
        assert!(!clustering.same_cluster(1, 2));
    }

    #[test]
    fn test_persons_follow_clusters() {
        let ms = mentions(&[Some("x"), Some("y"), Some("x")]);
        let clustering = IdentityClusterer::new().cluster(&ms, RunSeed::from_u128(5));
        let persons = clustering.persons(&ms);

        assert_eq!(persons.len(), 2);
        assert_eq!(persons[0].person_id, clustering.person_id(0).unwrap());
        assert!(persons[0].aliases.contains("x"));
        assert!(persons[1].aliases.contains("y"));
    }

    #[test]
    fn test_empty_clusterer_keeps_everyone_apart() {
        let ms = mentions(&[Some("a"), Some("a")]);
        let clustering = IdentityClusterer::empty().cluster(&ms, RunSeed::from_u128(1));
        assert_eq!(clustering.clusters().len(), 2);
    }
}
