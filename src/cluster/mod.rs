//! Incremental speaker identity assignment for live transcript display.
//!
//! Each incoming transcript segment carries an optional fixed-dimension
//! speaker embedding. Segments are assigned to persistent identities by
//! nearest-centroid cosine similarity in a single pass: already-displayed
//! segments are never revisited or reassigned, so the registry only ever
//! grows until it is reset wholesale.

use serde::Serialize;
use tracing::debug;

/// Embedding dimension produced by the backend's prosody extractor.
pub const EMBEDDING_DIM: usize = 8;

/// Stable opaque identifier for a speaker within one conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct SpeakerId(pub u32);

impl std::fmt::Display for SpeakerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "spk_{}", self.0)
    }
}

/// Tuning for the assignment heuristic.
///
/// The two-regime learning rate is load-bearing: a fresh cluster must
/// converge quickly from a single noisy sample, while an established
/// cluster's identity must not drift.
#[derive(Clone, Debug)]
pub struct ClusterConfig {
    /// Minimum cosine similarity for assignment to an existing cluster
    pub threshold: f32,

    /// Learning rate while a cluster has fewer than `fast_assignments`
    pub fast_rate: f32,

    /// Learning rate once a cluster is established
    pub slow_rate: f32,

    /// Number of initial assignments that use the fast rate
    pub fast_assignments: u32,

    /// Expected embedding dimension
    pub dim: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            threshold: 0.85,
            fast_rate: 0.3,
            slow_rate: 0.05,
            fast_assignments: 5,
            dim: EMBEDDING_DIM,
        }
    }
}

impl ClusterConfig {
    /// Set the assignment threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the expected embedding dimension
    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = dim;
        self
    }
}

/// Persistent identity assigned to a voice across segments.
#[derive(Clone, Debug)]
pub struct SpeakerCluster {
    /// Stable identifier, assigned sequentially
    pub id: SpeakerId,

    /// Running mean of all vectors assigned to this cluster
    pub centroid: Vec<f32>,

    /// Number of vectors folded into the centroid so far
    pub count: u32,

    /// Human label, auto-generated and user-renameable
    pub display_name: String,

    /// Best-known voice category (e.g. inferred gender), adopted
    /// opportunistically from segment metadata
    pub category: Option<String>,
}

/// Cosine similarity between two vectors; 0 if either has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn display_name_for(index: usize) -> String {
    if index < 26 {
        format!("Speaker {}", (b'A' + index as u8) as char)
    } else {
        format!("Speaker {}", index + 1)
    }
}

/// Registry of speaker identities for one conversation.
///
/// Iteration order over clusters is creation order; similarity ties are
/// therefore broken in favor of the earliest-created cluster.
pub struct SpeakerRegistry {
    config: ClusterConfig,
    clusters: Vec<SpeakerCluster>,
    next_id: u32,
    // Index of the identity the turn-based fallback is currently on
    active: Option<usize>,
}

impl SpeakerRegistry {
    /// Create an empty registry.
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            config,
            clusters: Vec::new(),
            next_id: 0,
            active: None,
        }
    }

    /// Assign a segment to a speaker identity by its embedding vector.
    ///
    /// An absent or wrong-dimension vector is substituted with the zero
    /// vector (a neutral, always-lowest-similarity input); this operation
    /// never fails. The matched cluster's centroid is updated with the
    /// adaptive learning rate; if no cluster is close enough a new one is
    /// created, seeded with the vector itself.
    pub fn identify(&mut self, vector: Option<&[f32]>, category: Option<&str>) -> &SpeakerCluster {
        let v: Vec<f32> = match vector {
            Some(v) if v.len() == self.config.dim => v.to_vec(),
            _ => vec![0.0; self.config.dim],
        };

        let mut best_index = None;
        let mut best_sim = f32::NEG_INFINITY;
        for (i, cluster) in self.clusters.iter().enumerate() {
            let sim = cosine_similarity(&v, &cluster.centroid);
            if sim > best_sim {
                best_sim = sim;
                best_index = Some(i);
            }
        }

        let index = match best_index {
            Some(i) if best_sim >= self.config.threshold => {
                self.update_cluster(i, &v, category);
                i
            }
            _ => self.create_cluster(v, category),
        };

        self.active = Some(index);
        &self.clusters[index]
    }

    /// Fallback identity assignment for segments without an embedding.
    ///
    /// `turn_boundary` is the previous segment's speaker-turn flag: when
    /// set (or when no identity exists yet) the registry advances to a
    /// fresh identity; otherwise the current identity is kept.
    pub fn identify_by_turn(&mut self, turn_boundary: bool) -> &SpeakerCluster {
        let index = match self.active {
            Some(i) if !turn_boundary => i,
            _ => self.create_cluster(vec![0.0; self.config.dim], None),
        };
        self.active = Some(index);
        &self.clusters[index]
    }

    fn update_cluster(&mut self, index: usize, v: &[f32], category: Option<&str>) {
        let cluster = &mut self.clusters[index];
        let lr = if cluster.count < self.config.fast_assignments {
            self.config.fast_rate
        } else {
            self.config.slow_rate
        };
        for (c, x) in cluster.centroid.iter_mut().zip(v.iter()) {
            *c = *c * (1.0 - lr) + x * lr;
        }
        cluster.count += 1;

        if cluster.category.is_none() {
            if let Some(cat) = category.filter(|c| !c.is_empty() && *c != "?") {
                cluster.category = Some(cat.to_string());
            }
        }
    }

    fn create_cluster(&mut self, centroid: Vec<f32>, category: Option<&str>) -> usize {
        let index = self.clusters.len();
        let id = SpeakerId(self.next_id);
        self.next_id += 1;

        let cluster = SpeakerCluster {
            id,
            centroid,
            count: 1,
            display_name: display_name_for(index),
            category: category
                .filter(|c| !c.is_empty() && *c != "?")
                .map(|c| c.to_string()),
        };
        debug!("New speaker identity {} ({})", cluster.display_name, id);
        self.clusters.push(cluster);
        index
    }

    /// Reconfigure the assignment threshold; applies from the next
    /// `identify` call without reassigning past observations.
    pub fn set_threshold(&mut self, threshold: f32) {
        self.config.threshold = threshold;
    }

    /// Rename a speaker. Returns false if the id is unknown.
    pub fn rename(&mut self, id: SpeakerId, name: impl Into<String>) -> bool {
        match self.clusters.iter_mut().find(|c| c.id == id) {
            Some(cluster) => {
                cluster.display_name = name.into();
                true
            }
            None => false,
        }
    }

    /// Look up a cluster by id.
    pub fn get(&self, id: SpeakerId) -> Option<&SpeakerCluster> {
        self.clusters.iter().find(|c| c.id == id)
    }

    /// All clusters in creation order.
    pub fn clusters(&self) -> &[SpeakerCluster] {
        &self.clusters
    }

    /// Number of identities created so far.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Whether the registry holds no identities.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Clear the registry and the identity counter for a new conversation.
    pub fn reset(&mut self) {
        debug!("Resetting speaker registry ({} identities)", self.clusters.len());
        self.clusters.clear();
        self.next_id = 0;
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dir: usize) -> Vec<f32> {
        let mut v = vec![0.0; EMBEDDING_DIM];
        v[dir] = 1.0;
        v
    }

    #[test]
    fn test_cosine_similarity() {
        let a = unit(0);
        let b = unit(0);
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);

        let c = unit(1);
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);

        let neg: Vec<f32> = a.iter().map(|x| -x).collect();
        assert!((cosine_similarity(&a, &neg) + 1.0).abs() < 1e-6);

        // Zero norm yields 0, not NaN
        assert_eq!(cosine_similarity(&[0.0; 8], &a), 0.0);
    }

    #[test]
    fn test_same_vector_lands_in_one_cluster() {
        let mut registry = SpeakerRegistry::new(ClusterConfig::default().with_threshold(0.5));
        let v = unit(0);
        let first = registry.identify(Some(&v), None).id;
        let second = registry.identify(Some(&v), None).id;
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_opposite_vectors_create_two_clusters() {
        let mut registry = SpeakerRegistry::new(ClusterConfig::default());
        let v = unit(0);
        let neg: Vec<f32> = v.iter().map(|x| -x).collect();
        let a = registry.identify(Some(&v), None).id;
        let b = registry.identify(Some(&neg), None).id;
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_centroid_update_rule() {
        let mut registry = SpeakerRegistry::new(ClusterConfig::default().with_threshold(0.5));
        let v1 = vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let v2 = vec![0.8, 0.6, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];

        // Seeding: centroid equals the vector exactly
        let cluster = registry.identify(Some(&v1), None);
        assert_eq!(cluster.centroid, v1);
        assert_eq!(cluster.count, 1);

        // Second assignment at the fast rate: 0.7*v1 + 0.3*v2
        let cluster = registry.identify(Some(&v2), None);
        assert_eq!(cluster.count, 2);
        for (i, c) in cluster.centroid.iter().enumerate() {
            let expected = 0.7 * v1[i] + 0.3 * v2[i];
            assert!((c - expected).abs() < 1e-6, "component {}", i);
        }
    }

    #[test]
    fn test_learning_rate_slows_down() {
        let mut registry = SpeakerRegistry::new(ClusterConfig::default().with_threshold(0.0));
        let v = unit(0);
        // Assignments 1-5 use the fast rate
        for _ in 0..5 {
            registry.identify(Some(&v), None);
        }
        let established = registry.clusters()[0].centroid.clone();

        // With an identical vector the centroid is already converged; a
        // perturbed vector now only moves it by the slow rate
        let mut off = v.clone();
        off[1] = 1.0;
        let cluster = registry.identify(Some(&off), None);
        assert!((cluster.centroid[1] - (established[1] * 0.95 + 0.05)).abs() < 1e-6);
    }

    #[test]
    fn test_missing_or_wrong_dimension_never_fails() {
        let mut registry = SpeakerRegistry::new(ClusterConfig::default());
        let a = registry.identify(None, None).id;
        // A zero vector has similarity 0 to everything, below threshold
        let b = registry.identify(Some(&[1.0, 2.0]), None).id;
        assert_ne!(a, b);
        assert_eq!(registry.clusters()[0].centroid, vec![0.0; EMBEDDING_DIM]);
    }

    #[test]
    fn test_tie_break_earliest_cluster() {
        let mut registry = SpeakerRegistry::new(ClusterConfig::default());
        let v = unit(0);
        let first = registry.identify(Some(&v), None).id;

        // An unreachable threshold forces a second cluster with an
        // identical centroid, then both tie at similarity 1.0
        registry.set_threshold(1.1);
        let second = registry.identify(Some(&v), None).id;
        assert_ne!(first, second);

        registry.set_threshold(0.5);
        let assigned = registry.identify(Some(&v), None).id;
        assert_eq!(assigned, first);
    }

    #[test]
    fn test_display_names_sequential() {
        let mut registry = SpeakerRegistry::new(ClusterConfig::default());
        registry.identify(Some(&unit(0)), None);
        registry.identify(Some(&unit(1)), None);
        assert_eq!(registry.clusters()[0].display_name, "Speaker A");
        assert_eq!(registry.clusters()[1].display_name, "Speaker B");
    }

    #[test]
    fn test_rename() {
        let mut registry = SpeakerRegistry::new(ClusterConfig::default());
        let id = registry.identify(Some(&unit(0)), None).id;
        assert!(registry.rename(id, "Alice"));
        assert_eq!(registry.get(id).unwrap().display_name, "Alice");
        assert!(!registry.rename(SpeakerId(99), "Bob"));
    }

    #[test]
    fn test_category_adopted_once() {
        let mut registry = SpeakerRegistry::new(ClusterConfig::default().with_threshold(0.5));
        let v = unit(0);
        // "?" is uninformative and must not be adopted
        registry.identify(Some(&v), Some("?"));
        assert_eq!(registry.clusters()[0].category, None);

        registry.identify(Some(&v), Some("F"));
        assert_eq!(registry.clusters()[0].category.as_deref(), Some("F"));

        // An established category is not overwritten
        registry.identify(Some(&v), Some("M"));
        assert_eq!(registry.clusters()[0].category.as_deref(), Some("F"));
    }

    #[test]
    fn test_reset_clears_identity_counter() {
        let mut registry = SpeakerRegistry::new(ClusterConfig::default());
        registry.identify(Some(&unit(0)), None);
        registry.identify(Some(&unit(1)), None);
        registry.reset();
        assert!(registry.is_empty());

        let id = registry.identify(Some(&unit(0)), None).id;
        assert_eq!(id, SpeakerId(0));
        assert_eq!(registry.clusters()[0].display_name, "Speaker A");
    }

    #[test]
    fn test_turn_fallback_alternation() {
        let mut registry = SpeakerRegistry::new(ClusterConfig::default());

        // First embedding-less segment creates an identity
        let a = registry.identify_by_turn(false).id;
        // Same turn continues on the same identity
        assert_eq!(registry.identify_by_turn(false).id, a);
        // A turn boundary advances to a fresh identity
        let b = registry.identify_by_turn(true).id;
        assert_ne!(a, b);
        assert_eq!(registry.identify_by_turn(false).id, b);
    }
}
