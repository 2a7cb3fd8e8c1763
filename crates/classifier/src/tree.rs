//! Native CART Decision Tree

use crate::{AmcClassifier, ClassifierError, FeatureArray, ModType, FEATURE_DIMENSION};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info, warn};

/// Tree growth parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeParams {
    /// Maximum depth of the tree (None = grow until pure or too small)
    pub max_depth: Option<usize>,
    /// Nodes with fewer samples than this become leaves
    pub min_sample_count: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_sample_count: 10,
        }
    }
}

/// Tree node stored in a flat arena; children always follow their parent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Leaf {
        label: ModType,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Persisted form of a trained tree
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TreeModel {
    params: TreeParams,
    nodes: Vec<Node>,
}

impl TreeModel {
    /// Reject arenas that could index out of bounds or loop
    fn validate(&self) -> Result<(), ClassifierError> {
        if self.nodes.is_empty() {
            return Err(ClassifierError::ModelLoad("tree has no nodes".to_string()));
        }
        for (id, node) in self.nodes.iter().enumerate() {
            if let Node::Split { feature, left, right, .. } = *node {
                let in_range = |child: usize| child > id && child < self.nodes.len();
                if feature >= FEATURE_DIMENSION || !in_range(left) || !in_range(right) {
                    return Err(ClassifierError::ModelLoad(format!("malformed split at node {}", id)));
                }
            }
        }
        Ok(())
    }
}

/// Candidate split found while growing
struct Split {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

/// CART decision tree using Gini impurity
pub struct DecisionTree {
    params: TreeParams,
    model: Option<TreeModel>,
}

impl DecisionTree {
    /// Create an untrained tree
    pub fn new(params: TreeParams) -> Self {
        Self { params, model: None }
    }

    /// Whether the tree has been trained or loaded
    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    /// Number of nodes in the trained tree
    pub fn node_count(&self) -> usize {
        self.model.as_ref().map_or(0, |m| m.nodes.len())
    }

    /// Depth of the trained tree (a single leaf has depth 0)
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, left).max(walk(nodes, right)),
            }
        }
        self.model.as_ref().map_or(0, |m| walk(&m.nodes, 0))
    }

    /// Get the growth parameters
    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    fn grow(
        &self,
        samples: &[FeatureArray],
        responses: &[ModType],
        indices: Vec<usize>,
        depth: usize,
        nodes: &mut Vec<Node>,
    ) -> usize {
        let counts = class_counts(&indices, responses);
        let label = ModType::majority(indices.iter().map(|&i| responses[i])).unwrap_or(ModType::ALL[0]);

        let id = nodes.len();
        nodes.push(Node::Leaf { label });

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let too_small = indices.len() < self.params.min_sample_count.max(2);
        let too_deep = self.params.max_depth.map_or(false, |max| depth >= max);
        if pure || too_small || too_deep {
            return id;
        }

        let split = match best_split(samples, responses, &indices, &counts) {
            Some(split) => split,
            None => return id,
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| samples[i][split.feature] <= split.threshold);

        let left = self.grow(samples, responses, left_idx, depth + 1, nodes);
        let right = self.grow(samples, responses, right_idx, depth + 1, nodes);
        nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new(TreeParams::default())
    }
}

fn class_counts(indices: &[usize], responses: &[ModType]) -> [usize; ModType::COUNT] {
    let mut counts = [0usize; ModType::COUNT];
    for &i in indices {
        counts[responses[i].index()] += 1;
    }
    counts
}

fn gini(counts: &[usize; ModType::COUNT], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / total).powi(2)).sum::<f64>()
}

fn best_split(
    samples: &[FeatureArray],
    responses: &[ModType],
    indices: &[usize],
    counts: &[usize; ModType::COUNT],
) -> Option<Split> {
    let n = indices.len();
    let parent = gini(counts, n);
    let mut best: Option<Split> = None;
    let mut order = indices.to_vec();

    for feature in 0..FEATURE_DIMENSION {
        order.sort_by(|&a, &b| samples[a][feature].total_cmp(&samples[b][feature]));

        let mut left = [0usize; ModType::COUNT];
        let mut right = *counts;
        for k in 0..n - 1 {
            let label = responses[order[k]].index();
            left[label] += 1;
            right[label] -= 1;

            let here = samples[order[k]][feature];
            let next = samples[order[k + 1]][feature];
            if here == next {
                continue;
            }

            let n_left = k + 1;
            let n_right = n - n_left;
            let impurity = (n_left as f64 * gini(&left, n_left) + n_right as f64 * gini(&right, n_right)) / n as f64;
            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                best = Some(Split {
                    feature,
                    threshold: here + (next - here) / 2.0,
                    impurity,
                });
            }
        }
    }

    best.filter(|b| b.impurity < parent - 1e-12)
}

impl AmcClassifier for DecisionTree {
    fn classify(&self, features: &FeatureArray) -> Result<ModType, ClassifierError> {
        let model = self.model.as_ref().ok_or(ClassifierError::NotReady)?;
        let mut id = 0;
        loop {
            match model.nodes[id] {
                Node::Leaf { label } => return Ok(label),
                Node::Split { feature, threshold, left, right } => {
                    // NaN compares false and falls to the right
                    id = if features[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    fn train(&mut self, samples: &[FeatureArray], responses: &[ModType]) -> Result<(), ClassifierError> {
        if samples.len() != responses.len() {
            return Err(ClassifierError::Training(format!(
                "{} samples but {} responses",
                samples.len(),
                responses.len()
            )));
        }

        let indices: Vec<usize> = (0..samples.len())
            .filter(|&i| samples[i].iter().all(|v| v.is_finite()))
            .collect();
        let skipped = samples.len() - indices.len();
        if skipped > 0 {
            warn!("Skipping {} training samples with non-finite features", skipped);
        }
        if indices.is_empty() {
            return Err(ClassifierError::Training("no finite training samples".to_string()));
        }

        info!("Training decision tree on {} samples ({:?})", indices.len(), self.params);
        let mut nodes = Vec::new();
        self.grow(samples, responses, indices, 0, &mut nodes);
        debug!("Decision tree grown with {} nodes", nodes.len());

        self.model = Some(TreeModel {
            params: self.params.clone(),
            nodes,
        });
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<(), ClassifierError> {
        let model = self.model.as_ref().ok_or(ClassifierError::NotReady)?;
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, model).map_err(|e| ClassifierError::ModelSave(e.to_string()))?;
        info!("Saved decision tree to {}", path.display());
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<(), ClassifierError> {
        let reader = BufReader::new(File::open(path)?);
        let model: TreeModel =
            serde_json::from_reader(reader).map_err(|e| ClassifierError::ModelLoad(e.to_string()))?;
        model.validate()?;
        info!("Loaded decision tree from {} ({} nodes)", path.display(), model.nodes.len());
        self.params = model.params.clone();
        self.model = Some(model);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "custom_tree"
    }
}
