//! Pre-fitted classifiers.
//!
//! Two model families are understood, matching what the training process can
//! export: a multinomial (or binary) logistic regression and a random forest of
//! axis-aligned decision trees. Both operate on an already-scaled vector and
//! return the class identifier at the winning position of their `classes` list.

use crate::pipeline::Classify;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A class identifier as emitted by a classifier, before label decoding.
///
/// Artifact files may list classes either as integer codes (the usual case when
/// a label encoder was applied before fitting) or directly as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawClass {
    Code(i64),
    Label(String),
}

impl fmt::Display for RawClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawClass::Code(code) => write!(f, "{code}"),
            RawClass::Label(label) => f.write_str(label),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassificationError {
    #[error("Scaled vector has {found} values, but the classifier expects {expected}.")]
    ShapeMismatch { expected: usize, found: usize },
    #[error("Classifier failed internally: {0}")]
    Model(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
}

/// Linear decision function `coefficients · x + intercepts`.
///
/// With two classes the training process may store a single row; its sign then
/// selects between `classes[0]` (non-positive) and `classes[1]` (positive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub classes: Vec<RawClass>,
    /// Shape: [n_rows, n_features], where n_rows is 1 (binary) or n_classes.
    pub coefficients: Array2<f64>,
    pub intercepts: Array1<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub classes: Vec<RawClass>,
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
}

/// A tree stored as a flat node list with node 0 as the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    /// Goes to `left` when `x[feature] <= threshold`, otherwise to `right`.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Per-class weight (sample counts or fractions) at this leaf.
    Leaf { distribution: Vec<f64> },
}

impl Classifier {
    pub fn classes(&self) -> &[RawClass] {
        match self {
            Classifier::LogisticRegression(model) => &model.classes,
            Classifier::RandomForest(forest) => &forest.classes,
        }
    }

    /// Width of the scaled vector this classifier was fitted on.
    pub fn n_features(&self) -> usize {
        match self {
            Classifier::LogisticRegression(model) => model.coefficients.ncols(),
            Classifier::RandomForest(forest) => forest.n_features,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            Classifier::LogisticRegression(model) => model.validate(),
            Classifier::RandomForest(forest) => forest.validate(),
        }
    }
}

impl Classify for Classifier {
    fn predict(&self, scaled: ArrayView1<f64>) -> Result<RawClass, ClassificationError> {
        let expected = self.n_features();
        if scaled.len() != expected {
            return Err(ClassificationError::ShapeMismatch {
                expected,
                found: scaled.len(),
            });
        }
        let index = match self {
            Classifier::LogisticRegression(model) => model.winning_index(scaled)?,
            Classifier::RandomForest(forest) => forest.winning_index(scaled)?,
        };
        self.classes()
            .get(index)
            .cloned()
            .ok_or_else(|| ClassificationError::Model(format!("class index {index} out of range")))
    }
}

fn check_classes(classes: &[RawClass]) -> Result<(), String> {
    if classes.is_empty() {
        return Err("'classes' is empty".to_string());
    }
    for (i, class) in classes.iter().enumerate() {
        if classes[..i].contains(class) {
            return Err(format!("class '{class}' is listed twice"));
        }
    }
    Ok(())
}

/// Position of the largest score; ties resolve to the earliest position.
fn argmax(scores: &[f64]) -> Result<usize, ClassificationError> {
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(ClassificationError::Model(
            "decision scores are not finite".to_string(),
        ));
    }
    scores
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
        .map(|(i, _)| i)
        .ok_or_else(|| ClassificationError::Model("no decision scores".to_string()))
}

impl LogisticRegression {
    fn validate(&self) -> Result<(), String> {
        check_classes(&self.classes)?;
        let (rows, cols) = self.coefficients.dim();
        if cols == 0 {
            return Err("'coefficients' has no feature columns".to_string());
        }
        let binary_single_row = self.classes.len() == 2 && rows == 1;
        if rows != self.classes.len() && !binary_single_row {
            return Err(format!(
                "'coefficients' has {rows} rows for {} classes",
                self.classes.len()
            ));
        }
        if self.intercepts.len() != rows {
            return Err(format!(
                "'intercepts' has {} entries for {rows} coefficient rows",
                self.intercepts.len()
            ));
        }
        if self
            .coefficients
            .iter()
            .chain(self.intercepts.iter())
            .any(|v| !v.is_finite())
        {
            return Err("contains non-finite parameters".to_string());
        }
        Ok(())
    }

    fn winning_index(&self, scaled: ArrayView1<f64>) -> Result<usize, ClassificationError> {
        let rows = self.coefficients.nrows();
        if self.intercepts.len() != rows {
            return Err(ClassificationError::Model(format!(
                "{} intercepts for {rows} coefficient rows",
                self.intercepts.len()
            )));
        }
        let scores = self.coefficients.dot(&scaled) + &self.intercepts;
        if self.classes.len() == 2 && scores.len() == 1 {
            let score = scores[0];
            if !score.is_finite() {
                return Err(ClassificationError::Model(
                    "decision score is not finite".to_string(),
                ));
            }
            return Ok(usize::from(score > 0.0));
        }
        argmax(&scores.to_vec())
    }
}

impl RandomForest {
    fn validate(&self) -> Result<(), String> {
        check_classes(&self.classes)?;
        if self.n_features == 0 {
            return Err("'n_features' must be positive".to_string());
        }
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(format!("tree {t} has no nodes"));
            }
            for (n, node) in tree.nodes.iter().enumerate() {
                match node {
                    TreeNode::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    } => {
                        if *feature >= self.n_features {
                            return Err(format!(
                                "tree {t} node {n} splits on feature {feature} of {}",
                                self.n_features
                            ));
                        }
                        if !threshold.is_finite() {
                            return Err(format!("tree {t} node {n} has a non-finite threshold"));
                        }
                        // Children must come after their parent, which also rules out cycles.
                        for child in [*left, *right] {
                            if child <= n || child >= tree.nodes.len() {
                                return Err(format!(
                                    "tree {t} node {n} points to invalid child {child}"
                                ));
                            }
                        }
                    }
                    TreeNode::Leaf { distribution } => {
                        if distribution.len() != self.classes.len() {
                            return Err(format!(
                                "tree {t} leaf {n} has {} weights for {} classes",
                                distribution.len(),
                                self.classes.len()
                            ));
                        }
                        if distribution.iter().any(|w| !w.is_finite() || *w < 0.0) {
                            return Err(format!("tree {t} leaf {n} has invalid weights"));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Averages the normalized leaf distributions of all trees, the way a
    /// probability-voting forest does, and picks the highest.
    fn winning_index(&self, scaled: ArrayView1<f64>) -> Result<usize, ClassificationError> {
        let mut votes = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            let distribution = tree.leaf_for(scaled)?;
            if distribution.len() != votes.len() {
                return Err(ClassificationError::Model(format!(
                    "leaf has {} weights for {} classes",
                    distribution.len(),
                    votes.len()
                )));
            }
            let total: f64 = distribution.iter().sum();
            if total <= 0.0 {
                continue;
            }
            for (vote, weight) in votes.iter_mut().zip(distribution) {
                *vote += weight / total;
            }
        }
        argmax(&votes)
    }
}

impl DecisionTree {
    fn leaf_for(&self, scaled: ArrayView1<f64>) -> Result<&[f64], ClassificationError> {
        let mut index = 0;
        // A path through a well-formed tree visits each node at most once.
        for _ in 0..self.nodes.len() {
            match self.nodes.get(index) {
                Some(TreeNode::Leaf { distribution }) => return Ok(distribution.as_slice()),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = scaled.get(*feature).ok_or_else(|| {
                        ClassificationError::Model(format!("split on missing feature {feature}"))
                    })?;
                    index = if value <= threshold { *left } else { *right };
                }
                None => {
                    return Err(ClassificationError::Model(format!(
                        "tree node {index} does not exist"
                    )));
                }
            }
        }
        Err(ClassificationError::Model(
            "tree walk did not reach a leaf".to_string(),
        ))
    }
}
