//! Model-driven feature importances
//!
//! [`ImportanceModel`] is the seam for tree ensembles used by
//! `tree_based_select`. [`CartImportanceModel`] grows a single CART
//! classification tree on Gini impurity and reports mean impurity decrease
//! per feature.

use tracing::debug;

use super::scoring::{check_target_len, encode_classes, FeatureMatrix};
use crate::error::{PrepError, PrepResult};

/// Default maximum tree depth
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Default minimum rows on each side of a split
pub const DEFAULT_MIN_SAMPLES_LEAF: usize = 1;

/// Minimum impurity decrease for a split to count
const MIN_GAIN: f64 = 1e-12;

/// A model that exposes one importance score per feature column
pub trait ImportanceModel {
    /// Importances aligned to column order, or `None` before fitting
    fn feature_importances(&self) -> Option<Vec<f64>>;

    /// Fit against a feature matrix and class labels
    fn fit(&mut self, features: &FeatureMatrix, target: &[f64]) -> PrepResult<()>;
}

/// Importances computed elsewhere; `fit` leaves them unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecomputedImportances(pub Vec<f64>);

impl ImportanceModel for PrecomputedImportances {
    fn feature_importances(&self) -> Option<Vec<f64>> {
        Some(self.0.clone())
    }

    fn fit(&mut self, _features: &FeatureMatrix, _target: &[f64]) -> PrepResult<()> {
        Ok(())
    }
}

/// Single CART classification tree used for importance scoring
#[derive(Debug, Clone)]
pub struct CartImportanceModel {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    importances: Option<Vec<f64>>,
}

impl Default for CartImportanceModel {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH, DEFAULT_MIN_SAMPLES_LEAF)
    }
}

/// Best split found for one node
struct Split {
    feature: usize,
    /// Rows with a value <= this go left
    value: f64,
    gain: f64,
}

/// Immutable inputs shared by every node while growing
struct GrowContext<'a> {
    features: &'a FeatureMatrix,
    classes: &'a [usize],
    n_classes: usize,
    n_total: f64,
}

impl CartImportanceModel {
    pub fn new(max_depth: usize, min_samples_leaf: usize) -> Self {
        Self {
            max_depth,
            min_samples_leaf: min_samples_leaf.max(1),
            importances: None,
        }
    }

    fn grow(&self, ctx: &GrowContext, rows: &[usize], depth: usize, importances: &mut [f64]) {
        if depth >= self.max_depth || rows.len() < 2 * self.min_samples_leaf {
            return;
        }

        let counts = class_counts(rows, ctx.classes, ctx.n_classes);
        if counts.iter().filter(|&&c| c > 0).count() <= 1 {
            return;
        }

        let Some(split) = self.find_best_split(ctx, rows, &counts) else {
            return;
        };

        // Mean decrease in impurity, weighted by the node's share of rows
        importances[split.feature] += rows.len() as f64 / ctx.n_total * split.gain;

        let column = ctx.features.column(split.feature);
        let (left, right): (Vec<usize>, Vec<usize>) =
            rows.iter().partition(|&&r| column[r] <= split.value);

        self.grow(ctx, &left, depth + 1, importances);
        self.grow(ctx, &right, depth + 1, importances);
    }

    /// Scan every feature for the split with the largest Gini decrease
    fn find_best_split(&self, ctx: &GrowContext, rows: &[usize], counts: &[usize]) -> Option<Split> {
        let n = rows.len();
        let parent = gini_impurity(counts, n);
        let mut best: Option<Split> = None;

        for feature in 0..ctx.features.n_features() {
            let column = ctx.features.column(feature);
            let mut sorted = rows.to_vec();
            sorted.sort_by(|&a, &b| column[a].total_cmp(&column[b]));

            let mut left_counts = vec![0usize; ctx.n_classes];
            for i in 0..n - 1 {
                left_counts[ctx.classes[sorted[i]]] += 1;

                let left_n = i + 1;
                let right_n = n - left_n;
                if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                    continue;
                }

                // Never split between equal values
                if column[sorted[i]] == column[sorted[i + 1]] {
                    continue;
                }

                let right_counts: Vec<usize> = counts
                    .iter()
                    .zip(left_counts.iter())
                    .map(|(&total, &left)| total - left)
                    .collect();

                let weighted = (left_n as f64 * gini_impurity(&left_counts, left_n)
                    + right_n as f64 * gini_impurity(&right_counts, right_n))
                    / n as f64;
                let gain = parent - weighted;

                if gain > MIN_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(Split {
                        feature,
                        value: column[sorted[i]],
                        gain,
                    });
                }
            }
        }

        best
    }
}

impl ImportanceModel for CartImportanceModel {
    fn feature_importances(&self) -> Option<Vec<f64>> {
        self.importances.clone()
    }

    fn fit(&mut self, features: &FeatureMatrix, target: &[f64]) -> PrepResult<()> {
        check_target_len(target, features.n_rows())?;
        if features.has_missing() {
            return Err(PrepError::invalid(
                "tree model cannot be fitted on features with missing values",
            ));
        }

        let (classes, n_classes) = encode_classes(target)?;
        let mut importances = vec![0.0; features.n_features()];

        if features.n_rows() > 0 {
            let ctx = GrowContext {
                features,
                classes: &classes,
                n_classes,
                n_total: features.n_rows() as f64,
            };
            let rows: Vec<usize> = (0..features.n_rows()).collect();
            self.grow(&ctx, &rows, 0, &mut importances);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        debug!(
            features = features.n_features(),
            classes = n_classes,
            "Fitted CART importance model"
        );
        self.importances = Some(importances);
        Ok(())
    }
}

/// Gini impurity of a node: 1 - sum(p_k^2)
fn gini_impurity(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

fn class_counts(rows: &[usize], classes: &[usize], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_classes];
    for &r in rows {
        counts[classes[r]] += 1;
    }
    counts
}
