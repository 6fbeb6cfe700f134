//! Cross-validated hyperparameter search.
//!
//! A configuration space maps hyperparameter names to candidate values.
//! Grid search scores every combination; randomized search scores a seeded
//! sample of them. Candidates are scored in parallel but always reported in
//! enumeration order, so the outcome does not depend on the thread count.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::cross_validation::{cross_val_accuracy, Summary};
use crate::error::{EvalError, Result};

/// One candidate value of a hyperparameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl ParamValue {
    fn invalid(name: &str, expected: &'static str) -> EvalError {
        EvalError::InvalidParameterValue {
            name: name.to_string(),
            expected,
        }
    }

    pub fn as_usize(&self, name: &str) -> Result<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Ok(*v as usize),
            _ => Err(Self::invalid(name, "non-negative integer")),
        }
    }

    pub fn as_opt_usize(&self, name: &str) -> Result<Option<usize>> {
        match self {
            ParamValue::Null => Ok(None),
            _ => self
                .as_usize(name)
                .map(Some)
                .map_err(|_| Self::invalid(name, "non-negative integer or null")),
        }
    }

    /// Integers are accepted where a float is expected.
    pub fn as_f64(&self, name: &str) -> Result<f64> {
        match self {
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Int(v) => Ok(*v as f64),
            _ => Err(Self::invalid(name, "number")),
        }
    }

    pub fn as_bool(&self, name: &str) -> Result<bool> {
        match self {
            ParamValue::Bool(v) => Ok(*v),
            _ => Err(Self::invalid(name, "boolean")),
        }
    }

    pub fn as_str(&self, name: &str) -> Result<&str> {
        match self {
            ParamValue::Text(v) => Ok(v.as_str()),
            _ => Err(Self::invalid(name, "string")),
        }
    }

    /// Numeric view used for plotting scores against a hyperparameter.
    pub fn as_plot_value(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
            ParamValue::Null => write!(f, "None"),
        }
    }
}

/// Hyperparameter name to candidate values. Keys iterate in sorted order.
pub type ConfigSpace = BTreeMap<String, Vec<ParamValue>>;

/// One point of a configuration space.
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Number of combinations in `space`.
pub fn space_size(space: &ConfigSpace) -> Result<usize> {
    validate_space(space)?;
    Ok(space.values().map(Vec::len).product())
}

fn validate_space(space: &ConfigSpace) -> Result<()> {
    if space.is_empty() {
        return Err(EvalError::EmptySearchSpace);
    }
    if let Some((name, _)) = space.iter().find(|(_, values)| values.is_empty()) {
        return Err(EvalError::EmptyParameter(name.clone()));
    }
    Ok(())
}

/// Combination at position `index` of the grid. The last key varies fastest.
fn grid_point(space: &ConfigSpace, mut index: usize) -> ParamSet {
    let mut point = ParamSet::new();
    for (name, values) in space.iter().rev() {
        point.insert(name.clone(), values[index % values.len()].clone());
        index /= values.len();
    }
    point
}

/// Every combination of `space` in grid order.
pub fn enumerate_grid(space: &ConfigSpace) -> Result<Vec<ParamSet>> {
    let total = space_size(space)?;
    Ok((0..total).map(|i| grid_point(space, i)).collect())
}

/// `n_iter` distinct combinations drawn uniformly without replacement,
/// returned in grid order. When `n_iter` covers the space, the whole grid is
/// returned once.
pub fn sample_grid(space: &ConfigSpace, n_iter: usize, seed: u64) -> Result<Vec<ParamSet>> {
    let total = space_size(space)?;
    if n_iter >= total {
        log::info!(
            "Requested {} random candidates but the space only holds {}; evaluating all of them",
            n_iter,
            total
        );
        return enumerate_grid(space);
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = sample(&mut rng, total, n_iter).into_vec();
    picked.sort_unstable();
    Ok(picked.into_iter().map(|i| grid_point(space, i)).collect())
}

/// Apply every entry of `params` to a copy of `base`.
pub fn apply_params(base: &ModelConfig, params: &ParamSet) -> Result<ModelConfig> {
    let mut config = base.clone();
    for (name, value) in params {
        if name == "threshold" {
            config.threshold = value.as_f64(name)?;
        } else {
            config.model_type.set_param(name, value)?;
        }
    }
    Ok(config)
}

fn default_folds() -> usize {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    Grid,
    Randomized { n_iter: usize, seed: u64 },
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SearchStrategy::Grid => write!(f, "grid search"),
            SearchStrategy::Randomized { n_iter, .. } => {
                write!(f, "randomized search ({} draws)", n_iter)
            }
        }
    }
}

/// A search over one algorithm's hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub strategy: SearchStrategy,
    /// Values not named in `space` are taken from here.
    pub model: ModelConfig,
    pub space: ConfigSpace,
    #[serde(default = "default_folds")]
    pub folds: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: ParamSet,
    pub score: Summary,
    pub fold_scores: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub algorithm: String,
    pub strategy: SearchStrategy,
    pub folds: usize,
    pub candidates: Vec<CandidateScore>,
    pub best_index: usize,
    pub best_config: ModelConfig,
}

impl SearchResult {
    pub fn best(&self) -> &CandidateScore {
        &self.candidates[self.best_index]
    }

    pub fn best_params(&self) -> &ParamSet {
        &self.best().params
    }

    pub fn best_score(&self) -> f64 {
        self.best().score.mean
    }
}

fn format_params(params: &ParamSet) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "{} {} over {} candidates ({}-fold CV accuracy)",
            self.algorithm,
            self.strategy,
            self.candidates.len(),
            self.folds
        )?;
        for (i, c) in self.candidates.iter().enumerate() {
            let marker = if i == self.best_index { "*" } else { " " };
            writeln!(f, "{} {}  {}", marker, c.score, format_params(&c.params))?;
        }
        write!(
            f,
            "Best: {} with mean accuracy {:.4}",
            format_params(self.best_params()),
            self.best_score()
        )
    }
}

/// Score `candidates` with `k`-fold CV accuracy and keep the best. Ties go
/// to the earliest candidate.
fn evaluate_candidates(
    base: &ModelConfig,
    candidates: Vec<ParamSet>,
    strategy: SearchStrategy,
    x: &Array2<f64>,
    y: &Array1<bool>,
    k: usize,
    seed: u64,
) -> Result<SearchResult> {
    if k < 2 || k > x.nrows() {
        return Err(EvalError::InvalidFoldCount {
            k,
            n_samples: x.nrows(),
        });
    }
    // Resolve every candidate up front so bad names fail before any fitting.
    let configs = candidates
        .iter()
        .map(|params| apply_params(base, params))
        .collect::<Result<Vec<_>>>()?;

    log::info!(
        "Running {} for {} over {} candidates with {}-fold CV",
        strategy,
        base.model_type.name(),
        configs.len(),
        k
    );

    let fold_scores = configs
        .par_iter()
        .map(|config| cross_val_accuracy(config, x, y, k, seed))
        .collect::<Result<Vec<_>>>()?;

    let scored: Vec<CandidateScore> = candidates
        .into_iter()
        .zip(fold_scores)
        .map(|(params, fold_scores)| {
            let score = Summary::of(&fold_scores);
            log::debug!("{} -> {}", format_params(&params), score);
            CandidateScore {
                params,
                score,
                fold_scores,
            }
        })
        .collect();

    let mut best_index = 0;
    for (i, c) in scored.iter().enumerate() {
        if c.score.mean > scored[best_index].score.mean {
            best_index = i;
        }
    }

    let result = SearchResult {
        algorithm: base.model_type.name().to_string(),
        strategy,
        folds: k,
        best_config: configs[best_index].clone(),
        candidates: scored,
        best_index,
    };
    log::info!(
        "Best {} configuration: {} (mean accuracy {:.4})",
        result.algorithm,
        format_params(result.best_params()),
        result.best_score()
    );
    Ok(result)
}

/// Exhaustive search over every combination of `space`.
pub fn grid_search(
    base: &ModelConfig,
    space: &ConfigSpace,
    x: &Array2<f64>,
    y: &Array1<bool>,
    k: usize,
    seed: u64,
) -> Result<SearchResult> {
    let candidates = enumerate_grid(space)?;
    evaluate_candidates(base, candidates, SearchStrategy::Grid, x, y, k, seed)
}

/// Search over `n_iter` distinct combinations drawn with `sample_seed`.
pub fn randomized_search(
    base: &ModelConfig,
    space: &ConfigSpace,
    n_iter: usize,
    sample_seed: u64,
    x: &Array2<f64>,
    y: &Array1<bool>,
    k: usize,
    seed: u64,
) -> Result<SearchResult> {
    if n_iter == 0 {
        return Err(EvalError::Model("randomized search needs at least one draw".to_string()));
    }
    let candidates = sample_grid(space, n_iter, sample_seed)?;
    let strategy = SearchStrategy::Randomized {
        n_iter,
        seed: sample_seed,
    };
    evaluate_candidates(base, candidates, strategy, x, y, k, seed)
}

/// Run the search described by `config`; `seed` shuffles the CV folds.
pub fn run_search(config: &SearchConfig, x: &Array2<f64>, y: &Array1<bool>, seed: u64) -> Result<SearchResult> {
    match config.strategy {
        SearchStrategy::Grid => grid_search(&config.model, &config.space, x, y, config.folds, seed),
        SearchStrategy::Randomized { n_iter, seed: sample_seed } => randomized_search(
            &config.model,
            &config.space,
            n_iter,
            sample_seed,
            x,
            y,
            config.folds,
            seed,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> ConfigSpace {
        let mut space = ConfigSpace::new();
        space.insert(
            "max_depth".to_string(),
            vec![ParamValue::Int(2), ParamValue::Int(4), ParamValue::Null],
        );
        space.insert(
            "criterion".to_string(),
            vec![ParamValue::Text("gini".into()), ParamValue::Text("entropy".into())],
        );
        space
    }

    #[test]
    fn grid_is_sorted_with_last_key_fastest() {
        let grid = enumerate_grid(&space()).unwrap();
        assert_eq!(grid.len(), 6);
        assert_eq!(grid[0]["criterion"], ParamValue::Text("gini".into()));
        assert_eq!(grid[0]["max_depth"], ParamValue::Int(2));
        assert_eq!(grid[1]["max_depth"], ParamValue::Int(4));
        assert_eq!(grid[2]["max_depth"], ParamValue::Null);
        assert_eq!(grid[3]["criterion"], ParamValue::Text("entropy".into()));
    }

    #[test]
    fn sample_is_distinct_and_reproducible() {
        let a = sample_grid(&space(), 4, 11).unwrap();
        let b = sample_grid(&space(), 4, 11).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
        for i in 0..a.len() {
            for j in (i + 1)..a.len() {
                assert_ne!(a[i], a[j]);
            }
        }
        assert_eq!(sample_grid(&space(), 50, 11).unwrap().len(), 6);
    }

    #[test]
    fn empty_spaces_are_rejected() {
        assert_eq!(enumerate_grid(&ConfigSpace::new()), Err(EvalError::EmptySearchSpace));
        let mut space = ConfigSpace::new();
        space.insert("k".to_string(), vec![]);
        assert_eq!(
            enumerate_grid(&space),
            Err(EvalError::EmptyParameter("k".to_string()))
        );
    }

    #[test]
    fn param_values_deserialize_untagged() {
        let values: Vec<ParamValue> = serde_json::from_str(r#"[3, 0.5, "gini", true, null]"#).unwrap();
        assert_eq!(
            values,
            vec![
                ParamValue::Int(3),
                ParamValue::Float(0.5),
                ParamValue::Text("gini".into()),
                ParamValue::Bool(true),
                ParamValue::Null
            ]
        );
    }

    #[test]
    fn apply_params_sets_threshold_and_model_fields() {
        let base = ModelConfig::new("decision_tree".parse().unwrap());
        let mut params = ParamSet::new();
        params.insert("threshold".to_string(), ParamValue::Float(0.3));
        params.insert("max_depth".to_string(), ParamValue::Int(3));
        let config = apply_params(&base, &params).unwrap();
        assert_eq!(config.threshold, 0.3);
        match config.model_type {
            crate::config::ModelType::DecisionTree { max_depth, .. } => assert_eq!(max_depth, Some(3)),
            _ => panic!("expected DecisionTree"),
        }
    }
}
