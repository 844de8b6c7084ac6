//! Retrieval, aggregation and labeling scores.

use indexmap::IndexSet;
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct RetrievalScore {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct AggregationScore {
    pub expected: Option<f64>,
    pub actual: f64,
    /// Relative error, or absolute error when the expected value is zero.
    /// `None` when there is no expected value.
    pub error: Option<f64>,
}

pub fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

/// Set-based precision and recall. An empty answer to an empty ground truth
/// is perfect; an empty answer to a non-empty one scores zero.
pub fn retrieval_score(ground_truth: &HashSet<String>, results: &HashSet<String>) -> RetrievalScore {
    let hits = ground_truth.intersection(results).count() as f64;
    let precision = match (results.is_empty(), ground_truth.is_empty()) {
        (true, true) => 1.0,
        (true, false) => 0.0,
        _ => hits / results.len() as f64,
    };
    let recall = if ground_truth.is_empty() {
        if results.is_empty() {
            1.0
        } else {
            0.0
        }
    } else {
        hits / ground_truth.len() as f64
    };
    RetrievalScore {
        precision,
        recall,
        f1: f1(precision, recall),
    }
}

/// Reduces the ground truth of a LIMIT query to what a correct engine could
/// have returned: every correct id in the results, topped up with a seeded
/// sample of the ids the engine did not return. Returns `None` when the
/// results contain more correct ids than the limit allows.
pub fn limit_ground_truth(
    ground_truth: &[String],
    results: &HashSet<String>,
    limit: usize,
    seed: u64,
) -> Option<HashSet<String>> {
    let unique: IndexSet<&String> = ground_truth.iter().collect();
    let (correct, missed): (Vec<&String>, Vec<&String>) =
        unique.into_iter().partition(|id| results.contains(*id));
    if correct.len() > limit {
        return None;
    }

    let wanted = (limit - correct.len()).min(missed.len());
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut sample: HashSet<String> = correct.into_iter().cloned().collect();
    for position in index::sample(&mut rng, missed.len(), wanted) {
        sample.insert(missed[position].clone());
    }
    Some(sample)
}

pub fn aggregation_score(expected: Option<f64>, actual: f64) -> AggregationScore {
    let error = expected.map(|g| {
        if g == 0.0 {
            (actual - g).abs()
        } else {
            (actual - g).abs() / g.abs()
        }
    });
    AggregationScore {
        expected,
        actual,
        error,
    }
}

/// Lowercases a label and drops line breaks.
pub fn normalize_label(label: &str) -> String {
    label.to_lowercase().replace(['\n', '\r'], "")
}

/// Macro-averaged precision, recall and F1 over labels, pairing truth and
/// prediction by key. A key without a prediction counts as a miss for its
/// true label.
pub fn macro_label_score<K: Eq + std::hash::Hash>(
    truth: &[(K, String)],
    predictions: &HashMap<K, String>,
) -> RetrievalScore {
    #[derive(Default)]
    struct Counts {
        tp: usize,
        fp: usize,
        fn_: usize,
    }

    let mut per_label: HashMap<&str, Counts> = HashMap::new();
    for (key, expected) in truth {
        match predictions.get(key) {
            Some(predicted) if predicted == expected => {
                per_label.entry(expected.as_str()).or_default().tp += 1;
            }
            Some(predicted) => {
                per_label.entry(expected.as_str()).or_default().fn_ += 1;
                per_label.entry(predicted.as_str()).or_default().fp += 1;
            }
            None => per_label.entry(expected.as_str()).or_default().fn_ += 1,
        }
    }

    if per_label.is_empty() {
        return RetrievalScore {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
        };
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let (mut precision, mut recall, mut f1_sum) = (0.0, 0.0, 0.0);
    for counts in per_label.values() {
        let p = ratio(counts.tp, counts.tp + counts.fp);
        let r = ratio(counts.tp, counts.tp + counts.fn_);
        precision += p;
        recall += r;
        f1_sum += f1(p, r);
    }
    let labels = per_label.len() as f64;
    RetrievalScore {
        precision: precision / labels,
        recall: recall / labels,
        f1: f1_sum / labels,
    }
}
