//! Synthetic credit applications with a German-credit-like layout.
//!
//! Seven numeric attributes plus thirteen categorical attributes encoded as
//! drop-first one-hot indicators, 48 feature columns in total. The default
//! label is drawn from a logistic model over those attributes, which yields
//! roughly a 70/30 split between good and bad credit.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Dataset, DatasetError, FeatureTable};

/// Options for [`credit_dataset`].
#[derive(Debug, Clone)]
pub struct SyntheticOptions {
    pub rows: usize,
    pub seed: u64,
    /// Multiplier on every attribute effect; larger values separate the classes more.
    pub signal: f64,
    /// Log-odds offset of a default; controls the class balance.
    pub intercept: f64,
}

impl Default for SyntheticOptions {
    fn default() -> Self {
        Self {
            rows: 1000,
            seed: 42,
            signal: 1.25,
            intercept: -1.35,
        }
    }
}

struct Categorical {
    name: &'static str,
    levels: &'static [&'static str],
    probs: &'static [f64],
    effects: &'static [f64],
}

const NUMERIC_COLUMNS: [&str; 7] = [
    "duration_months",
    "credit_amount",
    "installment_rate",
    "residence_since",
    "age",
    "existing_credits",
    "num_dependents",
];

const CATEGORICALS: [Categorical; 13] = [
    Categorical {
        name: "checking_status",
        levels: &["lt_0", "0_to_200", "ge_200", "none"],
        probs: &[0.27, 0.27, 0.06, 0.40],
        effects: &[0.9, 0.5, 0.0, -0.9],
    },
    Categorical {
        name: "credit_history",
        levels: &["no_credits", "all_paid", "existing_paid", "delayed", "critical"],
        probs: &[0.04, 0.05, 0.53, 0.09, 0.29],
        effects: &[0.9, 0.9, 0.2, 0.2, -0.5],
    },
    Categorical {
        name: "purpose",
        levels: &[
            "new_car",
            "used_car",
            "furniture",
            "radio_tv",
            "appliances",
            "repairs",
            "education",
            "retraining",
            "business",
            "other",
        ],
        probs: &[0.23, 0.10, 0.18, 0.28, 0.01, 0.02, 0.05, 0.01, 0.10, 0.02],
        effects: &[0.3, -0.5, 0.0, -0.2, 0.3, 0.3, 0.5, -0.8, 0.1, 0.2],
    },
    Categorical {
        name: "savings",
        levels: &["lt_100", "100_to_500", "500_to_1000", "ge_1000", "unknown"],
        probs: &[0.60, 0.10, 0.06, 0.05, 0.19],
        effects: &[0.3, 0.1, -0.3, -0.6, -0.4],
    },
    Categorical {
        name: "employment",
        levels: &["unemployed", "lt_1y", "1_to_4y", "4_to_7y", "ge_7y"],
        probs: &[0.06, 0.17, 0.34, 0.17, 0.26],
        effects: &[0.3, 0.3, 0.1, -0.2, -0.1],
    },
    Categorical {
        name: "personal_status",
        levels: &["male_divorced", "female_married", "male_single", "male_married"],
        probs: &[0.05, 0.31, 0.55, 0.09],
        effects: &[0.3, 0.2, -0.1, 0.0],
    },
    Categorical {
        name: "other_parties",
        levels: &["none", "co_applicant", "guarantor"],
        probs: &[0.91, 0.04, 0.05],
        effects: &[0.0, 0.3, -0.5],
    },
    Categorical {
        name: "property",
        levels: &["real_estate", "life_insurance", "car", "unknown"],
        probs: &[0.28, 0.23, 0.33, 0.16],
        effects: &[-0.3, 0.0, 0.0, 0.4],
    },
    Categorical {
        name: "other_payment_plans",
        levels: &["bank", "stores", "none"],
        probs: &[0.14, 0.05, 0.81],
        effects: &[0.3, 0.3, -0.1],
    },
    Categorical {
        name: "housing",
        levels: &["rent", "own", "for_free"],
        probs: &[0.18, 0.71, 0.11],
        effects: &[0.3, -0.1, 0.2],
    },
    Categorical {
        name: "job",
        levels: &["unskilled_nonresident", "unskilled", "skilled", "management"],
        probs: &[0.02, 0.20, 0.63, 0.15],
        effects: &[0.0, 0.0, 0.0, 0.1],
    },
    Categorical {
        name: "telephone",
        levels: &["none", "yes"],
        probs: &[0.6, 0.4],
        effects: &[0.0, -0.1],
    },
    Categorical {
        name: "foreign_worker",
        levels: &["yes", "no"],
        probs: &[0.96, 0.04],
        effects: &[0.0, -0.6],
    },
];

/// Column names in table order: numeric attributes, then one-hot indicators.
pub fn credit_columns() -> Vec<String> {
    let mut columns: Vec<String> = NUMERIC_COLUMNS.iter().map(|c| (*c).to_string()).collect();
    for cat in &CATEGORICALS {
        columns.extend(
            cat.levels
                .iter()
                .skip(1)
                .map(|level| format!("{}_{}", cat.name, level)),
        );
    }
    columns
}

/// Generate a labelled synthetic credit dataset.
pub fn credit_dataset(options: &SyntheticOptions) -> Result<Dataset, DatasetError> {
    let mut rng = StdRng::seed_from_u64(options.seed);
    let s = options.signal;
    let mut rows = Vec::with_capacity(options.rows);
    let mut labels = Vec::with_capacity(options.rows);

    for _ in 0..options.rows {
        let mut row = Vec::with_capacity(48);
        let mut logit = options.intercept;

        let duration = (21.0 + 12.0 * standard_normal(&mut rng)).round().clamp(4.0, 72.0);
        logit += s * 0.45 * (duration - 21.0) / 12.0;
        let z = standard_normal(&mut rng);
        let amount = ((7.8 + 0.75 * z).exp()).clamp(250.0, 18_500.0);
        logit += s * 0.20 * z;
        let installment = uniform_level(&mut rng, 4);
        logit += s * 0.20 * (installment - 2.5) / 1.12;
        let residence = uniform_level(&mut rng, 4);
        let age = (35.0 + 11.0 * standard_normal(&mut rng)).round().clamp(19.0, 75.0);
        logit -= s * 0.25 * (age - 35.0) / 11.0;
        let credits = 1.0 + pick(&mut rng, &[0.63, 0.33, 0.03, 0.01]) as f64;
        logit += s * 0.10 * (credits - 1.4);
        let dependents = if rng.random::<f64>() < 0.15 { 2.0 } else { 1.0 };
        logit += s * 0.05 * (dependents - 1.15);
        row.extend(
            [duration, amount, installment, residence, age, credits, dependents]
                .map(|v| v as f32),
        );

        for cat in &CATEGORICALS {
            let level = pick(&mut rng, cat.probs);
            row.extend((1..cat.levels.len()).map(|idx| if idx == level { 1.0f32 } else { 0.0 }));
            logit += s * cat.effects[level];
        }

        let p = 1.0 / (1.0 + (-logit).exp());
        labels.push(u8::from(rng.random::<f64>() < p));
        rows.push(row);
    }

    Dataset::new(FeatureTable::from_rows(credit_columns(), &rows)?, labels)
}

/// Box-Muller draw from the standard normal distribution.
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

fn uniform_level(rng: &mut StdRng, levels: u32) -> f64 {
    f64::from(1 + rng.random_range(0..levels))
}

fn pick(rng: &mut StdRng, probs: &[f64]) -> usize {
    let u = rng.random::<f64>();
    let mut acc = 0.0;
    for (idx, p) in probs.iter().enumerate() {
        acc += p;
        if u < acc {
            return idx;
        }
    }
    probs.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_has_48_named_columns() {
        let columns = credit_columns();
        assert_eq!(columns.len(), 48);
        assert_eq!(columns[0], "duration_months");
        assert_eq!(columns[7], "checking_status_0_to_200");
        assert_eq!(columns[47], "foreign_worker_no");
        for cat in &CATEGORICALS {
            assert_eq!(cat.levels.len(), cat.probs.len());
            assert_eq!(cat.levels.len(), cat.effects.len());
            assert!((cat.probs.iter().sum::<f64>() - 1.0).abs() < 1e-9, "{}", cat.name);
        }
    }

    #[test]
    fn generates_imbalanced_reproducible_rows() {
        let options = SyntheticOptions::default();
        let data = credit_dataset(&options).unwrap();
        assert_eq!(data.len(), 1000);
        assert_eq!(data.n_features(), 48);
        let rate = data.positive_rate();
        assert!((0.2..=0.4).contains(&rate), "positive rate {rate}");
        assert_eq!(data, credit_dataset(&options).unwrap());
    }

    #[test]
    fn one_hot_groups_have_at_most_one_active_level() {
        let data = credit_dataset(&SyntheticOptions {
            rows: 50,
            ..SyntheticOptions::default()
        })
        .unwrap();
        let records = data.records();
        for row in records.rows() {
            let mut offset = NUMERIC_COLUMNS.len();
            for cat in &CATEGORICALS {
                let width = cat.levels.len() - 1;
                let active: f32 = (offset..offset + width).map(|j| row[j]).sum();
                assert!(active == 0.0 || active == 1.0);
                offset += width;
            }
        }
    }
}
