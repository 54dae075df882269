//! Synthetic medical-expenditure sample.
//!
//! Produces a dataset with the schema of the MEPS extract used in the
//! expenditure example (`ltotexp`, `totexp`, `suppins`, `totchr`, `age`,
//! `female`, `white`) so the whole pipeline can run offline and in tests.
//!
//! The log-expenditure equation has a heteroskedastic error whose scale grows
//! with `totchr`, so quantile slopes genuinely differ across the sweep.
//! A fixed share of individuals has zero expenditure; their `ltotexp` is
//! missing, exactly as in the source data.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Normal, Poisson};

use crate::data::dataset::{Column, Dataset};
use crate::error::AppError;

/// Row count of the reference extract.
pub const REFERENCE_ROWS: usize = 3064;
/// Zero-expenditure rows in the reference extract.
pub const REFERENCE_MISSING: usize = 109;

/// Generate `rows` observations. The number of missing `ltotexp` values is
/// `rows * 109 / 3064`, so the reference size reproduces 2955 usable rows.
pub fn generate_expenditure_sample(rows: usize, seed: u64) -> Result<Dataset, AppError> {
    if rows == 0 {
        return Err(AppError::InvalidParameter(
            "Synthetic sample size must be > 0.".to_string(),
        ));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::InvalidParameter(format!("Noise distribution error: {e}")))?;
    let chronic = Poisson::<f64>::new(1.8)
        .map_err(|e| AppError::InvalidParameter(format!("Chronic-condition distribution error: {e}")))?;

    let n_missing = rows * REFERENCE_MISSING / REFERENCE_ROWS;
    let mut order: Vec<usize> = (0..rows).collect();
    order.shuffle(&mut rng);
    let mut zero_spend = vec![false; rows];
    for &i in order.iter().take(n_missing) {
        zero_spend[i] = true;
    }

    let mut ltotexp = Vec::with_capacity(rows);
    let mut totexp = Vec::with_capacity(rows);
    let mut suppins = Vec::with_capacity(rows);
    let mut totchr = Vec::with_capacity(rows);
    let mut age = Vec::with_capacity(rows);
    let mut female = Vec::with_capacity(rows);
    let mut white = Vec::with_capacity(rows);

    for &is_zero in &zero_spend {
        let a = rng.gen_range(65..=90) as f64;
        let f = if rng.gen_bool(0.58) { 1.0 } else { 0.0 };
        let w = if rng.gen_bool(0.92) { 1.0 } else { 0.0 };
        let s = if rng.gen_bool(0.59) { 1.0 } else { 0.0 };
        let c = chronic.sample(&mut rng).min(7.0);

        let mean = 6.0 + 0.26 * s + 0.44 * c + 0.012 * a - 0.08 * f + 0.32 * w;
        let scale = 1.1 * (1.0 + 0.12 * c);
        let log_spend = mean + scale * noise.sample(&mut rng);

        if is_zero {
            ltotexp.push(None);
            totexp.push(Some(0.0));
        } else {
            ltotexp.push(Some(log_spend));
            totexp.push(Some(log_spend.exp().round()));
        }
        suppins.push(Some(s));
        totchr.push(Some(c));
        age.push(Some(a));
        female.push(Some(f));
        white.push(Some(w));
    }

    Dataset::new(vec![
        Column::new("ltotexp", ltotexp),
        Column::new("totexp", totexp),
        Column::new("suppins", suppins),
        Column::new("totchr", totchr),
        Column::new("age", age),
        Column::new("female", female),
        Column::new("white", white),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_size_has_reference_missing_count() {
        let ds = generate_expenditure_sample(REFERENCE_ROWS, 7).unwrap();
        assert_eq!(ds.n_rows(), REFERENCE_ROWS);
        assert_eq!(ds.column("ltotexp").unwrap().missing(), REFERENCE_MISSING);
        assert_eq!(ds.column("age").unwrap().missing(), 0);
    }

    #[test]
    fn same_seed_same_data() {
        let a = generate_expenditure_sample(200, 11).unwrap();
        let b = generate_expenditure_sample(200, 11).unwrap();
        assert_eq!(a, b);
        let c = generate_expenditure_sample(200, 12).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn chronic_counts_are_capped_integers() {
        let ds = generate_expenditure_sample(500, 3).unwrap();
        for v in ds.column("totchr").unwrap().values.iter().flatten() {
            assert!((0.0..=7.0).contains(v), "{v}");
            assert_eq!(v.fract(), 0.0);
        }
    }

    #[test]
    fn zero_rows_rejected() {
        assert!(generate_expenditure_sample(0, 1).is_err());
    }
}
