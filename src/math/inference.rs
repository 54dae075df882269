//! Reference distributions and sample statistics used for inference.

use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use crate::error::AppError;

/// Two-sided critical value of Student t with `df` degrees of freedom.
pub fn t_critical(level: f64, df: f64) -> Result<f64, AppError> {
    validate_level(level)?;
    let dist = students_t(df)?;
    Ok(dist.inverse_cdf(0.5 + level / 2.0))
}

/// Two-sided p-value of statistic `t` under Student t with `df` degrees of freedom.
pub fn t_two_sided_p(t: f64, df: f64) -> Result<f64, AppError> {
    if t.is_nan() {
        return Ok(f64::NAN);
    }
    if t.is_infinite() {
        return Ok(0.0);
    }
    let dist = students_t(df)?;
    Ok((2.0 * dist.sf(t.abs())).clamp(0.0, 1.0))
}

pub fn validate_level(level: f64) -> Result<(), AppError> {
    if level.is_finite() && level > 0.0 && level < 1.0 {
        Ok(())
    } else {
        Err(AppError::InvalidParameter(format!(
            "Confidence level must lie strictly between 0 and 1 (got {level})."
        )))
    }
}

fn students_t(df: f64) -> Result<StudentsT, AppError> {
    StudentsT::new(0.0, 1.0, df)
        .map_err(|e| AppError::InvalidParameter(format!("Invalid t degrees of freedom {df}: {e}")))
}

/// Standard normal quantile.
pub fn normal_quantile(p: f64) -> f64 {
    Normal::new(0.0, 1.0)
        .map(|d| d.inverse_cdf(p))
        .unwrap_or(f64::NAN)
}

/// Standard normal density.
pub fn normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

/// Empirical quantile with linear interpolation between order statistics
/// (the default "type 7" definition).
///
/// `sorted` must be ascending and non-empty.
pub fn sorted_quantile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = (n as f64 - 1.0) * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Sample standard deviation (`n - 1` denominator).
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_critical_approaches_normal() {
        let c = t_critical(0.95, 1e6).unwrap();
        assert!((c - 1.959964).abs() < 1e-3);
        // Small df is wider.
        assert!(t_critical(0.95, 5.0).unwrap() > 2.5);
    }

    #[test]
    fn t_critical_rejects_bad_level() {
        assert!(t_critical(1.0, 10.0).is_err());
        assert!(t_critical(0.0, 10.0).is_err());
        assert!(t_critical(f64::NAN, 10.0).is_err());
    }

    #[test]
    fn two_sided_p_values() {
        assert!((t_two_sided_p(0.0, 30.0).unwrap() - 1.0).abs() < 1e-12);
        let p = t_two_sided_p(1.959964, 1e6).unwrap();
        assert!((p - 0.05).abs() < 1e-3);
        assert_eq!(t_two_sided_p(f64::INFINITY, 30.0).unwrap(), 0.0);
    }

    #[test]
    fn normal_helpers() {
        assert!(normal_quantile(0.5).abs() < 1e-12);
        assert!((normal_quantile(0.975) - 1.959964).abs() < 1e-5);
        assert!((normal_pdf(0.0) - 0.398942).abs() < 1e-6);
    }

    #[test]
    fn sorted_quantile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(sorted_quantile(&v, 0.0), 1.0);
        assert_eq!(sorted_quantile(&v, 1.0), 4.0);
        assert!((sorted_quantile(&v, 0.5) - 2.5).abs() < 1e-12);
    }
}
