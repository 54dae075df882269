//! ASCII coefficient plots for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid per term), optimized for:
//! - quick visual comparison of the quantile process against OLS
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements, one panel per term with x = quantile on [0, 1]:
//! - quantile estimate: `o`
//! - confidence interval: `|` error bar
//! - OLS estimate: `-` horizontal reference line

use crate::domain::CoefficientRow;
use crate::error::AppError;

const LEGEND: &str = "x = quantile in [0, 1] | o QR estimate | '|' confidence interval | - OLS estimate";

/// Render one panel per OLS term, in OLS row order.
///
/// Fails with `RenderFailure` when a quantile row has no matching OLS term,
/// a term repeats a quantile, a value is not finite, or the grid is too
/// narrow to give every quantile its own column.
pub fn render_coefficient_panels(
    ols_rows: &[CoefficientRow],
    quantile_rows: &[CoefficientRow],
    width: usize,
    height: usize,
) -> Result<String, AppError> {
    let width = width.max(10);
    let height = height.max(5);

    for row in quantile_rows {
        if !ols_rows.iter().any(|o| o.term == row.term) {
            return Err(AppError::RenderFailure(format!(
                "Plot: term '{}' has quantile rows but no OLS row.",
                row.term
            )));
        }
    }

    let mut out = String::new();
    out.push_str(LEGEND);
    out.push('\n');
    for ols in ols_rows {
        let points: Vec<&CoefficientRow> = quantile_rows.iter().filter(|r| r.term == ols.term).collect();
        out.push('\n');
        out.push_str(&render_panel(ols, &points, width, height)?);
    }
    Ok(out)
}

fn render_panel(
    ols: &CoefficientRow,
    points: &[&CoefficientRow],
    width: usize,
    height: usize,
) -> Result<String, AppError> {
    let mut columns: Vec<usize> = Vec::with_capacity(points.len());
    for p in points {
        let tau = p.quantile.ok_or_else(|| {
            AppError::RenderFailure(format!("Plot: quantile row for '{}' has no quantile tag.", p.term))
        })?;
        if ![p.estimate, p.conf_low, p.conf_high].iter().all(|v| v.is_finite()) {
            return Err(AppError::RenderFailure(format!(
                "Plot: non-finite value for '{}' at quantile {tau}.",
                p.term
            )));
        }
        let x = map_x(tau, 0.0, 1.0, width);
        if columns.contains(&x) {
            return Err(AppError::RenderFailure(format!(
                "Plot: quantile {tau} of '{}' shares a column with another quantile; widen the plot.",
                p.term
            )));
        }
        columns.push(x);
    }
    if !ols.estimate.is_finite() {
        return Err(AppError::RenderFailure(format!(
            "Plot: non-finite OLS estimate for '{}'.",
            ols.term
        )));
    }

    let (y_min, y_max) = y_range(ols, points);
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Reference line first so bars and points overlay it.
    let y_ols = map_y(ols.estimate, y_min, y_max, height);
    draw_line(&mut grid, 0, y_ols, width - 1, y_ols, '-');

    for (p, &x) in points.iter().zip(&columns) {
        let top = map_y(p.conf_high, y_min, y_max, height);
        let bottom = map_y(p.conf_low, y_min, y_max, height);
        for row in grid.iter_mut().take(bottom + 1).skip(top) {
            row[x] = '|';
        }
        grid[map_y(p.estimate, y_min, y_max, height)][x] = 'o';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{}: y=[{y_min:.3}, {y_max:.3}] | OLS={:.4}\n",
        ols.term, ols.estimate
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out.push_str(&format!("0{:>w$}\n", "1", w = width - 1));
    Ok(out)
}

fn y_range(ols: &CoefficientRow, points: &[&CoefficientRow]) -> (f64, f64) {
    let mut min_y = ols.estimate;
    let mut max_y = ols.estimate;
    for p in points {
        for v in [p.estimate, p.conf_low, p.conf_high] {
            min_y = min_y.min(v);
            max_y = max_y.max(v);
        }
    }
    (min_y, max_y)
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
