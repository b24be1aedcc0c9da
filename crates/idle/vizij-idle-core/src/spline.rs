//! Bezier control points for non-uniformly spaced samples.
//!
//! Given samples `(t_i, v_i)`, the curve through them is built from one Bezier piece per
//! gap: quadratic for the first and last gap (their outer end has no neighbour to agree
//! with) and cubic for every interior gap. The tangent `D_i` at each interior sample is
//! the unknown; requiring the second derivative to agree on both sides of every interior
//! sample yields a tridiagonal system whose coefficients are the inverse gap widths
//! `1 / h`. The system is solved with the Thomas algorithm, and each tangent is then
//! split into an incoming and an outgoing control value scaled to its neighbouring gaps,
//! which keeps the curve C¹ at every interior sample.
//!
//! The solver works on one scalar dimension at a time; timelines call it once per
//! component.

/// Gaps narrower than this are widened to keep the system finite.
const MIN_GAP: f32 = 1e-5;

/// Control values attached to one interior sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlPoints {
    /// Control value on the gap arriving at the sample.
    pub incoming: f32,
    /// Control value on the gap leaving the sample.
    pub outgoing: f32,
}

/// Solve `a[k]·x[k-1] + b[k]·x[k] + c[k]·x[k+1] = r[k]` (`a[0]` and `c[m-1]` ignored).
pub(crate) fn solve_tridiagonal(a: &[f32], b: &[f32], c: &[f32], r: &[f32]) -> Vec<f32> {
    let m = b.len();
    if m == 0 {
        return Vec::new();
    }
    let mut cp = vec![0.0f32; m];
    let mut rp = vec![0.0f32; m];
    cp[0] = c[0] / b[0];
    rp[0] = r[0] / b[0];
    for k in 1..m {
        let denom = b[k] - a[k] * cp[k - 1];
        cp[k] = c[k] / denom;
        rp[k] = (r[k] - a[k] * rp[k - 1]) / denom;
    }
    let mut x = vec![0.0f32; m];
    x[m - 1] = rp[m - 1];
    for k in (0..m - 1).rev() {
        x[k] = rp[k] - cp[k] * x[k + 1];
    }
    x
}

/// Tangents `D_i` at every interior sample (index `k` maps to sample `k + 1`).
/// Returns an empty vector for fewer than three samples.
pub fn solve_tangents(times: &[f32], values: &[f32]) -> Vec<f32> {
    let n = times.len().min(values.len());
    if n < 3 {
        return Vec::new();
    }
    let h: Vec<f32> = (0..n - 1)
        .map(|j| (times[j + 1] - times[j]).max(MIN_GAP))
        .collect();
    let s: Vec<f32> = (0..n - 1).map(|j| (values[j + 1] - values[j]) / h[j]).collect();

    let m = n - 2;
    let mut sub = vec![0.0f32; m];
    let mut diag = vec![0.0f32; m];
    let mut sup = vec![0.0f32; m];
    let mut rhs = vec![0.0f32; m];
    for k in 0..m {
        let i = k + 1;
        let (wl, wr) = (1.0 / h[i - 1], 1.0 / h[i]);
        let left_quadratic = i == 1;
        let right_quadratic = i == n - 2;
        if left_quadratic {
            diag[k] += wl;
            rhs[k] += s[i - 1] * wl;
        } else {
            sub[k] = wl;
            diag[k] += 2.0 * wl;
            rhs[k] += 3.0 * s[i - 1] * wl;
        }
        if right_quadratic {
            diag[k] += wr;
            rhs[k] += s[i] * wr;
        } else {
            sup[k] = wr;
            diag[k] += 2.0 * wr;
            rhs[k] += 3.0 * s[i] * wr;
        }
    }
    solve_tridiagonal(&sub, &diag, &sup, &rhs)
}

/// Incoming/outgoing control values for every interior sample, in sample order.
/// Returns an empty vector for fewer than three samples.
pub fn compute_control_points(times: &[f32], values: &[f32]) -> Vec<ControlPoints> {
    let tangents = solve_tangents(times, values);
    let n = times.len().min(values.len());
    tangents
        .iter()
        .enumerate()
        .map(|(k, d)| {
            let i = k + 1;
            let h_in = (times[i] - times[i - 1]).max(MIN_GAP);
            let h_out = (times[i + 1] - times[i]).max(MIN_GAP);
            let in_div = if i == 1 { 2.0 } else { 3.0 };
            let out_div = if i == n - 2 { 2.0 } else { 3.0 };
            ControlPoints {
                incoming: values[i] - d * h_in / in_div,
                outgoing: values[i] + d * h_out / out_div,
            }
        })
        .collect()
}
