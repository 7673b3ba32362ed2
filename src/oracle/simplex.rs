//! Dense two-phase primal simplex for small bounded linear programs.

use log::trace;

use super::model::LinearRow;

const FEASIBILITY_TOLERANCE: f64 = 1e-7;

/// Consecutive degenerate pivots before switching to Bland's rule.
const DEGENERATE_STREAK: usize = 50;

/// A linear program
///
/// ```text
/// minimize    c^T x
/// subject to  lower_i <= a_i^T x <= upper_i
///             l <= x <= u
/// ```
///
/// Infinite row or variable bounds are allowed; every `l` must be finite.
#[derive(Debug, Clone)]
pub struct LinearProgram {
    pub objective: Vec<f64>,
    pub lower_bounds: Vec<f64>,
    pub upper_bounds: Vec<f64>,
    pub rows: Vec<LinearRow>,
}

impl LinearProgram {
    /// Program over `[0, 1]` variables with no rows.
    pub fn unit_box(objective: Vec<f64>) -> Self {
        let n = objective.len();
        Self {
            objective,
            lower_bounds: vec![0.0; n],
            upper_bounds: vec![1.0; n],
            rows: Vec::new(),
        }
    }

    pub fn fix(&mut self, var: usize, value: f64) {
        self.lower_bounds[var] = value;
        self.upper_bounds[var] = value;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimplexConfig {
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for SimplexConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200_000,
            tolerance: 1e-9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpStatus {
    Optimal,
    Infeasible,
    Unbounded,
    IterationLimit,
}

#[derive(Debug, Clone)]
pub struct LpSolution {
    pub status: LpStatus,
    pub point: Vec<f64>,
    pub objective: f64,
    pub iterations: usize,
}

impl LpSolution {
    fn failed(status: LpStatus, n: usize, iterations: usize) -> Self {
        Self {
            status,
            point: vec![0.0; n],
            objective: f64::NAN,
            iterations,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sense {
    Le,
    Ge,
    Eq,
}

struct Constraint {
    coefficients: Vec<f64>,
    sense: Sense,
    rhs: f64,
}

/// Tableau in canonical form. The cost row holds reduced costs and, in its
/// last entry, the negated objective value.
struct Tableau {
    rows: Vec<Vec<f64>>,
    cost: Vec<f64>,
    basis: Vec<usize>,
    width: usize,
    tolerance: f64,
}

impl Tableau {
    fn rhs(&self, r: usize) -> f64 {
        self.rows[r][self.width]
    }

    fn pivot(&mut self, r: usize, c: usize) {
        let p = self.rows[r][c];
        for v in self.rows[r].iter_mut() {
            *v /= p;
        }
        let pivot_row = self.rows[r].clone();
        for (i, row) in self.rows.iter_mut().enumerate() {
            let factor = row[c];
            if i == r || factor == 0.0 {
                continue;
            }
            for (v, &pv) in row.iter_mut().zip(&pivot_row) {
                *v -= factor * pv;
            }
        }
        let factor = self.cost[c];
        if factor != 0.0 {
            for (v, &pv) in self.cost.iter_mut().zip(&pivot_row) {
                *v -= factor * pv;
            }
        }
        self.basis[r] = c;
    }

    /// Loads the reduced costs of `costs` for the current basis.
    fn price(&mut self, costs: &[f64]) {
        self.cost = costs.to_vec();
        self.cost.push(0.0);
        for (r, row) in self.rows.iter().enumerate() {
            let cb = costs[self.basis[r]];
            if cb == 0.0 {
                continue;
            }
            for (v, &a) in self.cost.iter_mut().zip(row) {
                *v -= cb * a;
            }
        }
    }

    fn entering(&self, allowed: usize, bland: bool) -> Option<usize> {
        let candidates = (0..allowed).filter(|&j| self.cost[j] < -self.tolerance);
        if bland {
            return candidates.min();
        }
        candidates.min_by(|&a, &b| self.cost[a].total_cmp(&self.cost[b]))
    }

    /// Minimum ratio row; ties go to the smallest basic column.
    fn leaving(&self, c: usize) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for r in 0..self.rows.len() {
            let a = self.rows[r][c];
            if a <= self.tolerance {
                continue;
            }
            let ratio = self.rhs(r) / a;
            best = match best {
                Some((br, bratio))
                    if ratio > bratio + self.tolerance
                        || ((ratio - bratio).abs() <= self.tolerance
                            && self.basis[r] >= self.basis[br]) =>
                {
                    Some((br, bratio))
                }
                _ => Some((r, ratio)),
            };
        }
        best.map(|(r, _)| r)
    }

    fn optimize(
        &mut self,
        allowed: usize,
        config: &SimplexConfig,
        iterations: &mut usize,
    ) -> Result<(), LpStatus> {
        let mut bland = false;
        let mut streak = 0;
        loop {
            if *iterations >= config.max_iterations {
                return Err(LpStatus::IterationLimit);
            }
            let Some(c) = self.entering(allowed, bland) else {
                return Ok(());
            };
            let Some(r) = self.leaving(c) else {
                return Err(LpStatus::Unbounded);
            };
            if self.rhs(r) <= self.tolerance {
                streak += 1;
                if streak >= DEGENERATE_STREAK && !bland {
                    trace!("switching to Bland's rule after {streak} degenerate pivots");
                    bland = true;
                }
            } else {
                streak = 0;
            }
            self.pivot(r, c);
            *iterations += 1;
        }
    }
}

/// Minimizes `lp` with the two-phase simplex method.
///
/// Fixed variables are substituted out; finite upper bounds become rows of
/// the tableau. Phase one minimizes the sum of artificial variables, phase two
/// the objective with artificial columns barred from entering.
pub fn minimize(lp: &LinearProgram, config: &SimplexConfig) -> LpSolution {
    let n = lp.objective.len();
    let tol = config.tolerance;

    if (0..n).any(|j| lp.lower_bounds[j] > lp.upper_bounds[j] + tol) {
        return LpSolution::failed(LpStatus::Infeasible, n, 0);
    }

    let free: Vec<usize> = (0..n)
        .filter(|&j| lp.upper_bounds[j] - lp.lower_bounds[j] > tol)
        .collect();
    let mut column = vec![usize::MAX; n];
    for (c, &j) in free.iter().enumerate() {
        column[j] = c;
    }
    let nf = free.len();

    let mut constraints = Vec::new();
    for (c, &j) in free.iter().enumerate() {
        let range = lp.upper_bounds[j] - lp.lower_bounds[j];
        if range.is_finite() {
            let mut coefficients = vec![0.0; nf];
            coefficients[c] = 1.0;
            constraints.push(Constraint {
                coefficients,
                sense: Sense::Le,
                rhs: range,
            });
        }
    }

    for row in &lp.rows {
        let mut coefficients = vec![0.0; nf];
        let mut shift = 0.0;
        for &(j, a) in &row.coefficients {
            shift += a * lp.lower_bounds[j];
            if column[j] != usize::MAX {
                coefficients[column[j]] += a;
            }
        }
        let mut senses = Vec::with_capacity(2);
        if row.lower.is_finite() && row.upper.is_finite() && row.upper - row.lower <= tol {
            senses.push((Sense::Eq, row.upper - shift));
        } else {
            if row.upper.is_finite() {
                senses.push((Sense::Le, row.upper - shift));
            }
            if row.lower.is_finite() {
                senses.push((Sense::Ge, row.lower - shift));
            }
        }
        let empty = coefficients.iter().all(|a| a.abs() <= tol);
        for (sense, rhs) in senses {
            if empty {
                let holds = match sense {
                    Sense::Le => rhs >= -FEASIBILITY_TOLERANCE,
                    Sense::Ge => rhs <= FEASIBILITY_TOLERANCE,
                    Sense::Eq => rhs.abs() <= FEASIBILITY_TOLERANCE,
                };
                if !holds {
                    return LpSolution::failed(LpStatus::Infeasible, n, 0);
                }
                continue;
            }
            constraints.push(Constraint {
                coefficients: coefficients.clone(),
                sense,
                rhs,
            });
        }
    }

    for constraint in &mut constraints {
        if constraint.rhs < 0.0 {
            constraint.rhs = -constraint.rhs;
            constraint.coefficients.iter_mut().for_each(|a| *a = -*a);
            constraint.sense = match constraint.sense {
                Sense::Le => Sense::Ge,
                Sense::Ge => Sense::Le,
                Sense::Eq => Sense::Eq,
            };
        }
    }

    let slacks = constraints.iter().filter(|c| c.sense != Sense::Eq).count();
    let artificials = constraints.iter().filter(|c| c.sense != Sense::Le).count();
    let slack_start = nf;
    let artificial_start = nf + slacks;
    let width = artificial_start + artificials;

    let mut rows = Vec::with_capacity(constraints.len());
    let mut basis = Vec::with_capacity(constraints.len());
    let (mut next_slack, mut next_artificial) = (slack_start, artificial_start);
    for constraint in constraints {
        let mut row = constraint.coefficients;
        row.resize(width + 1, 0.0);
        row[width] = constraint.rhs;
        match constraint.sense {
            Sense::Le => {
                row[next_slack] = 1.0;
                basis.push(next_slack);
                next_slack += 1;
            }
            Sense::Ge => {
                row[next_slack] = -1.0;
                row[next_artificial] = 1.0;
                basis.push(next_artificial);
                next_slack += 1;
                next_artificial += 1;
            }
            Sense::Eq => {
                row[next_artificial] = 1.0;
                basis.push(next_artificial);
                next_artificial += 1;
            }
        }
        rows.push(row);
    }

    let mut tableau = Tableau {
        rows,
        cost: Vec::new(),
        basis,
        width,
        tolerance: tol,
    };
    let mut iterations = 0;

    if artificials > 0 {
        let mut phase_one = vec![0.0; width];
        phase_one[artificial_start..].iter_mut().for_each(|c| *c = 1.0);
        tableau.price(&phase_one);
        if let Err(status) = tableau.optimize(width, config, &mut iterations) {
            return LpSolution::failed(status, n, iterations);
        }
        if -tableau.cost[width] > FEASIBILITY_TOLERANCE {
            return LpSolution::failed(LpStatus::Infeasible, n, iterations);
        }
        for r in 0..tableau.rows.len() {
            if tableau.basis[r] < artificial_start {
                continue;
            }
            if let Some(c) = (0..artificial_start).find(|&c| tableau.rows[r][c].abs() > tol) {
                tableau.pivot(r, c);
            }
        }
    }

    let mut costs = vec![0.0; width];
    for (c, &j) in free.iter().enumerate() {
        costs[c] = lp.objective[j];
    }
    tableau.price(&costs);
    if let Err(status) = tableau.optimize(artificial_start, config, &mut iterations) {
        return LpSolution::failed(status, n, iterations);
    }

    let mut point = lp.lower_bounds.clone();
    for (r, &b) in tableau.basis.iter().enumerate() {
        if b < nf {
            let j = free[b];
            point[j] = (lp.lower_bounds[j] + tableau.rhs(r)).clamp(lp.lower_bounds[j], lp.upper_bounds[j]);
        }
    }
    let objective = point.iter().zip(&lp.objective).fold(0.0, |acc, (x, c)| acc + x * c);
    trace!("simplex finished after {iterations} pivots, objective {objective}");

    LpSolution {
        status: LpStatus::Optimal,
        point,
        objective,
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn le(coefficients: Vec<(usize, f64)>, upper: f64) -> LinearRow {
        LinearRow {
            coefficients,
            lower: f64::NEG_INFINITY,
            upper,
        }
    }

    fn ge(coefficients: Vec<(usize, f64)>, lower: f64) -> LinearRow {
        LinearRow {
            coefficients,
            lower,
            upper: f64::INFINITY,
        }
    }

    #[test]
    fn test_simple_maximization() {
        let mut lp = LinearProgram::unit_box(vec![-1.0, -1.0]);
        lp.rows.push(le(vec![(0, 1.0), (1, 1.0)], 1.0));
        let solution = minimize(&lp, &SimplexConfig::default());
        assert_eq!(solution.status, LpStatus::Optimal);
        assert_abs_diff_eq!(solution.objective, -1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_greater_equal_rows_need_phase_one() {
        let mut lp = LinearProgram::unit_box(vec![1.0, 2.0]);
        lp.rows.push(ge(vec![(0, 1.0), (1, 1.0)], 1.5));
        let solution = minimize(&lp, &SimplexConfig::default());
        assert_eq!(solution.status, LpStatus::Optimal);
        assert_abs_diff_eq!(solution.objective, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(solution.point[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(solution.point[1], 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_equality_row() {
        let mut lp = LinearProgram::unit_box(vec![-1.0, 1.0]);
        lp.rows.push(LinearRow {
            coefficients: vec![(0, 1.0), (1, 1.0)],
            lower: 1.2,
            upper: 1.2,
        });
        let solution = minimize(&lp, &SimplexConfig::default());
        assert_eq!(solution.status, LpStatus::Optimal);
        assert_abs_diff_eq!(solution.objective, -0.8, epsilon = 1e-9);
    }

    #[test]
    fn test_infeasible() {
        let mut lp = LinearProgram::unit_box(vec![1.0, 1.0]);
        lp.rows.push(ge(vec![(0, 1.0), (1, 1.0)], 3.0));
        assert_eq!(minimize(&lp, &SimplexConfig::default()).status, LpStatus::Infeasible);
    }

    #[test]
    fn test_fixed_variables_are_substituted() {
        let mut lp = LinearProgram::unit_box(vec![-1.0, -1.0]);
        lp.rows.push(le(vec![(0, 1.0), (1, 1.0)], 1.5));
        lp.fix(0, 1.0);
        let solution = minimize(&lp, &SimplexConfig::default());
        assert_eq!(solution.status, LpStatus::Optimal);
        assert_eq!(solution.point[0], 1.0);
        assert_abs_diff_eq!(solution.point[1], 0.5, epsilon = 1e-9);

        lp.fix(1, 1.0);
        assert_eq!(minimize(&lp, &SimplexConfig::default()).status, LpStatus::Infeasible);
    }

    #[test]
    fn test_unbounded() {
        let mut lp = LinearProgram::unit_box(vec![-1.0]);
        lp.upper_bounds[0] = f64::INFINITY;
        assert_eq!(minimize(&lp, &SimplexConfig::default()).status, LpStatus::Unbounded);
    }

    #[test]
    fn test_beale_cycling_example() {
        // Cycles under the textbook rule without an anti-cycling fallback.
        let mut lp = LinearProgram {
            objective: vec![-0.75, 20.0, -0.5, 6.0],
            lower_bounds: vec![0.0; 4],
            upper_bounds: vec![f64::INFINITY; 4],
            rows: Vec::new(),
        };
        lp.rows.push(le(vec![(0, 0.25), (1, -8.0), (2, -1.0), (3, 9.0)], 0.0));
        lp.rows.push(le(vec![(0, 0.5), (1, -12.0), (2, -0.5), (3, 3.0)], 0.0));
        lp.rows.push(le(vec![(2, 1.0)], 1.0));
        let solution = minimize(&lp, &SimplexConfig::default());
        assert_eq!(solution.status, LpStatus::Optimal);
        assert_abs_diff_eq!(solution.objective, -0.05, epsilon = 1e-9);
    }

    #[test]
    fn test_iteration_limit() {
        let mut lp = LinearProgram::unit_box(vec![-1.0, -1.0]);
        lp.rows.push(le(vec![(0, 1.0), (1, 1.0)], 1.0));
        let config = SimplexConfig {
            max_iterations: 0,
            ..SimplexConfig::default()
        };
        assert_eq!(minimize(&lp, &config).status, LpStatus::IterationLimit);
    }
}
