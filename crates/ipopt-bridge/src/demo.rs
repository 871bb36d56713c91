//! Hock–Schittkowski problem 71, the classic four-variable example.
//!
//! ```text
//! min   x0 x3 (x0 + x1 + x2) + x2
//! s.t.  x0 x1 x2 x3          >= 25
//!       x0² + x1² + x2² + x3²  = 40
//!       1 <= x <= 5
//! ```
//!
//! Starting from `(1, 5, 5, 1)` the optimum is about `17.014` at
//! `(1.000, 4.743, 3.821, 1.379)`.

use ipopt_bridge_sys::Number;

use crate::callbacks::Evaluator;
use crate::options::SolverOptions;
use crate::problem::{Bounds, Sparsity};
use crate::sparse::{SparseQuery, SparsityPattern};

pub const N: usize = 4;
pub const M: usize = 2;

/// Known optimal objective.
pub const OPTIMAL_OBJECTIVE: Number = 17.014_017;

/// Evaluator for HS071. `g_offset` shifts both constraint values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hs071 {
    pub g_offset: [Number; M],
}

impl Hs071 {
    pub fn with_offset(g_offset: [Number; M]) -> Self {
        Self { g_offset }
    }

    pub fn variable_bounds() -> Bounds {
        Bounds::new(vec![1.0; N], vec![5.0; N])
    }

    pub fn constraint_bounds() -> Bounds {
        Bounds::new(vec![25.0, 40.0], vec![2e19, 40.0])
    }

    pub fn jacobian_pattern() -> SparsityPattern {
        SparsityPattern::dense(M, N)
    }

    pub fn hessian_pattern() -> SparsityPattern {
        SparsityPattern::lower_triangle(N)
    }

    pub fn sparsity() -> Sparsity {
        Sparsity::from_patterns(&Self::jacobian_pattern(), &Self::hessian_pattern())
    }

    pub fn starting_point() -> Vec<Number> {
        vec![1.0, 5.0, 5.0, 1.0]
    }

    /// Options the classic driver sets before the first solve.
    pub fn default_options() -> SolverOptions {
        let mut options = SolverOptions::new();
        options.insert("tol", 3.82e-6);
        options.insert("mu_strategy", "adaptive");
        options
    }

    /// Options added before the warm-started second solve.
    pub fn warm_start_options() -> SolverOptions {
        let mut options = SolverOptions::new();
        options.insert("warm_start_init_point", "yes");
        options.insert("bound_push", 1e-5);
        options.insert("bound_frac", 1e-5);
        options
    }
}

impl Evaluator for Hs071 {
    fn objective(&mut self, x: &[Number], _new_x: bool, obj: &mut Number) -> bool {
        if x.len() != N {
            return false;
        }
        *obj = x[0] * x[3] * (x[0] + x[1] + x[2]) + x[2];
        true
    }

    fn gradient(&mut self, x: &[Number], _new_x: bool, grad_f: &mut [Number]) -> bool {
        if x.len() != N || grad_f.len() != N {
            return false;
        }
        grad_f[0] = x[0] * x[3] + x[3] * (x[0] + x[1] + x[2]);
        grad_f[1] = x[0] * x[3];
        grad_f[2] = x[0] * x[3] + 1.0;
        grad_f[3] = x[0] * (x[0] + x[1] + x[2]);
        true
    }

    fn constraints(&mut self, x: &[Number], _new_x: bool, g: &mut [Number]) -> bool {
        if x.len() != N || g.len() != M {
            return false;
        }
        g[0] = x[0] * x[1] * x[2] * x[3] + self.g_offset[0];
        g[1] = x.iter().map(|v| v * v).sum::<Number>() + self.g_offset[1];
        true
    }

    fn jacobian(&mut self, x: &[Number], _new_x: bool, mut query: SparseQuery<'_>) -> bool {
        if let Some(answered) = Self::jacobian_pattern().answer_structure(&mut query) {
            return answered;
        }
        let SparseQuery::Values(values) = query else {
            return false;
        };
        if x.len() != N || values.len() != M * N {
            return false;
        }
        values[0] = x[1] * x[2] * x[3];
        values[1] = x[0] * x[2] * x[3];
        values[2] = x[0] * x[1] * x[3];
        values[3] = x[0] * x[1] * x[2];

        values[4] = 2.0 * x[0];
        values[5] = 2.0 * x[1];
        values[6] = 2.0 * x[2];
        values[7] = 2.0 * x[3];
        true
    }

    fn hessian(
        &mut self,
        x: &[Number],
        _new_x: bool,
        obj_factor: Number,
        lambda: &[Number],
        _new_lambda: bool,
        mut query: SparseQuery<'_>,
    ) -> bool {
        if let Some(answered) = Self::hessian_pattern().answer_structure(&mut query) {
            return answered;
        }
        let SparseQuery::Values(values) = query else {
            return false;
        };
        if x.len() != N || lambda.len() != M || values.len() != 10 {
            return false;
        }
        // objective
        values[0] = obj_factor * (2.0 * x[3]); // 0,0
        values[1] = obj_factor * x[3]; // 1,0
        values[2] = 0.0; // 1,1
        values[3] = obj_factor * x[3]; // 2,0
        values[4] = 0.0; // 2,1
        values[5] = 0.0; // 2,2
        values[6] = obj_factor * (2.0 * x[0] + x[1] + x[2]); // 3,0
        values[7] = obj_factor * x[0]; // 3,1
        values[8] = obj_factor * x[0]; // 3,2
        values[9] = 0.0; // 3,3

        // first constraint
        values[1] += lambda[0] * (x[2] * x[3]);
        values[3] += lambda[0] * (x[1] * x[3]);
        values[4] += lambda[0] * (x[0] * x[3]);
        values[6] += lambda[0] * (x[1] * x[2]);
        values[7] += lambda[0] * (x[0] * x[2]);
        values[8] += lambda[0] * (x[0] * x[1]);

        // second constraint
        values[0] += lambda[1] * 2.0;
        values[2] += lambda[1] * 2.0;
        values[5] += lambda[1] * 2.0;
        values[9] += lambda[1] * 2.0;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const X0: [Number; 4] = [1.0, 5.0, 5.0, 1.0];

    #[test]
    fn test_values_at_start() {
        let mut hs = Hs071::default();
        let mut obj = 0.0;
        assert!(hs.objective(&X0, true, &mut obj));
        assert_eq!(obj, 16.0);

        let mut grad = [0.0; N];
        assert!(hs.gradient(&X0, false, &mut grad));
        assert_eq!(grad, [12.0, 1.0, 2.0, 11.0]);

        let mut g = [0.0; M];
        assert!(hs.constraints(&X0, false, &mut g));
        assert_eq!(g, [25.0, 52.0]);
    }

    #[test]
    fn test_offset_shifts_constraints() {
        let mut hs = Hs071::with_offset([0.2, 0.0]);
        let mut g = [0.0; M];
        assert!(hs.constraints(&X0, true, &mut g));
        assert!((g[0] - 25.2).abs() < 1e-12);
        assert_eq!(g[1], 52.0);
    }

    #[test]
    fn test_jacobian_matches_finite_differences() {
        let mut hs = Hs071::default();
        let x = [1.5, 4.0, 3.5, 1.2];
        let mut values = [0.0; 8];
        assert!(hs.jacobian(&x, true, SparseQuery::Values(&mut values)));

        let h = 1e-6;
        for (k, (row, col)) in Hs071::jacobian_pattern().entries().enumerate() {
            let mut xp = x;
            xp[col as usize] += h;
            let (mut g, mut gp) = ([0.0; M], [0.0; M]);
            hs.constraints(&x, true, &mut g);
            hs.constraints(&xp, true, &mut gp);
            let fd = (gp[row as usize] - g[row as usize]) / h;
            assert!((fd - values[k]).abs() < 1e-3, "entry {k}: {fd} vs {}", values[k]);
        }
    }

    #[test]
    fn test_hessian_objective_part_matches_gradient_differences() {
        let mut hs = Hs071::default();
        let x = [1.5, 4.0, 3.5, 1.2];
        let mut values = [0.0; 10];
        assert!(hs.hessian(&x, true, 1.0, &[0.0, 0.0], true, SparseQuery::Values(&mut values)));

        let h = 1e-6;
        for (k, (row, col)) in Hs071::hessian_pattern().entries().enumerate() {
            let mut xp = x;
            xp[col as usize] += h;
            let (mut grad, mut gradp) = ([0.0; N], [0.0; N]);
            hs.gradient(&x, true, &mut grad);
            hs.gradient(&xp, true, &mut gradp);
            let fd = (gradp[row as usize] - grad[row as usize]) / h;
            assert!((fd - values[k]).abs() < 1e-3, "entry {k}: {fd} vs {}", values[k]);
        }
    }

    #[test]
    fn test_structure_queries() {
        let mut hs = Hs071::default();
        let (mut rows, mut cols) = ([0; 10], [0; 10]);
        let query = SparseQuery::Structure {
            rows: &mut rows,
            cols: &mut cols,
        };
        assert!(hs.hessian(&[], true, 1.0, &[], true, query));
        assert_eq!(rows, [0, 1, 1, 2, 2, 2, 3, 3, 3, 3]);
        assert_eq!(cols, [0, 0, 1, 0, 1, 2, 0, 1, 2, 3]);

        let (mut rows, mut cols) = ([0; 7], [0; 7]);
        let query = SparseQuery::Structure {
            rows: &mut rows,
            cols: &mut cols,
        };
        assert!(!hs.jacobian(&[], true, query));
    }

    #[test]
    fn test_sparsity_counts() {
        assert_eq!(Hs071::sparsity(), Sparsity::new(8, 10));
    }
}
