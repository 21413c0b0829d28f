//! # Island Solver
//!
//! Solves one island's velocity constraints as a dense linear system.
//!
//! Every row `i` has a Jacobian `J_i` with one direction per dynamic body it
//! touches. The system is `A λ = b` with `A = J M⁻¹ Jᵀ` and
//! `b = target - J v`, where `target` is the velocity the row asks for
//! (Baumgarte feedback on penetration or joint drift). The diagonal is
//! scaled before solving so `A` is strictly positive definite.
//!
//! Contact rows may only push. Rows that come back with a negative impulse
//! are dropped and the reduced system is solved again.

use compute::{flush_to_zero, flush_to_zero_slice, gaussian_elimination, ComputeError, ConjugateGradient};

use crate::config::SolverConfig;
use crate::types::{BodyId, Vec3};

/// Systems up to this many rows use Gaussian elimination.
const DIRECT_SOLVE_ROWS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct IslandBody {
    pub id: BodyId,
    pub velocity: Vec3,
    pub inv_mass: f32,
}

/// One scalar velocity constraint. `a` and `b` hold the island-local body
/// index and Jacobian direction; static bodies are left out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Row {
    pub a: Option<(usize, Vec3)>,
    pub b: Option<(usize, Vec3)>,
    pub target: f32,
    /// Contact rows: the impulse must not pull.
    pub unilateral: bool,
}

impl Row {
    fn terms(&self) -> impl Iterator<Item = (usize, Vec3)> {
        self.a.into_iter().chain(self.b)
    }

    fn velocity(&self, bodies: &[IslandBody]) -> f32 {
        self.terms().map(|(k, dir)| dir.dot(bodies[k].velocity)).sum()
    }

    /// `J_self M⁻¹ J_otherᵀ`
    fn coupling(&self, other: &Self, bodies: &[IslandBody]) -> f32 {
        let mut sum = 0.0;
        for (k, dir) in self.terms() {
            for (m, other_dir) in other.terms() {
                if k == m {
                    sum += bodies[k].inv_mass * dir.dot(other_dir);
                }
            }
        }
        sum
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct IslandSolution {
    pub velocity_deltas: Vec<(BodyId, Vec3)>,
    /// Conjugate gradient iterations across all active-set passes.
    pub iterations: usize,
}

pub(crate) fn solve_island(
    bodies: &[IslandBody],
    rows: &[Row],
    config: &SolverConfig,
) -> Result<IslandSolution, ComputeError> {
    let mut active = vec![true; rows.len()];
    let mut impulses = vec![0.0_f32; rows.len()];
    let mut iterations = 0;

    // Every pass either converges or drops at least one row.
    for _ in 0..=rows.len() {
        let indices: Vec<usize> = (0..rows.len()).filter(|&i| active[i]).collect();
        impulses.fill(0.0);
        if indices.is_empty() {
            break;
        }

        let lambda = solve_rows(bodies, rows, &indices, config, &mut iterations)?;
        for (&row, value) in indices.iter().zip(lambda) {
            impulses[row] = value;
        }

        let mut dropped = false;
        for &row in &indices {
            if rows[row].unilateral && impulses[row] < 0.0 {
                active[row] = false;
                dropped = true;
            }
        }
        if !dropped {
            break;
        }
    }

    let mut deltas = vec![Vec3::ZERO; bodies.len()];
    for (row, &lambda) in rows.iter().zip(&impulses) {
        let lambda = if row.unilateral { lambda.max(0.0) } else { lambda };
        for (k, dir) in row.terms() {
            deltas[k] += dir * (lambda * bodies[k].inv_mass);
        }
    }

    Ok(IslandSolution {
        velocity_deltas: bodies
            .iter()
            .zip(deltas)
            .map(|(body, delta)| {
                let delta = Vec3::new(flush_to_zero(delta.x), flush_to_zero(delta.y), flush_to_zero(delta.z));
                (body.id, delta)
            })
            .collect(),
        iterations,
    })
}

fn solve_rows(
    bodies: &[IslandBody],
    rows: &[Row],
    indices: &[usize],
    config: &SolverConfig,
    iterations: &mut usize,
) -> Result<Vec<f32>, ComputeError> {
    let n = indices.len();
    let mut a = vec![0.0_f32; n * n];
    let mut b = vec![0.0_f32; n];

    for (i, &ri) in indices.iter().enumerate() {
        let row = &rows[ri];
        b[i] = row.target - row.velocity(bodies);
        for (j, &rj) in indices.iter().enumerate() {
            a[i * n + j] = row.coupling(&rows[rj], bodies);
        }
        let diag = &mut a[i * n + i];
        if *diag > f32::MIN_POSITIVE {
            *diag *= config.diagonal_scale;
        } else {
            // Row touches no mass; leave it inert
            *diag = 1.0;
            b[i] = 0.0;
        }
    }

    if n <= DIRECT_SOLVE_ROWS {
        gaussian_elimination(n, &mut a, &mut b)?;
        return Ok(b);
    }

    let solver = if config.max_iterations == 0 {
        ConjugateGradient::default()
    } else {
        ConjugateGradient::with_max_iterations(config.max_iterations)
    };
    let mut x = vec![0.0_f32; n];
    let mut precond = vec![0.0_f32; 2 * n];
    let report = solver.solve(n, config.tolerance, &mut x, &b, &a, &mut precond)?;
    *iterations += report.iterations;
    flush_to_zero_slice(&mut x);
    Ok(x)
}
