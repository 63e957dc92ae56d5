//! MNA matrix assembly and solving.

use crate::error::{CircuitError, Result};

/// Pivots smaller than this are treated as zero.
const PIVOT_EPSILON: f64 = 1e-15;

/// MNA matrix system Ax = z.
#[derive(Debug, Clone)]
pub struct MnaMatrix {
    /// System matrix A (row-major)
    pub a: Vec<f64>,
    /// Source vector z
    pub z: Vec<f64>,
    /// Solution vector x
    pub x: Vec<f64>,
    /// Matrix dimension
    pub size: usize,
    /// LU decomposition of A
    pub lu: Vec<f64>,
    /// Row permutation from partial pivoting
    pub pivots: Vec<usize>,
}

impl MnaMatrix {
    pub fn new(size: usize) -> Self {
        Self {
            a: vec![0.0; size * size],
            z: vec![0.0; size],
            x: vec![0.0; size],
            size,
            lu: vec![0.0; size * size],
            pivots: vec![0; size],
        }
    }

    /// Clear the matrix and source vector to zero.
    pub fn clear(&mut self) {
        self.a.fill(0.0);
        self.z.fill(0.0);
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.a[row * self.size + col]
    }

    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.a[row * self.size + col] += value;
    }

    pub fn add_source(&mut self, row: usize, value: f64) {
        self.z[row] += value;
    }

    /// Stamp a conductance between two nodes.
    /// For a conductance G between nodes n1 and n2:
    ///   A[n1,n1] += G
    ///   A[n2,n2] += G
    ///   A[n1,n2] -= G
    ///   A[n2,n1] -= G
    pub fn stamp_conductance(&mut self, n1: Option<usize>, n2: Option<usize>, g: f64) {
        if let Some(i) = n1 {
            self.add(i, i, g);
        }
        if let Some(j) = n2 {
            self.add(j, j, g);
        }
        if let (Some(i), Some(j)) = (n1, n2) {
            self.add(i, j, -g);
            self.add(j, i, -g);
        }
    }

    /// Couple a branch current into the KCL rows of its two nodes.
    pub fn stamp_branch_current(&mut self, n_pos: Option<usize>, n_neg: Option<usize>, br: usize) {
        if let Some(i) = n_pos {
            self.add(i, br, 1.0);
        }
        if let Some(j) = n_neg {
            self.add(j, br, -1.0);
        }
    }

    /// Stamp a voltage source between two nodes with branch current at index br.
    /// V[n+] - V[n-] = E
    pub fn stamp_voltage_source(
        &mut self,
        n_pos: Option<usize>,
        n_neg: Option<usize>,
        br: usize,
        voltage: f64,
    ) {
        self.stamp_branch_current(n_pos, n_neg, br);
        if let Some(i) = n_pos {
            self.add(br, i, 1.0);
        }
        if let Some(j) = n_neg {
            self.add(br, j, -1.0);
        }
        self.z[br] += voltage;
    }

    /// Stamp a current source between two nodes.
    /// Current flows from n+ through the source to n-.
    pub fn stamp_current_source(&mut self, n_pos: Option<usize>, n_neg: Option<usize>, current: f64) {
        if let Some(i) = n_pos {
            self.add_source(i, -current);
        }
        if let Some(j) = n_neg {
            self.add_source(j, current);
        }
    }

    /// Stamp an N-terminal device linearized around terminal voltages `v0`.
    ///
    /// `i0[n]` is the current flowing into terminal `n` at `v0` and
    /// `g[n][k]` is its derivative with respect to the voltage of terminal
    /// `k`, so that `i[n] ≈ i0[n] + Σ g[n][k] * (V[k] - v0[k])`.
    pub fn stamp_terminal_model<const N: usize>(
        &mut self,
        nodes: [Option<usize>; N],
        v0: [f64; N],
        i0: [f64; N],
        g: [[f64; N]; N],
    ) {
        for n in 0..N {
            let Some(row) = nodes[n] else { continue };
            let mut i_eq = i0[n];
            for k in 0..N {
                i_eq -= g[n][k] * v0[k];
                if let Some(col) = nodes[k] {
                    self.add(row, col, g[n][k]);
                }
            }
            self.add_source(row, -i_eq);
        }
    }

    /// Add `g` from every node to ground.
    pub fn add_node_conductance(&mut self, node_unknowns: usize, g: f64) {
        for i in 0..node_unknowns.min(self.size) {
            self.add(i, i, g);
        }
    }

    /// Perform LU decomposition with partial pivoting.
    pub fn factor(&mut self) -> Result<()> {
        let n = self.size;
        self.lu.copy_from_slice(&self.a);

        for (i, p) in self.pivots.iter_mut().enumerate() {
            *p = i;
        }

        for k in 0..n {
            let (max_row, max_val) = (k..n)
                .map(|i| (i, self.lu[i * n + k].abs()))
                .fold((k, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });

            if max_val.is_nan() || max_val < PIVOT_EPSILON {
                return Err(CircuitError::SingularMatrix);
            }

            if max_row != k {
                self.pivots.swap(k, max_row);
                for j in 0..n {
                    self.lu.swap(k * n + j, max_row * n + j);
                }
            }

            let pivot = self.lu[k * n + k];
            for i in (k + 1)..n {
                let factor = self.lu[i * n + k] / pivot;
                self.lu[i * n + k] = factor;
                if factor != 0.0 {
                    for j in (k + 1)..n {
                        self.lu[i * n + j] -= factor * self.lu[k * n + j];
                    }
                }
            }
        }

        Ok(())
    }

    /// Solve the system using the pre-computed LU decomposition.
    pub fn solve(&mut self) -> Result<()> {
        let n = self.size;

        for i in 0..n {
            self.x[i] = self.z[self.pivots[i]];
        }

        // Forward substitution (L * y = Pb)
        for i in 0..n {
            for j in 0..i {
                self.x[i] -= self.lu[i * n + j] * self.x[j];
            }
        }

        // Back substitution (U * x = y)
        for i in (0..n).rev() {
            for j in (i + 1)..n {
                self.x[i] -= self.lu[i * n + j] * self.x[j];
            }
            let diag = self.lu[i * n + i];
            if diag.abs() < PIVOT_EPSILON {
                return Err(CircuitError::SingularMatrix);
            }
            self.x[i] /= diag;
        }

        Ok(())
    }

    /// Factor and solve in one go.
    pub fn factor_and_solve(&mut self) -> Result<&[f64]> {
        self.factor()?;
        self.solve()?;
        Ok(&self.x)
    }
}
