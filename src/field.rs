//! Reaction–diffusion concentration field on a square grid.
//!
//! Each tick solves the Crank–Nicolson system
//! `(I/dt − κL/2) u' = (I/dt + κL/2) u + R(u)`
//! where `L` is the 5-point Laplacian with spacing `h = size / (N − 1)`.
//! The outer ring of grid points is pinned: identity rows in both operators
//! and no reaction, so ring values never change.

use log::debug;
use rayon::prelude::*;
use stemcell_common::{InitialCondition, ReactionKind, SimParams, Vec2};

use crate::banded::{BandedLu, BandedMatrix};
use crate::error::FieldError;

pub type ReactionFn = Box<dyn Fn(f64) -> f64 + Send + Sync>;

pub struct DiffusionField {
    resolution: usize,
    size: f64,
    spacing: f64,
    dt: f64,
    kappa: f64,
    values: Vec<f64>,
    implicit: BandedLu,
    reaction: ReactionFn,
    rhs: Vec<f64>,
}

impl DiffusionField {
    /// Allocates the field, evaluates `initial` at every grid point and
    /// factors the implicit operator once.
    pub fn new<F, R>(resolution: usize, size: f64, kappa: f64, dt: f64, initial: F, reaction: R) -> Result<Self, FieldError>
    where
        F: Fn(f64, f64) -> f64,
        R: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        if resolution < 3 {
            return Err(FieldError::InvalidGrid(format!("resolution {} leaves no interior points", resolution)));
        }
        if !(size > 0.0) || !(dt > 0.0) {
            return Err(FieldError::InvalidGrid(format!("size {} and dt {} must be positive", size, dt)));
        }

        let spacing = size / (resolution - 1) as f64;
        let n = resolution;
        let mut values = vec![0.0; n * n];
        for row in 0..n {
            for col in 0..n {
                values[row * n + col] = initial(col as f64 * spacing, row as f64 * spacing);
            }
        }

        let implicit = build_implicit_operator(n, spacing, kappa, dt).factorize()?;
        debug!("Factored {}x{} implicit operator (h = {:.4}, dt = {:.5}).", n * n, n * n, spacing, dt);

        Ok(Self {
            resolution: n,
            size,
            spacing,
            dt,
            kappa,
            values,
            implicit,
            reaction: Box::new(reaction),
            rhs: vec![0.0; n * n],
        })
    }

    /// Builds the field described by the configuration.
    pub fn from_params(params: &SimParams, initial: &InitialCondition, reaction: ReactionKind) -> Result<Self, FieldError> {
        let initial = initial_condition_fn(initial, params.domain_size);
        Self::new(
            params.resolution as usize,
            params.domain_size,
            params.kappa,
            params.field_dt,
            initial,
            reaction_fn(reaction),
        )
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.resolution + col]
    }

    pub fn is_boundary(&self, row: usize, col: usize) -> bool {
        row == 0 || col == 0 || row == self.resolution - 1 || col == self.resolution - 1
    }

    /// Sum over grid points off the pinned ring.
    pub fn interior_mass(&self) -> f64 {
        let n = self.resolution;
        (1..n - 1).map(|row| self.values[row * n + 1..row * n + n - 1].iter().sum::<f64>()).sum()
    }

    /// Advances the field one implicit step.
    pub fn step(&mut self) {
        let n = self.resolution;
        let inv_dt = 1.0 / self.dt;
        let w = self.kappa / (2.0 * self.spacing * self.spacing);
        let values = &self.values;
        let reaction = &self.reaction;

        self.rhs.par_iter_mut().enumerate().for_each(|(idx, out)| {
            let row = idx / n;
            let col = idx % n;
            let u = values[idx];
            if row == 0 || col == 0 || row == n - 1 || col == n - 1 {
                *out = u;
                return;
            }
            let neighbors = values[idx - 1] + values[idx + 1] + values[idx - n] + values[idx + n];
            *out = u * inv_dt + w * (neighbors - 4.0 * u) + reaction(u);
        });

        self.implicit.solve_in_place(&mut self.rhs);
        std::mem::swap(&mut self.values, &mut self.rhs);
    }

    /// Grid coordinates `(row, col)` of the cell containing `point`.
    ///
    /// Positions outside `[0, size]²` are rejected rather than clamped.
    pub fn grid_index(&self, point: Vec2) -> Result<(usize, usize), FieldError> {
        let out_of_domain = || FieldError::OutOfDomain { x: point.x, y: point.y, resolution: self.resolution };
        if !point.x.is_finite() || !point.y.is_finite() || point.x < 0.0 || point.y < 0.0 {
            return Err(out_of_domain());
        }
        let col = (point.x / self.spacing).floor() as usize;
        let row = (point.y / self.spacing).floor() as usize;
        if row >= self.resolution || col >= self.resolution {
            return Err(out_of_domain());
        }
        Ok((row, col))
    }

    /// Concentration read by an agent at `point` (row-major lookup).
    pub fn sample(&self, point: Vec2) -> Result<f64, FieldError> {
        let (row, col) = self.grid_index(point)?;
        Ok(self.values[row * self.resolution + col])
    }
}

impl std::fmt::Debug for DiffusionField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiffusionField")
            .field("resolution", &self.resolution)
            .field("size", &self.size)
            .field("spacing", &self.spacing)
            .field("dt", &self.dt)
            .field("kappa", &self.kappa)
            .finish_non_exhaustive()
    }
}

/// `I/dt − κL/2` with the boundary ring replaced by identity rows.
fn build_implicit_operator(n: usize, spacing: f64, kappa: f64, dt: f64) -> BandedMatrix {
    let w = kappa / (2.0 * spacing * spacing);
    let mut m = BandedMatrix::zeros(n * n, n);
    for row in 0..n {
        for col in 0..n {
            let idx = row * n + col;
            if row == 0 || col == 0 || row == n - 1 || col == n - 1 {
                m.pin_row(idx);
                continue;
            }
            m.set(idx, idx, 1.0 / dt + 4.0 * w);
            m.set(idx, idx - 1, -w);
            m.set(idx, idx + 1, -w);
            m.set(idx, idx - n, -w);
            m.set(idx, idx + n, -w);
        }
    }
    m
}

pub fn initial_condition_fn(initial: &InitialCondition, size: f64) -> Box<dyn Fn(f64, f64) -> f64> {
    match *initial {
        InitialCondition::Gaussian { center, amplitude, width } => {
            let (cx, cy) = center.unwrap_or((size / 2.0, size / 2.0));
            let inv_w2 = 1.0 / (width * width);
            Box::new(move |x, y| amplitude * (-((x - cx).powi(2) + (y - cy).powi(2)) * inv_w2).exp())
        }
        InitialCondition::Uniform { value } => Box::new(move |_, _| value),
        InitialCondition::Linear { a, bx, by } => Box::new(move |x, y| a + bx * x + by * y),
    }
}

pub fn reaction_fn(kind: ReactionKind) -> fn(f64) -> f64 {
    match kind {
        ReactionKind::None => no_reaction,
        ReactionKind::Logistic => logistic,
        ReactionKind::Log => log_growth,
    }
}

fn no_reaction(_: f64) -> f64 {
    0.0
}

fn logistic(u: f64) -> f64 {
    u * (1.0 - u)
}

fn log_growth(u: f64) -> f64 {
    (u.abs() + 2.0).ln()
}
