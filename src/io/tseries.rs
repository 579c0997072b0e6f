//! Time-series statistics of global quantities.
//!
//! [`TimeSeries`] computes volume-averaged kinetic and thermal energy, the
//! maximum divergence, and the Nusselt and Reynolds numbers, reducing the
//! per-rank sums through the grid's transport. Records go to a `.dat` file
//! and to standard output, on rank 0 only.
//!
//! The solver hands the per-step subgrid kinetic energy to the writer
//! through the narrow [`TelemetrySink`] trait.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::SolverError;
use crate::field::{Array3, PlainScalar, ScalarField, VectorField};
use crate::grid::Grid;
use crate::operators::Derivative;

/// Receiver of the per-step subgrid kinetic-energy diagnostic.
pub trait TelemetrySink {
    fn record_subgrid_energy(&mut self, energy: f64);
}

/// A sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn record_subgrid_energy(&mut self, _energy: f64) {}
}

/// Global quantities of one step.
#[derive(Clone, Copy, Debug)]
pub struct StepRecord {
    pub time: f64,
    /// Volume-averaged kinetic energy `⟨|V|²/2⟩`.
    pub kinetic_energy: f64,
    /// Volume-averaged thermal energy `⟨T²/2⟩`, when a scalar is carried.
    pub thermal_energy: Option<f64>,
    /// Global maximum of `|∇·V|`.
    pub max_divergence: f64,
    /// `1 + ⟨Vz·T⟩/κ`, when a scalar is carried.
    pub nusselt: Option<f64>,
    /// `√(2·KE)/ν`.
    pub reynolds: f64,
    /// Subgrid kinetic energy recorded since the previous write.
    pub subgrid_energy: Option<f64>,
}

/// Writer of per-step global statistics.
pub struct TimeSeries {
    /// Momentum diffusivity used for the Reynolds number; set by the driver.
    pub momentum_diffusivity: f64,
    /// Scalar diffusivity used for the Nusselt number; set by the driver.
    pub scalar_diffusivity: f64,

    out: Option<BufWriter<File>>,
    subgrid_energy: Option<f64>,
    der: Derivative,
    div: PlainScalar,
    tmp: Array3,
}

impl TimeSeries {
    /// Create a writer; `path` is opened on rank 0 only. Pass `None` for a
    /// stdout-only writer.
    pub fn new(grid: &Grid, path: Option<&Path>) -> Result<Self, SolverError> {
        let out = match path {
            Some(p) if grid.rank() == 0 => Some(BufWriter::new(File::create(p)?)),
            _ => None,
        };
        Ok(Self {
            momentum_diffusivity: 1.0,
            scalar_diffusivity: 1.0,
            out,
            subgrid_energy: None,
            der: Derivative::new(grid),
            div: PlainScalar::new(grid),
            tmp: Array3::from_range(grid.full),
        })
    }

    /// Write the column header, stamped with the wall-clock start time.
    pub fn write_header(&mut self, grid: &Grid) -> Result<(), SolverError> {
        if grid.rank() != 0 {
            return Ok(());
        }
        let started = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        if let Some(f) = &mut self.out {
            writeln!(f, "# started {started}")?;
            writeln!(
                f,
                "# time  kinetic_energy  thermal_energy  max_divergence  nusselt  reynolds  subgrid_energy"
            )?;
        }
        println!("time         KE           div(V)       Re");
        Ok(())
    }

    /// Compute, record and return the global statistics of the current
    /// state.
    pub fn write_step(
        &mut self,
        grid: &Grid,
        time: f64,
        v: &VectorField,
        t: Option<&ScalarField>,
    ) -> Result<StepRecord, SolverError> {
        let core = grid.core;
        let volume = grid.domain_volume();
        let transport = grid.transport();

        let mut ke = 0.0;
        let mut thermal = 0.0;
        let mut uzt = 0.0;
        core.for_each(|p| {
            let w = grid.cell_volume(p);
            let (vx, vy, vz) = (v.vx.data[p], v.vy.data[p], v.vz.data[p]);
            ke += 0.5 * (vx * vx + vy * vy + vz * vz) * w;
            if let Some(t) = t {
                let tv = t.f.data[p];
                thermal += 0.5 * tv * tv * w;
                uzt += vz * tv * w;
            }
        });
        let ke = transport.all_reduce_sum(ke) / volume;
        let thermal = transport.all_reduce_sum(thermal) / volume;
        let uzt = transport.all_reduce_sum(uzt) / volume;

        v.divergence(grid, &self.der, &mut self.div, &mut self.tmp);
        let max_divergence = self.div.max_abs(grid);

        let record = StepRecord {
            time,
            kinetic_energy: ke,
            thermal_energy: t.map(|_| thermal),
            max_divergence,
            nusselt: t.map(|_| 1.0 + uzt / self.scalar_diffusivity),
            reynolds: (2.0 * ke).sqrt() / self.momentum_diffusivity,
            subgrid_energy: self.subgrid_energy.take(),
        };

        if grid.rank() == 0 {
            if let Some(f) = &mut self.out {
                writeln!(
                    f,
                    "{:.6e}\t{:.6e}\t{:.6e}\t{:.6e}\t{:.6e}\t{:.6e}\t{:.6e}",
                    record.time,
                    record.kinetic_energy,
                    record.thermal_energy.unwrap_or(0.0),
                    record.max_divergence,
                    record.nusselt.unwrap_or(0.0),
                    record.reynolds,
                    record.subgrid_energy.unwrap_or(0.0),
                )?;
            }
            println!(
                "{:<12.5} {:<12.5e} {:<12.5e} {:<12.5e}",
                record.time, record.kinetic_energy, record.max_divergence, record.reynolds
            );
        }
        Ok(record)
    }

    /// Flush the underlying file.
    pub fn flush(&mut self) -> Result<(), SolverError> {
        if let Some(f) = &mut self.out {
            f.flush()?;
        }
        Ok(())
    }
}

impl TelemetrySink for TimeSeries {
    fn record_subgrid_energy(&mut self, energy: f64) {
        self.subgrid_energy = Some(energy);
    }
}
