//! # dm-optimizer
//!
//! Parameter generation for Schwarzschild model fitting.
//!
//! A driver loop calls [`ParameterGenerator::generate`] with the table of
//! models evaluated so far. The generator checks its stopping criteria, asks
//! the configured [`SearchStrategy`] for candidates, drops the ones already in
//! the table and appends the rest for evaluation.

mod emulator;
mod generator;
mod grid;
mod settings;
mod status;
mod table;

pub use emulator::GaussianProcessEmulator;
pub use generator::{ParameterGenerator, SearchStrategy};
pub use grid::{clip, GridSearch};
pub use settings::{GeneratorKind, GeneratorSettings, StoppingCriteria};
pub use status::{
    GeneratorStatus, GPE_EXHAUSTED, MIN_DELTA_CHI2_REACHED, N_MAX_ITER_REACHED,
    N_MAX_MODS_REACHED,
};
pub use table::{AllModels, CellValue, Column, ColumnType, ModelTable};
