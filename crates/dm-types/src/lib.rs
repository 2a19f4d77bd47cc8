//! # dm-types
//!
//! Core data model for Schwarzschild model fitting: search parameters, the
//! physical system they belong to, the ordered parameter space and the
//! candidate models built from it.

pub mod errors;
pub mod model;
pub mod parameter;
pub mod space;
pub mod system;

pub use errors::*;
pub use model::*;
pub use parameter::*;
pub use space::*;
pub use system::*;
