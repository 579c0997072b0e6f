//! Field storage and field-level operators.
//!
//! - [`Array3`]: dense strided storage with halo-padded index ranges
//! - [`Field`]: one padded quantity with core and wall bookkeeping
//! - [`PlainScalar`], [`PlainVector`]: BC-free RHS scratch buffers
//! - [`ScalarField`], [`VectorField`]: decorated fields with boundary
//!   conditions and the differential operations of the governing equations

mod array3;
#[allow(clippy::module_inception)]
mod field;
mod plain;
mod scalar;
mod vector;

pub use array3::Array3;
pub use field::Field;
pub use plain::{PlainScalar, PlainVector};
pub use scalar::ScalarField;
pub use vector::VectorField;
