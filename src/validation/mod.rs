//! Entity constraint validation
//!
//! Registers may declare constraints their members must satisfy. The
//! store evaluates them through a `ConstraintValidator` before any write;
//! a failing rule aborts the write with a ValidationError naming it.

mod constraint;
mod validator;

pub use constraint::Constraint;
pub use validator::{check_constraints, ConstraintValidator, ShapeValidator};
