//! Scholarship grade projection and its two-step conversation.

pub mod flow;
pub mod scholarship;

pub use flow::{CalculatorState, CalculatorStep, advance};
pub use scholarship::{Projection, Threshold, ValidationError, percent, project};
