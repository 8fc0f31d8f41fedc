//! Solvers for the multiclass training problem
//!
//! This module contains the SDCA solver for L2-regularized maximum-entropy
//! (multinomial logistic regression) classification.

pub mod sdca;

pub use self::sdca::{log_sum_exp, softmax_into, SdcaSolver};
