//! # API Route Handlers
//!
//! The liveness endpoints live in `general`; the upload trigger in `upload`.

pub mod general;
pub mod upload;

pub use general::*;
pub use upload::*;

use super::{errors::AppError, state::AppState};
