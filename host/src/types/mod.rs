//! Boundary types for the JSON move interface.

mod requests;
mod responses;

pub use requests::*;
pub use responses::*;
