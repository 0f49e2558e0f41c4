//! Pure deduction calculators.
//!
//! Each calculator is a function of an amount and a parameter table. None of
//! them read the store or the clock.

pub mod common;
pub mod graduated;
pub mod percentage;
pub mod tiered;

pub use graduated::compute_graduated;
pub use percentage::compute_percentage;
pub use tiered::compute_tiered;
