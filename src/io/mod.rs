//! Matrix sources for the benchmark driver

pub mod matrix_market;
pub mod synthetic;

pub use matrix_market::{parse_matrix_market, read_matrix_market};
pub use synthetic::{generate_local, seeded_vector};
