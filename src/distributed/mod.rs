//! Distribution of a matrix across a process group
//!
//! - [`scatter_rows`]: hands every rank the rows it owns under the cyclic partition
//! - [`resolve_ghosts`]: rewrites a rank's rows to local indexing and negotiates the
//!   [`CommunicationPlan`]
//! - [`GhostExchanger`]: refreshes the ghost segment of an [`ExtendedVector`] before
//!   each multiply

pub mod exchange;
pub mod resolve;
pub mod scatter;

pub use exchange::{ExtendedVector, GhostExchanger};
pub use resolve::{resolve_ghosts, CommunicationPlan, GhostResolution};
pub use scatter::scatter_rows;
