pub mod static_sim;

pub use static_sim::{simulate, simulate_with_rng, SimulationResult};
