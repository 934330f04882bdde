//! # qube-evo
//!
//! Evolutionary subsystem of the QUBE concept-routing harness.
//!
//! Genomes (adapter vector + concept bias + hypercube bit-mask) steer an
//! external text generator; this crate evolves them:
//!
//! - [`Genome`]: the evolvable unit, with lineage-preserving clones
//! - [`mutation`]: bounded operators (bit-flip with a flip cap, PIP-only
//!   jumps, adapter noise under a hard L2 delta cap) plus uniform crossover
//! - [`Evaluator`]: multi-axis scores in `[0, 1]^5`
//! - [`fitness`]: weighted scalarization (with a toxicity penalty axis),
//!   hard-constraint gating, Pareto-front extraction, tournament selection
//! - [`EvolutionLoop`]: init → evaluate → select → recombine → replace,
//!   with every structural event in the audit log
//! - [`monitor`]: meme tracking, acceptance rates, drift alarms, dashboard
//!
//! ## RNG key system
//!
//! Deterministic RNG key management (similar to JAX), with child keys
//! derived by position so any generation replays from the seed alone:
//!
//! ```
//! use qube_evo::RngKey;
//!
//! let root = RngKey::new(42);
//! let init_key = root.derive(0);
//! let gen_1_key = root.derive(1);
//! assert_ne!(init_key, gen_1_key);
//! let _rng = gen_1_key.to_rng();
//! ```

pub mod agent;
pub mod evaluator;
pub mod fitness;
pub mod genome;
pub mod monitor;
pub mod mutation;
pub mod population;
pub mod rng;

pub use agent::Agent;
pub use evaluator::{AxisScores, AxisWeights, Evaluator, BAD_TOKEN};
pub use fitness::{
    check_hard_constraints, compute_fitness, default_floors, pareto_front, pareto_front_indices,
    tournament_select, FitnessWeights,
};
pub use genome::{Genome, GenomeMeta};
pub use monitor::{hypercube_path_entropy, Dashboard, MemeticMonitor};
pub use mutation::{adapter_noise_mutation, bitflip_mutation, crossover, jump_mutation, mutate};
pub use population::{
    init_population, memetic_local_search, EvolutionConfig, EvolutionLoop, GenerationSummary,
};
pub use rng::RngKey;
