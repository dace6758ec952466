//! The long-running scheduling loop and its pure decision helpers.

mod claims;
mod engine;
mod score;
mod spawner;

pub use claims::ClaimSet;
pub use engine::{rank_ready, RankContext, RunSummary, Scheduler};
pub use score::{priority_score, AgingTracker, ScoreInputs};
pub use spawner::{ProcessSpawner, SpawnedWorker, WorkerSpawner};
