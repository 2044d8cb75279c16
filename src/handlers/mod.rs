// handlers/mod.rs - Handler tiers
//
// Public (no auth) -> Protected (JWT auth, optional scope checks)
pub mod protected;
pub mod public;
