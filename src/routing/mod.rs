//! Routing collaborator contract.

/// Provider trait, a static provider, and the planner lifecycle wrapper.
pub mod provider;
