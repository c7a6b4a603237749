//! Pure geometry and instruction heuristics shared by the sampling stages.

/// Great-circle distance and bearing.
pub mod geodesy;
/// Maneuver detection and direction classification over instruction text.
pub mod turn;
