// Urgency signals.
//
// - model.rs: weighted keyword table, validation and file loading
// - heuristics.rs: text-shape boosts (all caps, exclamation, error codes)

pub mod heuristics;
pub mod model;
