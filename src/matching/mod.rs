//! Scan matching against the distance field.

mod match_surface;

pub use match_surface::MatchSurface;
