//! Types shared across the session core.

pub mod window_state;

pub use window_state::Geometry;
