pub mod burn_state;
pub mod color;
pub mod frame;
pub mod geometry;
pub mod presence;
pub mod region;
