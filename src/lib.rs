pub mod midi;
pub mod notation;
