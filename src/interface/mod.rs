pub mod backend;
pub mod color;
pub mod display;
pub mod zone;
