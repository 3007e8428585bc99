pub mod black_bar;
pub mod image;
pub mod sampler;
pub mod screen;
