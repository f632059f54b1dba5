pub mod feed;
pub mod heads;
pub mod renderer;
