pub mod grid_world;
pub mod render;
pub mod simple_golf;
