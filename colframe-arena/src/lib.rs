pub mod arena;

pub use arena::{Arena, ArenaError, Footprint, Handle};
