//! Board occupancy representation

mod occupancy;

pub use occupancy::Occupancy;
