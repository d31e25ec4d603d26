pub mod chroma;

pub use chroma::{ChromaAuth, ChromaStore};
