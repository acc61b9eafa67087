mod generation;

pub use generation::{GenerationService, HttpGenerationService, TextOp};
