pub mod applier;
pub mod compiler;
pub mod engine;
pub mod fragments;
pub mod resolver;

pub use applier::*;
pub use compiler::*;
pub use engine::*;
pub use fragments::*;
pub use resolver::*;
