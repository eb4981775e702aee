//! Pipeline module - cleaning, encoding and selection stages

pub mod cleaning;
pub mod columns;
pub mod encoding;
pub mod loader;
pub mod runner;
pub mod scoring;
pub mod selection;
pub mod time;
pub mod tree;

pub use cleaning::*;
pub use columns::*;
pub use encoding::*;
pub use loader::*;
pub use runner::*;
pub use scoring::*;
pub use selection::*;
pub use time::*;
pub use tree::*;
