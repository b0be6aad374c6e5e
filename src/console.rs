pub mod chain;
pub mod stages;

pub use chain::ConsoleChain;
pub use stages::{Frame, Stage};
