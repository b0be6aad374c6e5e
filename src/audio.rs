pub mod engine;
pub mod peak_meter;

pub use engine::{Console, ConsoleHandle};
pub use peak_meter::PeakMeterInfo;
