pub mod analyzer;
pub mod windower;

pub use analyzer::SessionAnalyzer;
pub use windower::{window, SampleWindow, WINDOW_SIZE};
