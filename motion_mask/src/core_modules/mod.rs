pub mod difference;
pub mod frame;
pub mod grid;
pub mod mask;
pub mod morphology;
pub mod threshold;
pub mod utils;
