//! Bus-speed discovery
//!
//! See [`BaudScanner`] for the staged algorithm and [`BaudScore`] for how
//! candidates are ranked.

pub mod scanner;
pub mod score;

pub use scanner::{BaudScanner, ScanProgress, ScanResult, ScanStatus, ScanStep, MAX_SCAN_ENTRIES};
pub use score::{BaudScore, ScanEntry};
