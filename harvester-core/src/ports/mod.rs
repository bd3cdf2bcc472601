// harvester-core/src/ports/mod.rs

pub mod alert;
pub mod clock;
pub mod source;
pub mod writer;

pub use alert::AlertSink;
pub use clock::{Clock, FixedClock, SystemClock};
pub use source::{ExtractionSource, PageRequest};
pub use writer::{DatasetWriter, OutputFormat};
