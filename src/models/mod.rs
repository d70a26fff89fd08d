pub mod batch;
pub mod patient;
pub mod scan;
pub mod scan_file;

pub use batch::*;
pub use patient::*;
pub use scan::*;
pub use scan_file::*;
