pub mod plots;
#[allow(clippy::module_inception)]
pub mod report;
pub mod summary;

pub use report::{text_block, Report, ReportSection};
