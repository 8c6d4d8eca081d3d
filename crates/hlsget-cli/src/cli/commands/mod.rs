mod download;
mod merge;

pub use download::run_download;
pub use merge::run_merge;
