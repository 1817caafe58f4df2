//! Archive storage services.

pub mod archive;
pub mod tar_path;
