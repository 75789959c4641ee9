pub mod file;
pub mod hasher;

pub use file::FileService;
