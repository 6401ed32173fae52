pub mod image;
pub mod storage;
pub mod tryon;
pub mod vendor;
