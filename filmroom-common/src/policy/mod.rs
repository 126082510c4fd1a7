pub mod annotation;
pub mod relation;
pub mod video;
