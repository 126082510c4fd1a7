pub mod annotation;
pub mod drill;
pub mod relation;
pub mod user;
pub mod video;
pub mod video_favourite;
