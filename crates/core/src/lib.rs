pub mod annotation;
pub mod attention;
pub mod classification;
pub mod detection;
pub mod pipeline;
pub mod shared;
pub mod video;
