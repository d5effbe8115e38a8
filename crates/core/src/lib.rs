pub mod capture;
pub mod config;
pub mod detection;
pub mod display;
pub mod masking;
pub mod pipeline;
pub mod shared;
pub mod visualization;
