pub mod detection;
pub mod detection_error;
pub mod label_set;
pub mod object_detector;
