pub mod detection_loop;
pub mod detection_report;
pub mod masked_frame_pipeline;
pub mod pipeline_error;
pub mod pipeline_logger;
pub mod rate_pacer;
