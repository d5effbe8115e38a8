use std::fmt;

use thiserror::Error;

use crate::detection::domain::detection_error::DetectionError;

/// Which model pass a failure came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Currency,
    Objects,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Currency => write!(f, "currency"),
            Stage::Objects => write!(f, "object"),
        }
    }
}

/// Per-frame failures. Never fatal to the loop.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{stage} model inference failed: {source}")]
    ModelInference {
        stage: Stage,
        #[source]
        source: DetectionError,
    },
    #[error("cannot process a frame with zero area ({width}x{height})")]
    InvalidFrame { width: u32, height: u32 },
}

impl PipelineError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::ModelInference { stage, .. } => Some(*stage),
            PipelineError::InvalidFrame { .. } => None,
        }
    }
}
