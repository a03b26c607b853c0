use crate::restore::RestorePipeline;

/// Shared handler state
pub(crate) struct ApiState {
    pub(crate) pipeline: RestorePipeline,
}

impl ApiState {
    pub(crate) fn new(pipeline: RestorePipeline) -> Self {
        Self { pipeline }
    }
}
