use std::sync::Arc;

use crate::cascade::ResolutionPipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ResolutionPipeline>,
}
