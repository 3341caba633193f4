use crate::services::menu_jobs::MenuJobService;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub jobs: MenuJobService,
}

impl AppState {
    pub fn new(jobs: MenuJobService) -> Self {
        Self { jobs }
    }
}
