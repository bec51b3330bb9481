use crate::config::Config;
use crate::exam::ExamCore;
use axum::extract::FromRef;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub exams: ExamCore,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        let exams = ExamCore::new(pool.clone());
        Self { pool, config, exams }
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for ExamCore {
    fn from_ref(state: &AppState) -> Self {
        state.exams.clone()
    }
}
