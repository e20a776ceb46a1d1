use crate::db::{DbPool, OrmConn};
use crate::lifecycle::StateModel;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub state_model: StateModel,
}
