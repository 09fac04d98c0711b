use std::sync::Arc;

use crate::model::AgeRange;
use crate::store::StudentStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StudentStore>,
    pub ages: AgeRange,
}

impl AppState {
    pub fn new(store: Arc<dyn StudentStore>, ages: AgeRange) -> Self {
        Self { store, ages }
    }
}
