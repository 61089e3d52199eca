use std::sync::Arc;

use actix_web::web;
use chrono::NaiveDate;
use database::{
    database::request_manager::{RequestManager, RequestManagerError},
    model::age::Clock,
};

use crate::errors::ApiError;

/// Shared by every HTTP worker
pub struct AppState {
    pub request_manager: RequestManager,
    pub clock: Arc<dyn Clock>,
    pub page_size: usize,
}

impl AppState {
    pub fn new(request_manager: RequestManager, clock: Arc<dyn Clock>, page_size: usize) -> Self {
        Self {
            request_manager,
            clock,
            page_size,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Runs a request manager call on the blocking pool, the request manager waits on the database worker
    pub async fn database<F, R>(&self, call: F) -> Result<R, ApiError>
    where
        F: FnOnce(&RequestManager) -> Result<R, RequestManagerError> + Send + 'static,
        R: Send + 'static,
    {
        let request_manager = self.request_manager.clone();

        let result = web::block(move || call(&request_manager)).await?;

        Ok(result?)
    }
}
