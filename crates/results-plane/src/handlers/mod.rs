pub mod cache;
pub mod downloads;
pub mod health;
pub mod ml;
pub mod readiness;
pub mod results;
pub mod uploads;

use serde::Deserialize;
use utoipa::IntoParams;

/// `?filename=` carried by the polling routes.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FilenameQuery { pub filename: Option<String> }

impl FilenameQuery {
    /// The filename if present and non-blank.
    pub fn get(&self) -> Option<&str> { self.filename.as_deref().map(str::trim).filter(|f| !f.is_empty()) }
}
