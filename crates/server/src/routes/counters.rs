use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    Form, Json,
};
use serde::Deserialize;
use service::counter::{repository::CounterRepository, Counter, CounterService};
use tracing::{debug, info};

use crate::errors::JsonApiError;

/// Shared handler state: the counter service built at startup.
pub struct AppState<R: CounterRepository> {
    pub counters: Arc<CounterService<R>>,
}

impl<R: CounterRepository> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self { counters: Arc::clone(&self.counters) }
    }
}

/// Form body of `POST/PUT/DELETE /increment`: `key=<k>&value=<d>`.
#[derive(Debug, Default, Deserialize)]
pub struct CounterForm {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// A missing or unreadable form is treated like one with empty fields.
fn form_or_default(form: Result<Form<CounterForm>, FormRejection>) -> CounterForm {
    match form {
        Ok(Form(f)) => f,
        Err(rejection) => {
            debug!(%rejection, "form body rejected; treating as empty");
            CounterForm::default()
        }
    }
}

/// Parse the optional delta; blank means "use the default".
fn parse_delta(raw: Option<&str>) -> Result<Option<i64>, JsonApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<i64>().map(Some).map_err(|e| {
            JsonApiError::new(StatusCode::BAD_REQUEST, "Invalid value", Some(format!("`{s}` is not a 64-bit integer: {e}")))
        }),
    }
}

/// List every counter
pub async fn list<R: CounterRepository + 'static>(
    State(state): State<AppState<R>>,
) -> Result<Json<Vec<Counter>>, JsonApiError> {
    let counters = state.counters.list().await?;
    info!(count = counters.len(), "list counters");
    Ok(Json(counters))
}

/// Increment a counter, creating it on first use (201 when created, 200 when updated)
pub async fn increment<R: CounterRepository + 'static>(
    State(state): State<AppState<R>>,
    form: Result<Form<CounterForm>, FormRejection>,
) -> Result<(StatusCode, Json<Counter>), JsonApiError> {
    let form = form_or_default(form);
    if form.key.is_empty() {
        return Err(JsonApiError::new(StatusCode::BAD_REQUEST, "Missing key value", None));
    }
    let delta = parse_delta(form.value.as_deref())?;
    let out = state.counters.increment_or_create(&form.key, delta).await?;
    let status = if out.is_created() { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(out.into_counter())))
}

/// Delete a counter and return its final value
pub async fn delete<R: CounterRepository + 'static>(
    State(state): State<AppState<R>>,
    form: Result<Form<CounterForm>, FormRejection>,
) -> Result<Json<Counter>, JsonApiError> {
    let form = form_or_default(form);
    let deleted = state.counters.delete(&form.key).await?;
    Ok(Json(deleted))
}
