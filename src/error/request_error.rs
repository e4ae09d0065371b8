use crate::error::AppError;
use crate::response::app_response::ErrorMessage;
use axum::Json;
use axum::extract::{FromRequest, Request, rejection::JsonRejection};
use serde::de::DeserializeOwned;
use thiserror::Error;
use validator::Validate;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Validation failed")]
    ValidationError(#[from] validator::ValidationErrors),
    #[error(transparent)]
    JsonRejection(#[from] JsonRejection),
}

impl RequestError {
    /// Field-level messages for the error envelope
    pub fn error_messages(&self) -> Vec<ErrorMessage> {
        match self {
            RequestError::ValidationError(errors) => convert_validation_errors(errors),
            RequestError::JsonRejection(rejection) => vec![ErrorMessage::new("", rejection.body_text())],
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedRequest<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedRequest<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(RequestError::JsonRejection)?;
        value.validate().map_err(RequestError::ValidationError)?;
        Ok(ValidatedRequest(value))
    }
}

fn convert_validation_errors(errors: &validator::ValidationErrors) -> Vec<ErrorMessage> {
    let mut messages: Vec<ErrorMessage> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, field_errors)| {
            field_errors.iter().map(move |error| {
                ErrorMessage::new(
                    field.to_string(),
                    error
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Invalid value".to_string()),
                )
            })
        })
        .collect();
    // HashMap iteration order is unstable
    messages.sort_by(|a, b| a.path.cmp(&b.path));
    messages
}
