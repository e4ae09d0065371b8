use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Duplicate entry violates {constraint}")]
    Duplicate { constraint: String },
    #[error("{0}")]
    SomethingWentWrong(String),
}

impl From<sqlx::Error> for DbError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_error) = &error
            && db_error.is_unique_violation() {
            return DbError::Duplicate {
                constraint: db_error.constraint().unwrap_or("unique constraint").to_string(),
            };
        }
        DbError::SomethingWentWrong(error.to_string())
    }
}
