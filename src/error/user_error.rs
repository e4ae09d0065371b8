use thiserror::Error;

#[derive(Error, Debug)]
pub enum UserError {
    #[error("User not found")]
    UserNotFound,
    #[error("Email or phone number already exists")]
    UserAlreadyExists,
    #[error("Password is required")]
    PasswordRequired,
    #[error("Password is incorrect")]
    IncorrectPassword,
    #[error("Your account is not verified")]
    NotVerified,
    #[error("Email is already verified")]
    AlreadyVerified,
}
