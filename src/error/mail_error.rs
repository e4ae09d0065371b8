use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Invalid mailbox: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("Could not build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("Mail was rejected: {0}")]
    Rejected(String),
}
