use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("invalid role: {0}")]
    InvalidRole(String),
    #[error("invalid user status: {0}")]
    InvalidStatus(String),
    #[error("invalid resource: {0}")]
    InvalidResource(String),
    #[error("invalid action: {0}")]
    InvalidAction(String),
    #[error("invalid permission: {0}")]
    InvalidPermission(String),
    #[error("invalid grant type: {0}")]
    InvalidGrantType(String),
    #[error("invalid registration status: {0}")]
    InvalidRegistrationStatus(String),
    #[error("invalid subject claim: {0}")]
    InvalidSubject(String),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("policy engine error: {0}")]
    Policy(#[from] casbin::Error),
}

pub type AuthzResult<T> = Result<T, AuthzError>;
