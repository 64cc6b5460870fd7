use super::model::AccountId;
use thiserror::Error;

/// Wire-level error class, mirrored in the `name` field of error bodies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    NotAuthenticated,
    NotFound,
    MethodNotAllowed,
    GeneralError,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::NotAuthenticated => 401,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::GeneralError => 500,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "BadRequest",
            Self::NotAuthenticated => "NotAuthenticated",
            Self::NotFound => "NotFound",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::GeneralError => "GeneralError",
        }
    }
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Email does not fit criteria.")]
    EmailCriteria,
    #[error("Password does not fit criteria.")]
    PasswordCriteria,
    #[error("Expected string value. (authManagement)")]
    ExpectedString,
    #[error("Values already taken.")]
    ValuesTaken,
    #[error("Validation error")]
    DuplicateEmail,
    #[error("User not found.")]
    UserNotFound,
    #[error("User is already verified.")]
    AlreadyVerified,
    #[error("User is not verified.")]
    NotVerified,
    #[error("Verification token has expired.")]
    VerifyTokenExpired,
    #[error("Reset token has expired.")]
    ResetTokenExpired,
    #[error("Token is not in the correct format.")]
    TokenFormat,
    #[error("Invalid token. Get for a new one.")]
    InvalidToken,
    #[error("Current password is incorrect.")]
    CurrentPasswordIncorrect,
    #[error("Password is incorrect.")]
    PasswordIncorrect,
    #[error("Field {0} may not be patched. (preventChanges)")]
    ProtectedField(String),
    #[error("Action '{0}' is invalid.")]
    UnknownAction(String),
    #[error("Invalid payload for {action}: {reason}")]
    InvalidPayload { action: String, reason: String },
    #[error("No auth token")]
    NoAuthToken,
    #[error("Strategy {0} is not permitted")]
    StrategyNotPermitted(String),
    #[error("Invalid login")]
    InvalidLogin,
    #[error("Invalid authentication token")]
    InvalidAuthToken,
    #[error("Method is not allowed on users")]
    MethodNotAllowed,
    #[error("No record found for id '{0}'")]
    NotFound(AccountId),
    #[error("Invalid id '{0}'")]
    InvalidId(String),
    #[error("Account could not be resolved.")]
    Unresolved,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AccountError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NoAuthToken
            | Self::StrategyNotPermitted(_)
            | Self::InvalidLogin
            | Self::InvalidAuthToken => ErrorKind::NotAuthenticated,
            Self::MethodNotAllowed => ErrorKind::MethodNotAllowed,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unresolved | Self::Internal(_) => ErrorKind::GeneralError,
            _ => ErrorKind::BadRequest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_wire_contract() {
        assert_eq!(
            AccountError::ProtectedField("isVerified".to_string()).to_string(),
            "Field isVerified may not be patched. (preventChanges)"
        );
        assert_eq!(
            AccountError::UnknownAction("nope".to_string()).to_string(),
            "Action 'nope' is invalid."
        );
        assert_eq!(
            AccountError::StrategyNotPermitted("any".to_string()).to_string(),
            "Strategy any is not permitted"
        );
        assert_eq!(AccountError::DuplicateEmail.to_string(), "Validation error");
    }

    #[test]
    fn kinds_map_to_status_codes() {
        assert_eq!(AccountError::UserNotFound.kind().code(), 400);
        assert_eq!(AccountError::NoAuthToken.kind().code(), 401);
        assert_eq!(AccountError::NotFound(3).kind().code(), 404);
        assert_eq!(AccountError::MethodNotAllowed.kind().code(), 405);
        assert_eq!(AccountError::Unresolved.kind().code(), 500);
        assert_eq!(
            AccountError::Internal(anyhow::anyhow!("boom")).kind(),
            ErrorKind::GeneralError
        );
        assert_eq!(ErrorKind::NotAuthenticated.as_str(), "NotAuthenticated");
    }
}
