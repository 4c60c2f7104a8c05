//! Identity assertion - extracts the caller identity attached to a call

use crate::relay::RelayError;

/// Turn the `authorization` value of a call into the caller's identity.
///
/// The value is trusted verbatim, matching how `Connect` stores usernames;
/// whether the identity has a live session is checked by the service.
pub fn caller_identity(authorization: Option<&str>) -> Result<&str, RelayError> {
    match authorization {
        Some(identity) if !identity.is_empty() => Ok(identity),
        _ => Err(RelayError::Unauthenticated("no authorization".to_string())),
    }
}
