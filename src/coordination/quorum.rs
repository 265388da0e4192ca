//! Status quorum: exact unanimity or nothing.

/// Result of polling the coordinators for a message's status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusVerdict {
    /// Every coordinator returned the same value.
    Agreed(i64),
    /// At least two answers differ, or a coordinator did not answer.
    OutOfSync,
    /// All answers matched but are not an integer.
    Unparsable(String),
    /// The registry knows no coordinators yet.
    NoCoordinators,
}

/// Requires every answer to match the first one byte for byte.
///
/// A missing answer (`None`) counts as an empty string, so it only matches other
/// missing answers and the result then fails to parse.
pub fn agree(responses: &[Option<String>]) -> StatusVerdict {
    let Some(first) = responses.first() else {
        return StatusVerdict::NoCoordinators;
    };
    let first = first.as_deref().unwrap_or("");

    if responses
        .iter()
        .any(|answer| answer.as_deref().unwrap_or("") != first)
    {
        return StatusVerdict::OutOfSync;
    }

    match first.trim().parse::<i64>() {
        Ok(status) => StatusVerdict::Agreed(status),
        Err(_) => StatusVerdict::Unparsable(first.to_string()),
    }
}
