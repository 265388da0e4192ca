//! Announce aggregation.

/// What the sampled coordinators decided about a freshly stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceOutcome {
    /// At least one coordinator said `true` and none said `false`.
    Redistribute,
    /// Some coordinator said `false`.
    Suppress,
    /// Coordinators were sampled but none gave a usable answer.
    NoAnswer,
    /// The registry knows no coordinators yet.
    NoCoordinators,
}

impl AnnounceOutcome {
    pub fn should_redistribute(&self) -> bool {
        matches!(self, AnnounceOutcome::Redistribute)
    }
}

/// Folds the coordinators' answers into one decision.
///
/// `None` marks a coordinator that did not answer. It is left out of the vote, as
/// is any answer other than `true` or `false`.
pub fn decide(responses: &[Option<String>]) -> AnnounceOutcome {
    if responses.is_empty() {
        return AnnounceOutcome::NoCoordinators;
    }

    let votes: Vec<bool> = responses
        .iter()
        .flatten()
        .filter_map(|answer| parse_vote(answer))
        .collect();

    if votes.is_empty() {
        AnnounceOutcome::NoAnswer
    } else if votes.iter().all(|&vote| vote) {
        AnnounceOutcome::Redistribute
    } else {
        AnnounceOutcome::Suppress
    }
}

fn parse_vote(answer: &str) -> Option<bool> {
    answer.trim().trim_matches('"').parse().ok()
}
