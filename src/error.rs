use thiserror::Error;

pub type ArenaResult<T> = Result<T, ArenaError>;

/// Recoverable domain errors surfaced to the HTTP layer and chat bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error("a {size}-slot bracket cannot hold {participants} participants (supported sizes: 4, 8, 16, 32)")]
    InvalidSize { size: usize, participants: usize },
    #[error("{0:?} is entered more than once")]
    DuplicateParticipant(String),
    #[error("match {0} does not exist or is already decided")]
    UnknownMatch(u64),
    #[error("participant {participant} is not playing in match {match_id}")]
    InvalidWinner { match_id: u64, participant: u32 },
    #[error("match {0} is still waiting on an earlier round")]
    MatchNotReady(u64),
    #[error("match {0} is still running")]
    MatchInProgress(u64),
    #[error("betting is closed for match {0}")]
    BettingClosed(u64),
    #[error("{bettor} has {balance} points but tried to bet {needed}")]
    InsufficientPoints {
        bettor: String,
        balance: u64,
        needed: u64,
    },
    #[error("bet amount must be greater than zero")]
    InvalidAmount,
    #[error("{participant:?} is not a side in match {match_id}")]
    InvalidSelection { match_id: u64, participant: String },
    #[error("result unavailable{}: {reason}", .match_id.map(|id| format!(" for match {id}")).unwrap_or_default())]
    ResultUnavailable { match_id: Option<u64>, reason: String },
    #[error("no tournament is running")]
    NoActiveTournament,
    #[error("need {needed} enabled characters, only {available} available")]
    NotEnoughCharacters { needed: usize, available: usize },
    #[error("storage: {0}")]
    Storage(String),
}

impl ArenaError {
    /// Stable identifier used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ArenaError::InvalidSize { .. } => "invalidSize",
            ArenaError::DuplicateParticipant(_) => "duplicateParticipant",
            ArenaError::UnknownMatch(_) => "unknownMatch",
            ArenaError::InvalidWinner { .. } => "invalidWinner",
            ArenaError::MatchNotReady(_) => "matchNotReady",
            ArenaError::MatchInProgress(_) => "matchInProgress",
            ArenaError::BettingClosed(_) => "bettingClosed",
            ArenaError::InsufficientPoints { .. } => "insufficientPoints",
            ArenaError::InvalidAmount => "invalidAmount",
            ArenaError::InvalidSelection { .. } => "invalidSelection",
            ArenaError::ResultUnavailable { .. } => "resultUnavailable",
            ArenaError::NoActiveTournament => "noActiveTournament",
            ArenaError::NotEnoughCharacters { .. } => "notEnoughCharacters",
            ArenaError::Storage(_) => "storage",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_unavailable_message_includes_match_when_known() {
        let err = ArenaError::ResultUnavailable {
            match_id: Some(3),
            reason: "watcher timed out".to_string(),
        };
        assert_eq!(err.to_string(), "result unavailable for match 3: watcher timed out");

        let err = ArenaError::ResultUnavailable {
            match_id: None,
            reason: "no running match".to_string(),
        };
        assert_eq!(err.to_string(), "result unavailable: no running match");
    }
}
