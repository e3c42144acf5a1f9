use crate::ids::PlayerId;
use thiserror::Error;

/// Fatal errors while setting up AI players.
#[derive(Debug, Error, PartialEq)]
pub enum AiError {
    #[error("no AI types are registered")]
    NoAiTypes,
    #[error("player {player} asked for AI type '{name}', which does not exist")]
    UnknownAiName { player: PlayerId, name: String },
    #[error("player {0} does not exist in the world")]
    UnknownPlayer(PlayerId),
    #[error("player {0} has no AI state")]
    NotInitialized(PlayerId),
}

/// Content-authoring mistakes found while loading definitions.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("malformed content text: {0}")]
    Text(#[from] rtstxt::Error),
    #[error("failed to read content file: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown {kind} '{ident}'")]
    UnknownIdent { kind: &'static str, ident: String },
    #[error("duplicate {kind} '{ident}'")]
    DuplicateIdent { kind: &'static str, ident: String },
    #[error("unknown force role '{0}'")]
    UnknownForceRole(String),
    #[error("too many resource kinds: {0}")]
    TooManyResources(usize),
}

/// Problems reading back a persisted AI block.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("malformed save block: {0}")]
    Text(#[from] rtstxt::Error),
    #[error("unknown AI type '{0}' in save")]
    UnknownAiType(String),
    #[error("unknown unit type id {0} in save")]
    UnknownUnitType(u16),
    #[error("unknown upgrade id {0} in save")]
    UnknownUpgrade(u16),
    #[error("invalid random state: {0}")]
    BadRng(String),
}

/// Rejected force state machine event.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("force cannot handle {event} while {state}")]
pub struct ForceTransitionError {
    pub state: &'static str,
    pub event: &'static str,
}
