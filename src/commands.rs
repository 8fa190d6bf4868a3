//! The command facade: one command per lifecycle operation, each answered
//! with an `{error, msg, result}` envelope.
//!
//! Transport code hands in a JSON object such as
//! `{"command": "get_token", "identifier": "..."}` and relays the envelope back.
//! No failure escapes this boundary as anything but an envelope.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::engine::SessionEngine;
use crate::tokens::SessionError;
use crate::users::UserKey;

/// Every command name the facade understands
pub const COMMAND_NAMES: [&str; 7] = [
    "get_identifier",
    "add_user_data",
    "get_token",
    "check_token",
    "update_token",
    "merge_main_tokens",
    "check_identifier",
];

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

/// A token pair as echoed back by a client. Only the half a command needs
/// is consulted; other fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPairRef {
    pub access_key: Option<String>,
    pub update_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    AddUserData {
        identifier: String,
        user_key: UserKey,
    },
    CheckIdentifier {
        identifier: String,
    },
    CheckToken {
        token_pair: TokenPairRef,
    },
    GetIdentifier,
    GetToken {
        identifier: String,
    },
    MergeMainTokens {
        primary_main_key: String,
        other_key: String,
    },
    UpdateToken {
        token_pair: TokenPairRef,
    },
}

impl Command {
    /// Parse a command object, rejecting names outside the closed command set.
    pub fn from_json(body: Value) -> Result<Self, CommandError> {
        let name = body
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| CommandError::InvalidParameters("missing command".to_string()))?;

        if !COMMAND_NAMES.contains(&name) {
            return Err(CommandError::UnknownCommand(name.to_string()));
        }

        serde_json::from_value(body).map_err(|e| CommandError::InvalidParameters(e.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::AddUserData { .. } => "add_user_data",
            Command::CheckIdentifier { .. } => "check_identifier",
            Command::CheckToken { .. } => "check_token",
            Command::GetIdentifier => "get_identifier",
            Command::GetToken { .. } => "get_token",
            Command::MergeMainTokens { .. } => "merge_main_tokens",
            Command::UpdateToken { .. } => "update_token",
        }
    }
}

/// The uniform reply to every command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub error: bool,
    pub msg: String,
    pub result: Option<Value>,
}

impl Envelope {
    pub fn success(result: Option<Value>) -> Self {
        Self {
            error: false,
            msg: String::new(),
            result,
        }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            error: true,
            msg: msg.into(),
            result: None,
        }
    }
}

impl From<Result<Option<Value>, CommandError>> for Envelope {
    fn from(result: Result<Option<Value>, CommandError>) -> Self {
        match result {
            Ok(value) => Envelope::success(value),
            Err(e) => Envelope::failure(e.to_string()),
        }
    }
}

/// Run one parsed command against the engine
pub fn execute(engine: &SessionEngine, command: Command) -> Envelope {
    let name = command.name();
    let result = run(engine, command);

    match &result {
        Ok(_) => tracing::debug!(command = name, "Command succeeded"),
        Err(CommandError::Session(SessionError::Storage(e))) => {
            tracing::error!(command = name, error = %e, "Command failed on storage")
        }
        Err(e) => tracing::debug!(command = name, error = %e, "Command rejected"),
    }

    result.into()
}

/// Parse and run a raw command object
pub fn dispatch(engine: &SessionEngine, body: Value) -> Envelope {
    match Command::from_json(body) {
        Ok(command) => execute(engine, command),
        Err(e) => {
            tracing::debug!(error = %e, "Rejected malformed command");
            Envelope::failure(e.to_string())
        }
    }
}

fn run(engine: &SessionEngine, command: Command) -> Result<Option<Value>, CommandError> {
    match command {
        Command::GetIdentifier => {
            let identifier = engine.get_identifier()?;
            Ok(Some(json!({ "identifier": identifier })))
        }
        Command::AddUserData {
            identifier,
            user_key,
        } => {
            engine.add_user_data(&identifier, &user_key)?;
            Ok(None)
        }
        Command::GetToken { identifier } => {
            let bundle = engine.get_token(&identifier)?;
            to_result(&bundle).map(Some)
        }
        Command::CheckToken { token_pair } => {
            let access_key = token_pair
                .access_key
                .ok_or(SessionError::AccessTokenNotFound)?;
            engine.check_token(&access_key)?;
            Ok(None)
        }
        Command::UpdateToken { token_pair } => {
            let update_key = token_pair.update_key.ok_or(SessionError::KeyNotFound)?;
            let bundle = engine.update_token(&update_key)?;
            to_result(&bundle).map(Some)
        }
        Command::MergeMainTokens {
            primary_main_key,
            other_key,
        } => {
            engine.merge_main_tokens(&primary_main_key, &other_key)?;
            Ok(None)
        }
        Command::CheckIdentifier { identifier } => {
            let identifier = engine.check_identifier(&identifier)?;
            Ok(Some(json!({ "identifier": identifier })))
        }
    }
}

fn to_result<T: Serialize>(value: &T) -> Result<Value, CommandError> {
    serde_json::to_value(value).map_err(|e| CommandError::InvalidParameters(e.to_string()))
}
