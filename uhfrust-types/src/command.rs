//! Inbound client commands
//!
//! Commands arrive as JSON objects tagged by `command`. Anything that does
//! not match one of the variants below is rejected with
//! [`Error::InvalidCommand`](crate::Error::InvalidCommand) before it reaches
//! the reader.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum ClientCommand {
    /// Start a cumulative inventory scan
    #[serde(rename = "rfid-start")]
    StartInventory,

    /// Start scanning and report each read as a one-shot tag event
    #[serde(rename = "rfid-read-tag", alias = "read-rfid-tag")]
    ReadTag,

    /// Stop scanning
    #[serde(rename = "rfid-stop")]
    Stop,

    /// Replace the catalog with delimited text
    #[serde(rename = "upload_inventory", alias = "upload-item-list")]
    UploadInventory { payload: String },
}

impl ClientCommand {
    /// Parse and validate a JSON command
    ///
    /// # Examples
    ///
    /// ```
    /// use uhfrust_types::ClientCommand;
    ///
    /// let cmd = ClientCommand::from_json(r#"{"command":"rfid-stop"}"#).unwrap();
    /// assert_eq!(cmd, ClientCommand::Stop);
    /// ```
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::InvalidCommand(e.to_string()))
    }

    /// Wire name of the command
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartInventory => "rfid-start",
            Self::ReadTag => "rfid-read-tag",
            Self::Stop => "rfid-stop",
            Self::UploadInventory { .. } => "upload_inventory",
        }
    }

    /// Whether the command drives the reader (and so needs it to be ready)
    pub fn is_scan_command(&self) -> bool {
        !matches!(self, Self::UploadInventory { .. })
    }
}

impl FromStr for ClientCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_json(s)
    }
}

impl fmt::Display for ClientCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_scan_commands() {
        assert_eq!(
            ClientCommand::from_json(r#"{"command":"rfid-start"}"#).unwrap(),
            ClientCommand::StartInventory
        );
        assert_eq!(
            ClientCommand::from_json(r#"{"command":"rfid-read-tag"}"#).unwrap(),
            ClientCommand::ReadTag
        );
        assert_eq!(
            ClientCommand::from_json(r#"{"command":"rfid-stop"}"#).unwrap(),
            ClientCommand::Stop
        );
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(
            "{\"command\":\"read-rfid-tag\"}".parse::<ClientCommand>().unwrap(),
            ClientCommand::ReadTag
        );
        assert_eq!(
            ClientCommand::from_json(r#"{"command":"upload-item-list","payload":"EPC,item,id"}"#)
                .unwrap(),
            ClientCommand::UploadInventory { payload: "EPC,item,id".into() }
        );
    }

    #[test]
    fn test_parse_upload() {
        let cmd = ClientCommand::from_json(
            r#"{"command":"upload_inventory","payload":"EPC,item,id\nE2001,Milk,1"}"#,
        )
        .unwrap();

        assert!(!cmd.is_scan_command());
        assert_eq!(cmd.name(), "upload_inventory");
    }

    #[test]
    fn test_unknown_command_rejected() {
        let result = ClientCommand::from_json(r#"{"command":"rfid-self-destruct"}"#);
        assert!(matches!(result, Err(Error::InvalidCommand(_))));
    }

    #[test]
    fn test_upload_without_payload_rejected() {
        let result = ClientCommand::from_json(r#"{"command":"upload_inventory"}"#);
        assert!(matches!(result, Err(Error::InvalidCommand(_))));
    }

    #[test]
    fn test_not_json_rejected() {
        assert!(ClientCommand::from_json("rfid-start").is_err());
    }
}
