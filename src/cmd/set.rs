use crate::Command;

use bytes::Bytes;

/// Set key to hold the given bytes.
///
/// If key already holds a value, it is overwritten. The server answers with the `OK` status.
#[derive(Debug)]
pub struct Set {
    key: String,
    value: Bytes,
}

impl Set {
    pub fn new(key: impl ToString, value: Bytes) -> Set {
        Set {
            key: key.to_string(),
            value,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Convert into the `Command` sent on the wire.
    pub fn into_command(self) -> Command {
        Command::new("SET").arg(self.key).payload(self.value)
    }
}
