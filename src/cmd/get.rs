use crate::Command;

/// Get the value of key.
///
/// If the key does not exist the server answers with a nil bulk.
#[derive(Debug)]
pub struct Get {
    /// Name of the key to get.
    key: String,
}

impl Get {
    /// Create a new `Get` command.
    pub fn new(key: impl ToString) -> Get {
        Get {
            key: key.to_string(),
        }
    }

    /// Get the key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Convert into the `Command` sent on the wire.
    pub fn into_command(self) -> Command {
        Command::new("GET").arg(self.key)
    }
}
