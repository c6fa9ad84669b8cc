//! Commands and their wire encoding.
//!
//! Commands are sent inline: the name and its arguments on one line separated by single spaces.
//! A command carrying a byte payload appends the payload length as its last token and sends
//! the raw payload on the following line.
//!
//! ```text
//! GET name\r\n
//! SET name 5\r\nhello\r\n
//! ```
//!
//! Arguments are not escaped. A key containing whitespace or a line break produces a line the
//! server will split differently.

mod get;
pub use get::Get;

mod set;
pub use set::Set;

use bytes::{BufMut, Bytes, BytesMut};

/// A command ready to be written to a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Command name followed by its arguments.
    args: Vec<String>,
    /// Raw bytes sent on the line after the command.
    payload: Option<Bytes>,
}

impl Command {
    /// Create a command with no arguments.
    pub fn new(name: impl ToString) -> Command {
        Command {
            args: vec![name.to_string()],
            payload: None,
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl ToString) -> Command {
        self.args.push(arg.to_string());
        self
    }

    /// Attach a byte payload. Its length is sent as the last argument.
    pub fn payload(mut self, payload: Bytes) -> Command {
        self.payload = Some(payload);
        self
    }

    /// Returns the command name.
    pub fn name(&self) -> &str {
        &self.args[0]
    }

    /// Returns the arguments following the name.
    pub fn args(&self) -> &[String] {
        &self.args[1..]
    }

    /// Encode the command into `dst`.
    pub fn encode_into(&self, dst: &mut BytesMut) {
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                dst.put_u8(b' ');
            }
            dst.put_slice(arg.as_bytes());
        }

        match &self.payload {
            Some(payload) => {
                dst.put_u8(b' ');
                dst.put_slice(payload.len().to_string().as_bytes());
                dst.put_slice(b"\r\n");
                dst.put_slice(payload);
                dst.put_slice(b"\r\n");
            }
            None => dst.put_slice(b"\r\n"),
        }
    }

    /// Encode the command into a new buffer.
    pub fn encode(&self) -> Bytes {
        let payload_len = self.payload.as_ref().map_or(0, |p| p.len() + 24);
        let args_len: usize = self.args.iter().map(|a| a.len() + 1).sum();

        let mut dst = BytesMut::with_capacity(args_len + payload_len + 2);
        self.encode_into(&mut dst);
        dst.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Reply;
    use std::io::Cursor;

    #[test]
    fn inline_command() {
        let cmd = Command::new("EXISTS").arg("a").arg(7);
        assert_eq!(&cmd.encode()[..], b"EXISTS a 7\r\n");
        assert_eq!(cmd.name(), "EXISTS");
        assert_eq!(cmd.args(), &["a".to_string(), "7".to_string()]);
    }

    #[test]
    fn bare_name() {
        assert_eq!(&Command::new("PING").encode()[..], b"PING\r\n");
    }

    #[test]
    fn payload_follows_on_next_line() {
        let cmd = Command::new("APPEND")
            .arg("log")
            .payload(Bytes::from_static(b"a b\r\nc"));
        assert_eq!(&cmd.encode()[..], b"APPEND log 6\r\na b\r\nc\r\n");
    }

    #[test]
    fn empty_payload() {
        let cmd = Command::new("SET").arg("k").payload(Bytes::new());
        assert_eq!(&cmd.encode()[..], b"SET k 0\r\n\r\n");
    }

    #[test]
    fn set_payload_echoes_back_as_bulk() {
        let encoded = Set::new("k", Bytes::from_static(b"hello")).into_command().encode();
        assert_eq!(&encoded[..], b"SET k 5\r\nhello\r\n");

        // Echo the length token and payload back the way a server answers a bulk.
        let line_end = encoded.iter().position(|b| *b == b'\n').unwrap();
        let len = encoded[..line_end - 1].rsplit(|b| *b == b' ').next().unwrap();

        let mut echoed = b"$".to_vec();
        echoed.extend_from_slice(len);
        echoed.extend_from_slice(&encoded[line_end - 1..]);

        let mut buf = Cursor::new(&echoed[..]);
        match Reply::parse(&mut buf).unwrap() {
            Reply::Bulk(Some(data)) => assert_eq!(&data[..], b"hello"),
            other => panic!("unexpected reply {:?}", other),
        }
    }
}
