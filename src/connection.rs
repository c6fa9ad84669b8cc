use crate::reply::{self, Reply, Tail};
use crate::Command;

use bytes::{Buf, BytesMut};
use std::io::{self, Cursor};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::{TcpStream, ToSocketAddrs};

/// Send commands to and receive `Reply` values from a remote server.
///
/// A connection carries one request at a time: a command is written and its reply read before
/// the next command goes out.
#[derive(Debug)]
pub struct Connection {
    /// The `TcpStream`. It uses `BufWriter` for write level buffering.
    stream: BufWriter<TcpStream>,
    /// The internal buffer for reading replies.
    buffer: BytesMut,
    /// The last reply ended with a bulk payload whose `\r\n` had not been received yet.
    pending_terminator: bool,
}

impl Connection {
    /// Create a new `Connection`.
    pub fn new(socket: TcpStream) -> Connection {
        Connection {
            stream: BufWriter::new(socket),
            buffer: BytesMut::with_capacity(4 * 1024),
            pending_terminator: false,
        }
    }

    /// Open a TCP connection to `addr`.
    pub async fn connect<T: ToSocketAddrs>(addr: T) -> io::Result<Connection> {
        let socket = TcpStream::connect(addr).await?;
        socket.set_nodelay(true)?;

        Ok(Connection::new(socket))
    }

    /// Write `cmd` and read the reply that answers it.
    pub async fn call(&mut self, cmd: &Command) -> crate::Result<Reply> {
        self.write_command(cmd).await?;
        self.read_reply().await
    }

    /// Tries to parse a reply from the buffer.
    ///
    /// If the buffer contains a whole reply, it is returned and its bytes removed from the
    /// buffer. If not enough data has been buffered yet, `Ok(None)` is returned. If the buffered
    /// data is not a valid reply, `Err` is returned and the buffer is left untouched.
    pub fn parse_reply(&mut self) -> crate::Result<Option<Reply>> {
        use reply::Error::Incomplete;

        if self.pending_terminator && !self.skip_pending_terminator() {
            return Ok(None);
        }

        let mut buf = Cursor::new(&self.buffer[..]);

        match Reply::check(&mut buf) {
            Ok(tail) => {
                // remember the length of the reply.
                let len = buf.position() as usize;

                buf.set_position(0);
                let reply = Reply::parse(&mut buf)?;

                self.buffer.advance(len);
                self.pending_terminator = tail == Tail::OpenBulk;

                Ok(Some(reply))
            }
            Err(Incomplete) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read a single `Reply` from the underlying stream.
    ///
    /// Waits until a whole reply has been received. The server closing the stream before that is
    /// an I/O error.
    pub async fn read_reply(&mut self) -> crate::Result<Reply> {
        loop {
            if let Some(reply) = self.parse_reply()? {
                return Ok(reply);
            }

            // `0` indicates "end of stream".
            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                let err = if self.buffer.is_empty() {
                    io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed by server")
                } else {
                    io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer")
                };

                return Err(err.into());
            }
        }
    }

    /// Write a single command to the underlying stream.
    pub async fn write_command(&mut self, cmd: &Command) -> io::Result<()> {
        self.stream.write_all(&cmd.encode()).await?;

        // ensure the encoded command is written to the socket.
        self.stream.flush().await
    }

    /// Drops the terminator of the previous bulk when it arrived after the bulk was decoded.
    ///
    /// Returns `false` while there is not enough data to tell. Any other empty line is left in
    /// place and rejected by the decoder.
    fn skip_pending_terminator(&mut self) -> bool {
        let n = match &self.buffer[..] {
            [] | [b'\r'] => return false,
            [b'\r', b'\n', ..] => 2,
            [b'\n', ..] => 1,
            _ => 0,
        };

        self.buffer.advance(n);
        self.pending_terminator = false;
        true
    }
}
