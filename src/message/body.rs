//! Request and response bodies

use std::fmt;
use std::io::{self, Cursor, Read};

use bytes::Bytes;

/// A readable HTTP body
///
/// A body is either an in-memory buffer, which can be re-created cheaply, or a
/// single-use stream. Once a stream has been read it is gone, so anything that
/// inspects a body it does not own must go through [`buffer_body`].
pub struct Body {
    inner: Inner,
}

enum Inner {
    Buffered(Cursor<Bytes>),
    Stream(Box<dyn Read + Send>),
    /// A stream that already failed; every read repeats the failure
    Failed(io::ErrorKind, String),
}

impl Body {
    /// Create a rewound body over an in-memory buffer
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self {
            inner: Inner::Buffered(Cursor::new(data.into())),
        }
    }

    /// Create a single-use body backed by a reader
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        Self {
            inner: Inner::Stream(Box::new(reader)),
        }
    }

    /// Read everything that is left in this body
    ///
    /// # Errors
    ///
    /// Returns error if the underlying reader fails
    pub fn read_to_bytes(&mut self) -> io::Result<Bytes> {
        match &mut self.inner {
            Inner::Buffered(cursor) => {
                let start = cursor.position() as usize;
                let data = cursor.get_ref().slice(start.min(cursor.get_ref().len())..);
                cursor.set_position(cursor.get_ref().len() as u64);
                Ok(data)
            }
            Inner::Stream(reader) => {
                let mut data = Vec::new();
                reader.read_to_end(&mut data)?;
                Ok(Bytes::from(data))
            }
            Inner::Failed(kind, message) => Err(io::Error::new(*kind, message.clone())),
        }
    }

    fn failed(error: &io::Error) -> Self {
        Self {
            inner: Inner::Failed(error.kind(), error.to_string()),
        }
    }

    /// Check whether this body is an in-memory buffer
    #[must_use]
    pub fn is_buffered(&self) -> bool {
        matches!(self.inner, Inner::Buffered(_))
    }
}

impl Read for Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            Inner::Buffered(cursor) => cursor.read(buf),
            Inner::Stream(reader) => reader.read(buf),
            Inner::Failed(kind, message) => Err(io::Error::new(*kind, message.clone())),
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Inner::Buffered(cursor) => f
                .debug_struct("Body")
                .field("len", &cursor.get_ref().len())
                .field("position", &cursor.position())
                .finish(),
            Inner::Stream(_) => f.write_str("Body(<stream>)"),
            Inner::Failed(kind, _) => write!(f, "Body(<failed: {kind}>)"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(data: Bytes) -> Self {
        Self::from_bytes(data)
    }
}

impl From<Vec<u8>> for Body {
    fn from(data: Vec<u8>) -> Self {
        Self::from_bytes(data)
    }
}

impl From<String> for Body {
    fn from(data: String) -> Self {
        Self::from_bytes(data)
    }
}

impl From<&'static str> for Body {
    fn from(data: &'static str) -> Self {
        Self::from_bytes(data)
    }
}

/// Drain a body and put a fresh, rewound copy back in its place
///
/// Returns the drained bytes, or `None` if there was no body. After this call
/// the slot holds a buffered body positioned at the start, so the next reader
/// sees exactly what this one did.
///
/// # Errors
///
/// Returns error if reading the body fails. The slot then holds a body that
/// fails with the same error on every read, so a request whose body was lost
/// can never pass for one that had no body.
pub fn buffer_body(slot: &mut Option<Body>) -> io::Result<Option<Bytes>> {
    let Some(mut body) = slot.take() else {
        return Ok(None);
    };
    match body.read_to_bytes() {
        Ok(data) => {
            *slot = Some(Body::from_bytes(data.clone()));
            Ok(Some(data))
        }
        Err(e) => {
            *slot = Some(Body::failed(&e));
            Err(e)
        }
    }
}
