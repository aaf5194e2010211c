use redis_protocol::resp2::types::OwnedFrame as Frame;

use crate::error::Result;
use crate::resp;

/// Argument conversion for [`Cmd`].
pub trait ToArg {
    fn to_arg(&self) -> Vec<u8>;
}

impl ToArg for &str {
    fn to_arg(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl ToArg for String {
    fn to_arg(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl ToArg for &String {
    fn to_arg(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl ToArg for &[u8] {
    fn to_arg(&self) -> Vec<u8> {
        self.to_vec()
    }
}

impl ToArg for Vec<u8> {
    fn to_arg(&self) -> Vec<u8> {
        self.clone()
    }
}

impl ToArg for i64 {
    fn to_arg(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl ToArg for u64 {
    fn to_arg(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl ToArg for i32 {
    fn to_arg(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl ToArg for u32 {
    fn to_arg(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl ToArg for usize {
    fn to_arg(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl ToArg for f64 {
    fn to_arg(&self) -> Vec<u8> {
        // Redis accepts "+inf"/"-inf" for score arguments
        if *self == f64::INFINITY {
            b"+inf".to_vec()
        } else if *self == f64::NEG_INFINITY {
            b"-inf".to_vec()
        } else {
            self.to_string().into_bytes()
        }
    }
}

/// A single Redis command: the command name followed by its arguments.
///
/// ```no_run
/// use redical::Cmd;
///
/// let cmd = Cmd::new("SET").arg("mykey").arg("myvalue");
/// ```
#[derive(Debug, Clone)]
pub struct Cmd {
    parts: Vec<Vec<u8>>,
}

impl Cmd {
    pub fn new(name: &str) -> Self {
        Self {
            parts: vec![name.trim().to_uppercase().into_bytes()],
        }
    }

    pub fn arg(mut self, arg: impl ToArg) -> Self {
        self.parts.push(arg.to_arg());
        self
    }

    pub fn args<T: ToArg>(mut self, args: impl IntoIterator<Item = T>) -> Self {
        for arg in args {
            self.parts.push(arg.to_arg());
        }
        self
    }

    /// Command name, as it will go over the wire.
    pub fn name(&self) -> &[u8] {
        &self.parts[0]
    }

    /// Serialize the command as a RESP array of bulk strings.
    pub fn to_frame(&self) -> Frame {
        Frame::Array(
            self.parts
                .iter()
                .map(|part| Frame::BulkString(part.clone()))
                .collect(),
        )
    }

    /// Encode the command into wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        resp::encode_frame(&self.to_frame())
    }
}
