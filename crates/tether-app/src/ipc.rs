//! Wire types for the host protocol.
//!
//! Requests arrive on stdin and events leave on stdout, one JSON object per
//! line, tagged by `type`.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Requests read from stdin.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Request {
    /// Launch a command, replacing any current session.
    Start {
        sh: Option<String>,
        #[serde(default)]
        args: Vec<String>,
        /// Becomes `KEY=VALUE` assignments, in the order given.
        #[serde(default, deserialize_with = "env_in_order")]
        env: Vec<(String, String)>,
        cols: Option<u16>,
        rows: Option<u16>,
    },
    Write {
        data: String,
    },
    Resize {
        cols: u16,
        rows: u16,
    },
    Kill,
}

/// Events written to stdout.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Event {
    /// A chunk of terminal output.
    PtyData {
        data: String,
        encoding: DataEncoding,
    },
    /// The session ended.
    PtyExit {
        code: i32,
    },
    Error {
        message: String,
    },
}

/// How `PtyData::data` is encoded.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DataEncoding {
    Utf8,
    Hex,
}

impl Event {
    /// Wrap an output chunk, falling back to hex when it is not valid UTF-8.
    pub fn data(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(data) => Event::PtyData {
                data,
                encoding: DataEncoding::Utf8,
            },
            Err(e) => Event::PtyData {
                data: to_hex(e.as_bytes()),
                encoding: DataEncoding::Hex,
            },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Event::Error {
            message: message.into(),
        }
    }
}

/// Turns output chunks into `pty-data` events.
///
/// Reads are cut at arbitrary byte offsets, so a character may straddle two
/// chunks. An incomplete sequence at the end of a chunk is held back and
/// prepended to the next one. Chunks with genuinely invalid bytes go out as hex.
#[derive(Debug, Default)]
pub struct OutputDecoder {
    pending: Vec<u8>,
}

impl OutputDecoder {
    /// Decode the next chunk. `None` if everything was held back.
    pub fn push(&mut self, chunk: Vec<u8>) -> Option<Event> {
        let mut bytes = if self.pending.is_empty() {
            chunk
        } else {
            let mut bytes = std::mem::take(&mut self.pending);
            bytes.extend_from_slice(&chunk);
            bytes
        };

        if let Err(e) = std::str::from_utf8(&bytes) {
            if e.error_len().is_none() {
                self.pending = bytes.split_off(e.valid_up_to());
            }
        }

        (!bytes.is_empty()).then(|| Event::data(bytes))
    }

    /// Flush whatever is still held back, once no more output will come.
    pub fn finish(&mut self) -> Option<Event> {
        (!self.pending.is_empty()).then(|| Event::data(std::mem::take(&mut self.pending)))
    }
}

/// Parse one line of input.
pub fn parse_request(line: &str) -> Result<Request, String> {
    serde_json::from_str(line).map_err(|e| format!("Invalid request: {e}"))
}

/// Read a JSON object of strings as pairs, keeping document order.
fn env_in_order<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct EnvVisitor;

    impl<'de> Visitor<'de> for EnvVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an object of string values")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut env = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry()? {
                env.push(entry);
            }
            Ok(env)
        }
    }

    deserializer.deserialize_map(EnvVisitor)
}

/// Lowercase hex, two digits per byte.
fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
