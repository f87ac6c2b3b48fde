//! Line-oriented command language driving the simulator
//!
//! ```text
//! # owner arms the device and walks away
//! connect AA:BB:CC:DD:EE:FF
//! auth
//! write activation 01
//! disconnect
//! sleep 500
//! show
//! ```

use data_encoding::HEXLOWER_PERMISSIVE;
use imob_proto::{parse_address, Attribute, PeerAddress, UnknownAttribute};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Connect(PeerAddress),
    Disconnect,
    Write { attribute: Attribute, data: Vec<u8> },
    /// Fresh nonce then the correct pass
    Auth,
    Contact(f32),
    Charger(f32),
    Battery(f32),
    Accel([i16; 3]),
    Sleep(u64),
    Show,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("{command}: missing {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("{command}: invalid {argument} {value:?}")]
    InvalidArgument {
        command: &'static str,
        argument: &'static str,
        value: String,
    },
    #[error("{command}: unexpected trailing arguments")]
    TrailingArguments { command: &'static str },
    #[error(transparent)]
    UnknownAttribute(#[from] UnknownAttribute),
    #[error("device id must be 16 hex digits, got {0:?}")]
    InvalidDeviceId(String),
}

struct Args<'a> {
    command: &'static str,
    words: std::str::SplitWhitespace<'a>,
}

impl<'a> Args<'a> {
    fn next(&mut self, argument: &'static str) -> Result<&'a str, ScriptError> {
        self.words.next().ok_or(ScriptError::MissingArgument {
            command: self.command,
            argument,
        })
    }

    fn parse<T: std::str::FromStr>(&mut self, argument: &'static str) -> Result<T, ScriptError> {
        let word = self.next(argument)?;
        word.parse().map_err(|_| ScriptError::InvalidArgument {
            command: self.command,
            argument,
            value: word.to_string(),
        })
    }

    fn finish(mut self) -> Result<(), ScriptError> {
        match self.words.next() {
            Some(_) => Err(ScriptError::TrailingArguments { command: self.command }),
            None => Ok(()),
        }
    }
}

/// Parse one line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>, ScriptError> {
    let line = match line.find('#') {
        Some(at) => &line[..at],
        None => line,
    };
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };

    let command: &'static str = match name {
        "connect" => "connect",
        "disconnect" => "disconnect",
        "write" => "write",
        "auth" => "auth",
        "contact" => "contact",
        "charger" => "charger",
        "battery" => "battery",
        "accel" => "accel",
        "sleep" => "sleep",
        "show" => "show",
        other => return Err(ScriptError::UnknownCommand(other.to_string())),
    };
    let mut args = Args { command, words };

    let parsed = match command {
        "connect" => {
            let word = args.next("address")?;
            let peer = parse_address(word).ok_or_else(|| ScriptError::InvalidArgument {
                command,
                argument: "address",
                value: word.to_string(),
            })?;
            Command::Connect(peer)
        }
        "disconnect" => Command::Disconnect,
        "write" => {
            let attribute: Attribute = args.next("attribute")?.parse()?;
            let word = args.next("value")?;
            let data = HEXLOWER_PERMISSIVE
                .decode(word.as_bytes())
                .map_err(|_| ScriptError::InvalidArgument {
                    command,
                    argument: "hex value",
                    value: word.to_string(),
                })?;
            Command::Write { attribute, data }
        }
        "auth" => Command::Auth,
        "contact" => Command::Contact(args.parse("level")?),
        "charger" => Command::Charger(args.parse("level")?),
        "battery" => Command::Battery(args.parse("level")?),
        "accel" => Command::Accel([args.parse("x")?, args.parse("y")?, args.parse("z")?]),
        "sleep" => Command::Sleep(args.parse("milliseconds")?),
        _ => Command::Show,
    };

    args.finish()?;
    Ok(Some(parsed))
}

/// Parse a 16-hex-digit device id into its two big-endian words
pub fn parse_device_id(s: &str) -> Result<[u32; 2], ScriptError> {
    let bytes = HEXLOWER_PERMISSIVE
        .decode(s.as_bytes())
        .map_err(|_| ScriptError::InvalidDeviceId(s.to_string()))?;
    if bytes.len() != 8 {
        return Err(ScriptError::InvalidDeviceId(s.to_string()));
    }

    let mut words = [0u32; 2];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(words)
}
