//! RFID reader wire format.
//!
//! The reader speaks ASCII frames terminated by a carriage return. Requests
//! are a command word with optional `|`-separated arguments; every response
//! has the shape `<OK|NOK>[|<barcode>[|<tag>]]`.

/// Frame terminator.
pub const FRAME_TERMINATOR: u8 = b'\r';

/// Largest frame accepted from the reader, terminator included.
pub const MAX_FRAME_LEN: usize = 512;

/// Version announced in the handshake.
pub const PROTOCOL_VERSION: &str = "2.00";

/// Device-assigned tag handle.
pub type TagId = String;

/// Command sent to the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Version handshake, must succeed before anything else
    Initialize,
    BeginScan,
    EndScan,
    /// Arm the security bit; without a tag the tags in the field are armed
    AlarmOn { tag: Option<TagId> },
    /// Disarm the security bit
    AlarmOff { tag: Option<TagId> },
    /// Program the tag in the field with a (prefixed) barcode
    Write { barcode: String },
}

impl DeviceCommand {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            DeviceCommand::Initialize => "initialize",
            DeviceCommand::BeginScan => "begin-scan",
            DeviceCommand::EndScan => "end-scan",
            DeviceCommand::AlarmOn { .. } => "alarm-on",
            DeviceCommand::AlarmOff { .. } => "alarm-off",
            DeviceCommand::Write { .. } => "write",
        }
    }
}

/// Parsed reader response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceResponse {
    pub ok: bool,
    pub barcode: Option<String>,
    pub tag: Option<TagId>,
}

impl DeviceResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            ..Default::default()
        }
    }

    pub fn nok() -> Self {
        Self::default()
    }

    /// Response carrying a scanned barcode.
    pub fn scan(ok: bool, barcode: impl Into<String>, tag: Option<&str>) -> Self {
        Self {
            ok,
            barcode: Some(barcode.into()),
            tag: tag.map(str::to_string),
        }
    }
}

/// Malformed frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("frame is not terminated by CR")]
    Unterminated,

    #[error("frame exceeds {MAX_FRAME_LEN} bytes")]
    TooLong,

    #[error("frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("unknown response status: {0:?}")]
    UnknownStatus(String),

    #[error("too many fields in frame: {0}")]
    TooManyFields(usize),
}

/// Translates between typed commands/responses and wire frames.
#[derive(Debug, Default)]
pub struct DeviceCodec {
    /// Commands encoded since the last reset
    sequence: u32,
}

impl DeviceCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a command into a complete frame.
    pub fn encode(&mut self, command: &DeviceCommand) -> Vec<u8> {
        self.sequence = self.sequence.wrapping_add(1);

        let mut frame = match command {
            DeviceCommand::Initialize => format!("VER{}", PROTOCOL_VERSION),
            DeviceCommand::BeginScan => "BEG".to_string(),
            DeviceCommand::EndScan => "END".to_string(),
            DeviceCommand::AlarmOn { tag } => with_tag("ACT", tag.as_deref()),
            DeviceCommand::AlarmOff { tag } => with_tag("DAC", tag.as_deref()),
            DeviceCommand::Write { barcode } => format!("WRT|{}", barcode),
        }
        .into_bytes();
        frame.push(FRAME_TERMINATOR);
        frame
    }

    /// Decode one complete frame, terminator included.
    pub fn decode(&self, frame: &[u8]) -> Result<DeviceResponse, CodecError> {
        if frame.len() > MAX_FRAME_LEN {
            return Err(CodecError::TooLong);
        }
        let body = match frame.split_last() {
            Some((&FRAME_TERMINATOR, body)) => body,
            _ => return Err(CodecError::Unterminated),
        };
        let text = std::str::from_utf8(body).map_err(|_| CodecError::InvalidUtf8)?;
        // Some firmware sends CRLF-style pairs; a leading LF belongs to the
        // previous frame.
        let text = text.trim_start_matches('\n');

        let fields: Vec<&str> = text.split('|').collect();
        if fields.len() > 3 {
            return Err(CodecError::TooManyFields(fields.len()));
        }
        let ok = match fields[0] {
            "OK" => true,
            "NOK" => false,
            other => return Err(CodecError::UnknownStatus(other.to_string())),
        };
        let field = |i: usize| {
            fields
                .get(i)
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
        };

        Ok(DeviceResponse {
            ok,
            barcode: field(1),
            tag: field(2),
        })
    }

    /// Start a new batch.
    pub fn reset(&mut self) {
        self.sequence = 0;
    }

    /// Number of commands encoded since the last reset.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

fn with_tag(word: &str, tag: Option<&str>) -> String {
    match tag {
        Some(tag) if !tag.is_empty() => format!("{}|{}", word, tag),
        _ => word.to_string(),
    }
}
