/// How a fault reported by the reader affects a memory read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// The requested range extends past the end of the bank.
    MemoryOverrun,
    /// The reply from the tag could not be decoded.
    BitDecodingFailed,
    /// No tag matching the filter responded.
    NoTagsFound,
    /// The bank is read-locked.
    MemoryLocked,
    /// A non-specific tag error. Usually seen at the end of a bank
    /// on readers that do not report overruns.
    Transient,
    /// Anything else.
    Other,
}

impl FaultKind {
    /// Whether this fault is treated as "no more readable memory".
    pub fn is_end_of_memory(&self) -> bool {
        matches!(self, Self::MemoryOverrun | Self::Transient)
    }
}

impl core::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FaultKind::MemoryOverrun => write!(f, "Memory overrun"),
            FaultKind::BitDecodingFailed => write!(f, "Bit decoding failed"),
            FaultKind::NoTagsFound => write!(f, "No tags found"),
            FaultKind::MemoryLocked => write!(f, "Memory locked"),
            FaultKind::Transient => write!(f, "Transient tag error"),
            FaultKind::Other => write!(f, "Other fault"),
        }
    }
}

/// Classification of a device error into a [`FaultKind`].
pub trait Classify {
    fn fault_kind(&self) -> FaultKind;
}

/// Fault status codes reported by the reader firmware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum StatusCode {
    NoTagsFound,
    GeneralTagError,
    BitDecodingFailed,
    Gen2OtherError,
    MemoryOverrunBadPc,
    MemoryLocked,
    Gen2NonSpecificError,
    Other(u16),
}

impl TryFrom<u16> for StatusCode {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let value = match value {
            0 => return Err(()),
            0x400 => Self::NoTagsFound,
            0x40A => Self::GeneralTagError,
            0x40F => Self::BitDecodingFailed,
            0x420 => Self::Gen2OtherError,
            0x423 => Self::MemoryOverrunBadPc,
            0x424 => Self::MemoryLocked,
            0x42F => Self::Gen2NonSpecificError,
            v => Self::Other(v),
        };

        Ok(value)
    }
}

impl From<StatusCode> for u16 {
    fn from(value: StatusCode) -> Self {
        match value {
            StatusCode::NoTagsFound => 0x400,
            StatusCode::GeneralTagError => 0x40A,
            StatusCode::BitDecodingFailed => 0x40F,
            StatusCode::Gen2OtherError => 0x420,
            StatusCode::MemoryOverrunBadPc => 0x423,
            StatusCode::MemoryLocked => 0x424,
            StatusCode::Gen2NonSpecificError => 0x42F,
            StatusCode::Other(v) => v,
        }
    }
}

impl StatusCode {
    pub fn kind(&self) -> FaultKind {
        match self {
            StatusCode::NoTagsFound => FaultKind::NoTagsFound,
            StatusCode::BitDecodingFailed => FaultKind::BitDecodingFailed,
            StatusCode::MemoryOverrunBadPc => FaultKind::MemoryOverrun,
            StatusCode::MemoryLocked => FaultKind::MemoryLocked,
            StatusCode::GeneralTagError
            | StatusCode::Gen2OtherError
            | StatusCode::Gen2NonSpecificError => FaultKind::Transient,
            StatusCode::Other(_) => FaultKind::Other,
        }
    }
}

/// A fault returned by a [`TagOpExecutor`](super::TagOpExecutor).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fault {
    pub kind: FaultKind,
    pub status: Option<StatusCode>,
    pub message: String,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// Create a fault from a firmware status code.
    ///
    /// Returns `None` if `code` is the success code `0`.
    pub fn from_status(code: u16, message: impl Into<String>) -> Option<Self> {
        let status = StatusCode::try_from(code).ok()?;

        Some(Self {
            kind: status.kind(),
            status: Some(status),
            message: message.into(),
        })
    }

    /// Classify a fault from the free-text message of older firmware
    /// that does not report a status code.
    ///
    /// Matching is by case-sensitive substring. Unrecognized messages are
    /// classified as [`FaultKind::Other`].
    pub fn from_legacy_message(message: impl Into<String>) -> Self {
        const PATTERNS: &[(&str, FaultKind)] = &[
            ("Non-specific reader error", FaultKind::Transient),
            ("General Tag Error", FaultKind::Transient),
            ("Tag data access failed", FaultKind::Transient),
            ("Memory overrun", FaultKind::MemoryOverrun),
            ("Memory locked", FaultKind::MemoryLocked),
            ("Bit decoding failed", FaultKind::BitDecodingFailed),
            ("No tags found", FaultKind::NoTagsFound),
        ];

        let message = message.into();
        let kind = PATTERNS
            .iter()
            .find(|(pattern, _)| message.contains(pattern))
            .map(|(_, kind)| *kind)
            .unwrap_or(FaultKind::Other);

        Self {
            kind,
            status: None,
            message,
        }
    }
}

impl Classify for Fault {
    fn fault_kind(&self) -> FaultKind {
        self.kind
    }
}

impl Classify for FaultKind {
    fn fault_kind(&self) -> FaultKind {
        *self
    }
}

impl core::fmt::Display for Fault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "{} (0x{:03X}): {}",
                self.kind,
                u16::from(status),
                self.message
            ),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for Fault {}
