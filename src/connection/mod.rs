mod fault;
use std::num::NonZeroU8;

pub use fault::{Classify, Fault, FaultKind, StatusCode};

mod impls;

#[cfg(feature = "simulated")]
pub use impls::{Simulated, SimulatedTag};

use crate::memory::{MemoryBank, TagFilter};

/// The number of words requested by a [`ReadData`] operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WordCount {
    /// Read the full bank, as long as the tag reports it to be.
    ///
    /// Encoded as `0` on the wire, and only understood by
    /// [`ModelClass::Modern`] readers.
    FullBank,
    Words(NonZeroU8),
}

impl WordCount {
    /// A request for exactly one word.
    pub const ONE: Self = match NonZeroU8::new(1) {
        Some(v) => Self::Words(v),
        None => unreachable!(),
    };

    /// Create a `WordCount` for `value` words.
    ///
    /// This function returns `None` if `value == 0`. Use
    /// [`WordCount::FullBank`] to request a full bank instead.
    pub fn words(value: u8) -> Option<Self> {
        NonZeroU8::new(value).map(Self::Words)
    }

    pub fn value(&self) -> u8 {
        match self {
            WordCount::FullBank => 0,
            WordCount::Words(v) => v.get(),
        }
    }
}

impl From<u8> for WordCount {
    fn from(value: u8) -> Self {
        Self::words(value).unwrap_or(Self::FullBank)
    }
}

impl From<WordCount> for u8 {
    fn from(value: WordCount) -> Self {
        value.value()
    }
}

/// A single read of consecutive words from a memory bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadData {
    pub bank: MemoryBank,
    pub word_address: u32,
    pub word_count: WordCount,
}

impl ReadData {
    pub fn new(bank: MemoryBank, word_address: u32, word_count: WordCount) -> Self {
        Self {
            bank,
            word_address,
            word_count,
        }
    }
}

impl core::fmt::Display for ReadData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.word_count {
            WordCount::FullBank => write!(f, "{} bank, full", self.bank),
            WordCount::Words(count) => write!(
                f,
                "{} bank, {} word(s) at 0x{:X}",
                self.bank, count, self.word_address
            ),
        }
    }
}

/// Whether a reader understands [`WordCount::FullBank`] requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelClass {
    /// Bulk reads must be paged explicitly.
    Legacy,
    /// Full-bank reads with a zero word count are supported.
    Modern,
}

impl ModelClass {
    const MODERN_MODELS: &'static [&'static str] = &[
        "M6e",
        "M6e PRC",
        "M6e JIC",
        "M6e Micro",
        "M6e Micro USB",
        "M6e Micro USBPro",
        "M6e Nano",
        "M6e Nano Sparkfun",
        "Mercury6",
        "Astra-EX",
        "Sargas",
        "Izar",
        "M7e Pico",
    ];

    /// Classify a reader by the model name it reports.
    ///
    /// Unknown models are assumed to be [`ModelClass::Legacy`], which is
    /// slower but supported by every reader.
    pub fn from_model_name(model: &str) -> Self {
        let model = model.trim();

        if Self::MODERN_MODELS
            .iter()
            .any(|m| m.eq_ignore_ascii_case(model))
        {
            Self::Modern
        } else {
            Self::Legacy
        }
    }

    pub fn supports_full_bank_reads(&self) -> bool {
        matches!(self, Self::Modern)
    }
}

impl core::fmt::Display for ModelClass {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ModelClass::Legacy => write!(f, "Legacy"),
            ModelClass::Modern => write!(f, "Modern"),
        }
    }
}

/// The device capability that all memory reads are built on.
///
/// Every call is a separate, blocking exchange that singulates the tag
/// selected by `filter` (or the first responding tag if `filter` is
/// `None`) and reads from it.
pub trait TagOpExecutor {
    type Error: core::fmt::Debug + Classify;

    /// Execute `op`. The returned words may be fewer than requested.
    fn execute(
        &mut self,
        op: &ReadData,
        filter: Option<&TagFilter>,
    ) -> Result<Vec<u16>, Self::Error>;
}

impl<T> TagOpExecutor for &mut T
where
    T: TagOpExecutor + ?Sized,
{
    type Error = T::Error;

    fn execute(
        &mut self,
        op: &ReadData,
        filter: Option<&TagFilter>,
    ) -> Result<Vec<u16>, Self::Error> {
        (**self).execute(op, filter)
    }
}
