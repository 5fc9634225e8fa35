//! Gen2 tag memory: banks, filters, and reading them.

mod contents;
mod filter;
mod paged;

pub use contents::{
    BankOutcome, BankRead, EpcBank, ReservedBank, TagMemory, Termination, TidBank,
};
pub use filter::{ParseFilterError, TagFilter};
pub use paged::{read_bank, read_word_by_word, PAGE_WORDS};

use bitflags::bitflags;

/// One of the four memory banks of a Gen2 tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemoryBank {
    /// Kill and access passwords.
    Reserved,
    /// CRC, PC word and EPC.
    Epc,
    /// Tag identifier.
    Tid,
    User,
}

impl MemoryBank {
    pub const ALL: [MemoryBank; 4] = [Self::Reserved, Self::Epc, Self::Tid, Self::User];

    pub fn value(&self) -> u8 {
        match self {
            MemoryBank::Reserved => 0,
            MemoryBank::Epc => 1,
            MemoryBank::Tid => 2,
            MemoryBank::User => 3,
        }
    }
}

impl TryFrom<u8> for MemoryBank {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Reserved),
            1 => Ok(Self::Epc),
            2 => Ok(Self::Tid),
            3 => Ok(Self::User),
            _ => Err(()),
        }
    }
}

impl From<MemoryBank> for u8 {
    fn from(value: MemoryBank) -> Self {
        value.value()
    }
}

impl core::fmt::Display for MemoryBank {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MemoryBank::Reserved => write!(f, "Reserved"),
            MemoryBank::Epc => write!(f, "EPC"),
            MemoryBank::Tid => write!(f, "TID"),
            MemoryBank::User => write!(f, "User"),
        }
    }
}

impl core::str::FromStr for MemoryBank {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reserved" => Ok(Self::Reserved),
            "epc" => Ok(Self::Epc),
            "tid" => Ok(Self::Tid),
            "user" => Ok(Self::User),
            other => Err(format!("Unknown memory bank '{other}'")),
        }
    }
}

bitflags! {
    /// A selection of memory banks.
    pub struct BankSet: u8 {
        const RESERVED = 0b0001;
        const EPC = 0b0010;
        const TID = 0b0100;
        const USER = 0b1000;
    }
}

impl BankSet {
    /// The selected banks, in bank order.
    pub fn banks(&self) -> impl Iterator<Item = MemoryBank> + '_ {
        MemoryBank::ALL
            .into_iter()
            .filter(move |bank| self.contains(BankSet::from(*bank)))
    }
}

impl From<MemoryBank> for BankSet {
    fn from(value: MemoryBank) -> Self {
        match value {
            MemoryBank::Reserved => Self::RESERVED,
            MemoryBank::Epc => Self::EPC,
            MemoryBank::Tid => Self::TID,
            MemoryBank::User => Self::USER,
        }
    }
}

/// Words accumulated over the course of one read.
///
/// The buffer only grows, and its length is the address of the next
/// word to request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct WordBuffer {
    words: Vec<u16>,
}

impl WordBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(seed: &[u16]) -> Self {
        Self {
            words: seed.to_vec(),
        }
    }

    pub fn cursor(&self) -> u32 {
        self.words.len() as u32
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn append(&mut self, words: &[u16]) {
        self.words.extend_from_slice(words);
    }

    pub fn into_words(self) -> Vec<u16> {
        self.words
    }
}
