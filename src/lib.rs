//! tagmem: fault-tolerant reading of Gen2 RFID tag memory.
//!
//! Readers and tags frequently refuse to return a whole memory bank in one
//! request. This library reads banks in pages, degrading to word-by-word
//! reads when pages fail, and returns as much of a bank as can be read (in
//! the [`memory`] module). The reader itself is abstracted behind the
//! [`TagOpExecutor`](connection::TagOpExecutor) trait (in the [`connection`]
//! module).

pub mod connection;

mod error;
pub use error::ReadError;

pub mod memory;
pub use memory::{BankRead, BankSet, MemoryBank, TagFilter, TagMemory};

#[macro_use]
mod fmt;
#[cfg(test)]
mod tests;

pub use fmt::{LogItem, LogOutput, Loggable, Logger};

use connection::{FaultKind, ModelClass, TagOpExecutor};
use memory::BankOutcome;

pub struct Reader<CON> {
    inner: CON,
    model: ModelClass,
}

impl<CON> Reader<CON> {
    pub fn release(self) -> CON {
        self.inner
    }

    pub fn model(&self) -> ModelClass {
        self.model
    }
}

impl<CON> Reader<CON>
where
    CON: TagOpExecutor,
{
    pub fn inner_mut(&mut self) -> &mut CON {
        &mut self.inner
    }

    pub fn new(inner: CON, model: ModelClass) -> Self {
        Self { inner, model }
    }

    /// Create a reader for a device that reports itself as `model_name`.
    pub fn for_model(inner: CON, model_name: &str) -> Self {
        let model = ModelClass::from_model_name(model_name);
        log::debug!("Reader model '{model_name}' is {model}");
        Self::new(inner, model)
    }

    /// Read all of `bank` from the tag selected by `filter`, or the first
    /// tag to respond if `filter` is `None`.
    ///
    /// See [`memory::read_bank`].
    pub fn read_bank(
        &mut self,
        bank: MemoryBank,
        filter: Option<&TagFilter>,
    ) -> Result<BankRead, ReadError<CON::Error>> {
        memory::read_bank(&mut self.inner, bank, filter, self.model)
    }

    /// Read `bank` one word at a time, starting after `seed`.
    ///
    /// See [`memory::read_word_by_word`].
    pub fn read_word_by_word(
        &mut self,
        bank: MemoryBank,
        filter: Option<&TagFilter>,
        seed: &[u16],
    ) -> Result<Vec<u16>, ReadError<CON::Error>> {
        memory::read_word_by_word(&mut self.inner, bank, filter, seed)
    }

    /// Read `bank` from each of `filters` in turn.
    ///
    /// Tags are read strictly one after the other.
    pub fn read_bank_of_each<'f, I>(
        &mut self,
        bank: MemoryBank,
        filters: I,
    ) -> Vec<(&'f TagFilter, Result<BankRead, ReadError<CON::Error>>)>
    where
        I: IntoIterator<Item = &'f TagFilter>,
    {
        filters
            .into_iter()
            .map(|filter| (filter, self.read_bank(bank, Some(filter))))
            .collect()
    }

    /// Read each of the selected `banks` from one tag, in bank order.
    ///
    /// Faults do not stop the other banks from being read. They are recorded
    /// per bank instead.
    pub fn read_tag(&mut self, filter: Option<&TagFilter>, banks: BankSet) -> TagMemory {
        let banks = banks
            .banks()
            .map(|bank| {
                let outcome = match self.read_bank(bank, filter) {
                    Ok(read) => BankOutcome::Read(read),
                    Err(e) => match e.fault_kind() {
                        FaultKind::MemoryLocked => {
                            log::info!("{bank} bank is locked");
                            BankOutcome::Locked
                        }
                        kind => {
                            log::warn!("{e}");
                            BankOutcome::Failed(kind)
                        }
                    },
                };

                (bank, outcome)
            })
            .collect();

        TagMemory {
            filter: filter.cloned(),
            banks,
        }
    }
}

impl<CON> From<(CON, ModelClass)> for Reader<CON>
where
    CON: TagOpExecutor,
{
    fn from((inner, model): (CON, ModelClass)) -> Self {
        Self::new(inner, model)
    }
}
