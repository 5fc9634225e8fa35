//! Reading whole memory banks from tags that cannot, or will not, return
//! them in a single request.
//!
//! Two strategies are used, depending on the [`ModelClass`] of the reader:
//!
//! * [`ModelClass::Legacy`] readers are read in pages of [`PAGE_WORDS`] words
//!   starting at word 0. When a page runs past the end of the bank, the
//!   remainder is read one word at a time.
//! * [`ModelClass::Modern`] readers are first asked for the full bank. Short
//!   responses are completed word by word, and banks of at least
//!   [`PAGE_WORDS`] words are continued in pages. When a continuation page
//!   runs past the end of the bank, the tail is read one word at a time.
//!
//! Both strategies end up in the word-by-word read, which is the slowest but
//! is supported by every reader and tag.
//!
//! Once any data has been read, faults are no longer returned as errors.
//! Instead the read ends, and the [`BankRead`] records whether it ended at the
//! end of the bank or was [truncated](Termination::Truncated) by a fault.

use std::num::NonZeroU8;

use crate::{
    connection::{Classify, FaultKind, ModelClass, ReadData, TagOpExecutor, WordCount},
    ReadError,
};

use super::{BankRead, MemoryBank, TagFilter, Termination, WordBuffer};

/// The number of words requested per page.
pub const PAGE_WORDS: u8 = 64;

const PAGE: WordCount = match NonZeroU8::new(PAGE_WORDS) {
    Some(v) => WordCount::Words(v),
    None => unreachable!(),
};

type ReadResult<CON> = Result<Termination, ReadError<<CON as TagOpExecutor>::Error>>;

/// Read the full contents of `bank` from the tag selected by `filter`.
///
/// A fault is only returned if it occurs before any data was read.
pub fn read_bank<CON>(
    executor: &mut CON,
    bank: MemoryBank,
    filter: Option<&TagFilter>,
    model: ModelClass,
) -> Result<BankRead, ReadError<CON::Error>>
where
    CON: TagOpExecutor,
{
    let mut reader = BankReader::new(executor, bank, filter, WordBuffer::new());

    log::debug!("Reading {bank} bank using {model} strategy");

    let termination = match model {
        ModelClass::Legacy => reader.read_paged()?,
        ModelClass::Modern => reader.read_full_bank()?,
    };

    Ok(reader.finish(termination))
}

/// Read `bank` one word at a time, continuing after the words in `seed`.
///
/// Words in `seed` are not requested again. A [`MemoryOverrun`] or transient
/// fault ends the read if any words are known, and any other fault is
/// returned regardless.
///
/// [`MemoryOverrun`]: FaultKind::MemoryOverrun
pub fn read_word_by_word<CON>(
    executor: &mut CON,
    bank: MemoryBank,
    filter: Option<&TagFilter>,
    seed: &[u16],
) -> Result<Vec<u16>, ReadError<CON::Error>>
where
    CON: TagOpExecutor,
{
    let mut reader = BankReader::new(executor, bank, filter, WordBuffer::seeded(seed));
    reader.word_by_word()?;
    Ok(reader.buffer.into_words())
}

struct BankReader<'a, CON> {
    executor: &'a mut CON,
    bank: MemoryBank,
    filter: Option<&'a TagFilter>,
    buffer: WordBuffer,
}

impl<'a, CON> BankReader<'a, CON>
where
    CON: TagOpExecutor,
{
    fn new(
        executor: &'a mut CON,
        bank: MemoryBank,
        filter: Option<&'a TagFilter>,
        buffer: WordBuffer,
    ) -> Self {
        Self {
            executor,
            bank,
            filter,
            buffer,
        }
    }

    fn finish(self, termination: Termination) -> BankRead {
        if let Termination::Truncated(kind) = termination {
            log::warn!(
                "{} bank read truncated after {} words: {kind}",
                self.bank,
                self.buffer.len()
            );
        }

        BankRead {
            bank: self.bank,
            words: self.buffer.into_words(),
            termination,
        }
    }

    fn request(&mut self, word_address: u32, word_count: WordCount) -> Result<Vec<u16>, CON::Error> {
        let op = ReadData::new(self.bank, word_address, word_count);
        log::trace!("Requesting {op}");

        let mut words = self.executor.execute(&op, self.filter)?;

        if let WordCount::Words(count) = word_count {
            words.truncate(count.get() as usize);
        }

        Ok(words)
    }

    /// Request the page at the cursor and append it.
    ///
    /// Returns `Ok(false)` if the tag returned no data.
    fn next_page(&mut self, word_count: WordCount) -> Result<bool, (u32, CON::Error)> {
        let address = self.buffer.cursor();

        match self.request(address, word_count) {
            Ok(words) if words.is_empty() => {
                log::debug!("Empty response at word 0x{address:X}, assuming end of memory");
                Ok(false)
            }
            Ok(words) => {
                self.buffer.append(&words);
                Ok(true)
            }
            Err(e) => Err((address, e)),
        }
    }

    fn error(&self, word_address: u32, error: CON::Error) -> ReadError<CON::Error> {
        ReadError::device(self.bank, word_address, error)
    }

    fn word_by_word(&mut self) -> ReadResult<CON> {
        log::debug!(
            "Reading {} bank word by word from word 0x{:X}",
            self.bank,
            self.buffer.cursor()
        );

        loop {
            match self.next_page(WordCount::ONE) {
                Ok(true) => {}
                Ok(false) => return Ok(Termination::EndOfMemory),
                Err((address, e)) => {
                    if e.fault_kind().is_end_of_memory() && !self.buffer.is_empty() {
                        log::debug!("End of {} bank at word 0x{address:X}: {e:?}", self.bank);
                        return Ok(Termination::EndOfMemory);
                    }

                    return Err(self.error(address, e));
                }
            }
        }
    }

    /// Word-by-word read that does not fail once data exists.
    fn word_by_word_or_partial(&mut self) -> ReadResult<CON> {
        match self.word_by_word() {
            Err(e) if !self.buffer.is_empty() => {
                log::debug!("Ignoring fault after {} words: {e}", self.buffer.len());
                Ok(Termination::Truncated(e.fault_kind()))
            }
            other => other,
        }
    }

    fn read_paged(&mut self) -> ReadResult<CON> {
        loop {
            let (address, e) = match self.next_page(PAGE) {
                Ok(true) => continue,
                Ok(false) => return Ok(Termination::EndOfMemory),
                Err(e) => e,
            };

            let kind = e.fault_kind();

            if kind.is_end_of_memory() {
                log::debug!(
                    "Page at word 0x{address:X} of {} bank failed ({kind}), switching to word by word",
                    self.bank
                );
                return self.word_by_word_or_partial();
            } else if self.buffer.is_empty() {
                return Err(self.error(address, e));
            } else {
                log::debug!("Ignoring fault after {} words: {e:?}", self.buffer.len());
                return Ok(Termination::Truncated(kind));
            }
        }
    }

    fn read_full_bank(&mut self) -> ReadResult<CON> {
        match self.next_page(WordCount::FullBank) {
            Ok(_) if self.buffer.len() < PAGE_WORDS as usize => {
                log::debug!(
                    "Full {} bank read returned {} words, refining word by word",
                    self.bank,
                    self.buffer.len()
                );
                self.word_by_word_or_partial()
            }
            Ok(_) => self.continue_large_bank(),
            Err((address, e)) => match e.fault_kind() {
                kind @ (FaultKind::BitDecodingFailed | FaultKind::NoTagsFound) => {
                    log::debug!("Full {} bank read failed ({kind}), falling back", self.bank);
                    self.word_by_word_or_partial()
                }
                _ => Err(self.error(address, e)),
            },
        }
    }

    fn continue_large_bank(&mut self) -> ReadResult<CON> {
        let mut retried = false;

        loop {
            let (address, e) = match self.next_page(PAGE) {
                Ok(true) => {
                    retried = false;
                    continue;
                }
                Ok(false) => return Ok(Termination::EndOfMemory),
                Err(e) => e,
            };

            match e.fault_kind() {
                FaultKind::BitDecodingFailed if !retried => {
                    log::debug!("Bit decoding failed at word 0x{address:X}, retrying once");
                    retried = true;
                }
                kind if kind.is_end_of_memory() => {
                    log::debug!(
                        "Page at word 0x{address:X} of {} bank failed ({kind}), reading remainder word by word",
                        self.bank
                    );
                    return self.word_by_word_or_partial();
                }
                kind => {
                    log::debug!("Stopping large bank read at word 0x{address:X}: {e:?}");
                    return Ok(Termination::Truncated(kind));
                }
            }
        }
    }
}
