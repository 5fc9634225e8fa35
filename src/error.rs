use crate::{
    connection::{Classify, FaultKind},
    memory::MemoryBank,
};

#[derive(Clone, Debug, PartialEq)]
pub enum ReadError<CON> {
    /// The device faulted before any data could be read.
    Device {
        bank: MemoryBank,
        word_address: u32,
        error: CON,
    },
}

impl<CON> ReadError<CON> {
    pub fn device(bank: MemoryBank, word_address: u32, error: CON) -> Self {
        Self::Device {
            bank,
            word_address,
            error,
        }
    }

    pub fn bank(&self) -> MemoryBank {
        match self {
            ReadError::Device { bank, .. } => *bank,
        }
    }

    pub fn into_inner(self) -> CON {
        match self {
            ReadError::Device { error, .. } => error,
        }
    }

    pub fn map<CON2, F>(self, f: F) -> ReadError<CON2>
    where
        F: FnOnce(CON) -> CON2,
    {
        match self {
            ReadError::Device {
                bank,
                word_address,
                error,
            } => ReadError::Device {
                bank,
                word_address,
                error: f(error),
            },
        }
    }
}

impl<CON> ReadError<CON>
where
    CON: Classify,
{
    pub fn fault_kind(&self) -> FaultKind {
        match self {
            ReadError::Device { error, .. } => error.fault_kind(),
        }
    }
}

impl<CON> core::fmt::Display for ReadError<CON>
where
    CON: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ReadError::Device {
                bank,
                word_address,
                error,
            } => write!(
                f,
                "Failed to read {bank} bank at word 0x{word_address:X}: {error:?}"
            ),
        }
    }
}

impl<CON> std::error::Error for ReadError<CON>
where
    CON: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReadError::Device { error, .. } => Some(error),
        }
    }
}
