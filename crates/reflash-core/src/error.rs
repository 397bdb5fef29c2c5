//! Error types for reflash-core
//!
//! The error values double as negative response codes: the diagnostic layer
//! above the driver relays [`Error::response_code`] to the host tool
//! unchanged, so the numeric values must stay stable across chip variants.

use core::fmt;

/// Standard ISO 14230 response codes relayed next to the flash errors
pub mod nrc {
    /// Positive response (operation completed)
    pub const POSITIVE: u8 = 0x00;
    /// generalReject
    pub const GENERAL_REJECT: u8 = 0x10;
    /// serviceNotSupported
    pub const SERVICE_NOT_SUPPORTED: u8 = 0x11;
    /// subFunctionNotSupported-invalidFormat
    pub const SUBFUNCTION_NOT_SUPPORTED: u8 = 0x12;
    /// conditionsNotCorrectOrRequestSequenceError
    pub const CONDITIONS_NOT_CORRECT: u8 = 0x22;
    /// invalidKey
    pub const INVALID_KEY: u8 = 0x35;
    /// canNotDownloadToSpecifiedAddress
    pub const CANNOT_DOWNLOAD_TO_ADDRESS: u8 = 0x42;

    /// Flash controller refused access (write-enable pin low or fault latched)
    pub const PROTECTION_FAULT: u8 = 0x80;
    /// Block index beyond the block map
    pub const BAD_BLOCK: u8 = 0x84;
    /// Block still not blank after all erase attempts
    pub const ERASE_VERIFY_FAILED: u8 = 0x85;
    /// Destination beyond the ROM
    pub const OUT_OF_BOUNDS: u8 = 0x88;
    /// Destination not on a chunk boundary
    pub const MISALIGNED: u8 = 0x89;
    /// Length not a multiple of the chunk size
    pub const LENGTH_INVALID: u8 = 0x8A;
    /// Cell read back 0 where a 1 was wanted
    pub const VERIFY_HARD_FAULT: u8 = 0x8B;
    /// Chunk still mismatched after all program attempts
    pub const MAX_RETRIES_EXCEEDED: u8 = 0x8C;
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Destination (or destination + length) is beyond the ROM
    OutOfBounds,
    /// Destination is not aligned to the chunk size
    Misaligned,
    /// Length is not a multiple of the chunk size
    LengthInvalid,
    /// Block index is not in the block map
    BadBlock,
    /// Erase verify still failing after the last attempt
    EraseVerifyFailed,
    /// Write-enable not asserted, or the fault latch is set
    ProtectionFault,
    /// Program verify still mismatching after the last attempt
    MaxRetriesExceeded,
    /// A cell reads 0 where the source wants 1; not recoverable by pulsing
    VerifyHardFault,
    /// Anything else the protocol layer should reject
    GenericError,
}

impl Error {
    /// All error values, in response code order
    pub const ALL: [Error; 9] = [
        Error::GenericError,
        Error::ProtectionFault,
        Error::BadBlock,
        Error::EraseVerifyFailed,
        Error::OutOfBounds,
        Error::Misaligned,
        Error::LengthInvalid,
        Error::VerifyHardFault,
        Error::MaxRetriesExceeded,
    ];

    /// Negative response code for this error
    pub const fn response_code(self) -> u8 {
        match self {
            Self::OutOfBounds => nrc::OUT_OF_BOUNDS,
            Self::Misaligned => nrc::MISALIGNED,
            Self::LengthInvalid => nrc::LENGTH_INVALID,
            Self::BadBlock => nrc::BAD_BLOCK,
            Self::EraseVerifyFailed => nrc::ERASE_VERIFY_FAILED,
            Self::ProtectionFault => nrc::PROTECTION_FAULT,
            Self::MaxRetriesExceeded => nrc::MAX_RETRIES_EXCEEDED,
            Self::VerifyHardFault => nrc::VERIFY_HARD_FAULT,
            Self::GenericError => nrc::GENERAL_REJECT,
        }
    }

    /// Map a response code back to the error it came from
    pub fn from_response_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.response_code() == code)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "destination out of bounds"),
            Self::Misaligned => write!(f, "destination not aligned to chunk size"),
            Self::LengthInvalid => write!(f, "length not a multiple of chunk size"),
            Self::BadBlock => write!(f, "bad block number"),
            Self::EraseVerifyFailed => write!(f, "erase verify failed"),
            Self::ProtectionFault => write!(f, "flash write-enable not asserted or fault latched"),
            Self::MaxRetriesExceeded => write!(f, "program verify failed: max attempts exceeded"),
            Self::VerifyHardFault => write!(f, "program verify found a 1 bit stuck at 0"),
            Self::GenericError => write!(f, "general flash error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

/// Response code for the outcome of a driver call
///
/// Success of any kind maps to [`nrc::POSITIVE`].
pub fn response_code<T>(result: &Result<T>) -> u8 {
    match result {
        Ok(_) => nrc::POSITIVE,
        Err(e) => e.response_code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_codes_are_stable() {
        assert_eq!(Error::ProtectionFault.response_code(), 0x80);
        assert_eq!(Error::BadBlock.response_code(), 0x84);
        assert_eq!(Error::EraseVerifyFailed.response_code(), 0x85);
        assert_eq!(Error::OutOfBounds.response_code(), 0x88);
        assert_eq!(Error::Misaligned.response_code(), 0x89);
        assert_eq!(Error::LengthInvalid.response_code(), 0x8A);
        assert_eq!(Error::VerifyHardFault.response_code(), 0x8B);
        assert_eq!(Error::MaxRetriesExceeded.response_code(), 0x8C);
        assert_eq!(Error::GenericError.response_code(), 0x10);
    }

    #[test]
    fn test_response_codes_round_trip() {
        for e in Error::ALL {
            assert_eq!(Error::from_response_code(e.response_code()), Some(e));
        }
        assert_eq!(Error::from_response_code(nrc::POSITIVE), None);
        assert_eq!(Error::from_response_code(nrc::INVALID_KEY), None);
    }

    #[test]
    fn test_result_response_code() {
        let ok: Result<u32> = Ok(3);
        let err: Result<u32> = Err(Error::BadBlock);
        assert_eq!(response_code(&ok), nrc::POSITIVE);
        assert_eq!(response_code(&err), nrc::BAD_BLOCK);
    }
}
