use crate::swap::SwapError;
use kernel_memory_addresses::LinearAddress;
use kernel_vmem::WalkError;

/// Why a page fault (or a mapping request) could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FaultError {
    #[error("no memory area covers {0}")]
    InvalidAddress(LinearAddress),
    #[error("access to {0} is not permitted by its memory area")]
    PermissionDenied(LinearAddress),
    #[error("read fault on the present page at {0}")]
    ReadOnPresent(LinearAddress),
    #[error("write fault on the present page at {0}")]
    AlreadyMapped(LinearAddress),
    #[error("out of memory")]
    OutOfMemory,
    #[error("swap I/O failed")]
    SwapIo(#[from] SwapError),
    #[error("swap token at {0} while swap is not enabled")]
    SwapUnavailable(LinearAddress),
    #[error("address space has no page directory")]
    NoPageDirectory,
    #[error("entry {raw:#010x} at {la} is neither a mapping nor a swap token")]
    CorruptEntry { la: LinearAddress, raw: u32 },
}

impl FaultError {
    /// Numeric code reported to the trap dispatcher.
    ///
    /// | Code | Class |
    /// |------|-------|
    /// | `-3` | policy rejection |
    /// | `-4` | resource exhaustion |
    /// | `-5` | swap I/O |
    /// | `-6` | configuration or order error |
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::InvalidAddress(_)
            | Self::PermissionDenied(_)
            | Self::ReadOnPresent(_)
            | Self::AlreadyMapped(_) => -3,
            Self::OutOfMemory => -4,
            Self::SwapIo(_) => -5,
            Self::SwapUnavailable(_) | Self::NoPageDirectory | Self::CorruptEntry { .. } => -6,
        }
    }
}

impl From<WalkError> for FaultError {
    fn from(err: WalkError) -> Self {
        match err {
            WalkError::OutOfMemory(_) => Self::OutOfMemory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_group_by_class() {
        let la = LinearAddress::new(0x2050);
        assert_eq!(FaultError::InvalidAddress(la).code(), -3);
        assert_eq!(FaultError::ReadOnPresent(la).code(), -3);
        assert_eq!(FaultError::from(WalkError::OutOfMemory(la)), FaultError::OutOfMemory);
        assert_eq!(FaultError::OutOfMemory.code(), -4);
        assert_eq!(FaultError::from(SwapError::InvalidSlot(9)).code(), -5);
        assert_eq!(FaultError::SwapUnavailable(la).code(), -6);
    }
}
