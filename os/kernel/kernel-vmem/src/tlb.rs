use kernel_memory_addresses::LinearAddress;

/// Invalidate the TLB entry for the page containing `la` on this processor.
///
/// Uses `invlpg` on bare-metal x86; hosted builds have no TLB to maintain.
#[inline]
pub fn tlb_invalidate(la: LinearAddress) {
    #[cfg(all(target_os = "none", any(target_arch = "x86", target_arch = "x86_64")))]
    unsafe {
        core::arch::asm!(
            "invlpg [{}]",
            in(reg) la.as_u32() as usize,
            options(nostack, preserves_flags)
        );
    }

    #[cfg(not(all(target_os = "none", any(target_arch = "x86", target_arch = "x86_64"))))]
    let _ = la;
}
