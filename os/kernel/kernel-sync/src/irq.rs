//! # Interrupt Masking
//!
//! Save/disable/restore of the processor's interrupt flag, the primitive the
//! memory core builds its critical sections on.
//!
//! ## Backends
//!
//! | Target | Backend |
//! |--------|---------|
//! | bare-metal x86 / x86-64 (`target_os = "none"`) | `pushf`/`pop`, `cli`, `sti` |
//! | hosted targets | a per-thread simulated `IF` flag |
//! | other bare-metal targets | none, the build fails |
//!
//! The simulated backend lets the allocators and the fault resolver run
//! unmodified under the host test harness: every thread behaves like a
//! processor of its own that starts with interrupts enabled.

#[cfg(all(target_os = "none", any(target_arch = "x86", target_arch = "x86_64")))]
mod backend {
    /// Bit 9 (`IF`) of `EFLAGS`/`RFLAGS`.
    const IF: usize = 1 << 9;

    #[inline]
    pub fn disable() {
        unsafe { core::arch::asm!("cli", options(nomem, nostack, preserves_flags)) }
    }

    #[inline]
    pub fn enable() {
        unsafe { core::arch::asm!("sti", options(nomem, nostack, preserves_flags)) }
    }

    #[cfg(target_arch = "x86_64")]
    #[inline]
    pub fn enabled() -> bool {
        let r: usize;
        unsafe { core::arch::asm!("pushfq; pop {}", out(reg) r, options(nomem, preserves_flags)) }
        r & IF != 0
    }

    #[cfg(target_arch = "x86")]
    #[inline]
    pub fn enabled() -> bool {
        let r: usize;
        unsafe { core::arch::asm!("pushfd; pop {}", out(reg) r, options(nomem, preserves_flags)) }
        r & IF != 0
    }
}

#[cfg(all(target_os = "none", not(any(target_arch = "x86", target_arch = "x86_64"))))]
compile_error!("kernel-sync has no interrupt-flag backend for this bare-metal architecture");

#[cfg(not(target_os = "none"))]
mod backend {
    extern crate std;

    use core::cell::Cell;

    std::thread_local! {
        static IF: Cell<bool> = const { Cell::new(true) };
    }

    #[inline]
    pub fn disable() {
        IF.with(|f| f.set(false));
    }

    #[inline]
    pub fn enable() {
        IF.with(|f| f.set(true));
    }

    #[inline]
    pub fn enabled() -> bool {
        IF.with(Cell::get)
    }
}

/// Returns `true` if interrupts are currently enabled on this processor.
#[inline]
#[must_use]
pub fn interrupts_enabled() -> bool {
    backend::enabled()
}

/// Disables interrupts (`cli`).
///
/// # Safety & Privilege
///
/// On bare metal this must run where `cli` is permitted (CPL0).
#[inline]
pub fn disable_interrupts() {
    backend::disable();
}

/// Enables interrupts (`sti`).
///
/// # Safety & Privilege
///
/// On bare metal this must run where `sti` is permitted (CPL0).
#[inline]
pub fn enable_interrupts() {
    backend::enable();
}

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// `IrqGuard::new()` snapshots the interrupt flag. If interrupts were
/// enabled, it disables them. On drop, it re-enables them **only** if they
/// were previously enabled, so guards nest.
///
/// # Examples
///
/// ```
/// use kernel_sync::irq::{IrqGuard, interrupts_enabled};
///
/// let before = interrupts_enabled();
/// {
///     let _g = IrqGuard::new();
///     assert!(!interrupts_enabled());
/// }
/// assert_eq!(interrupts_enabled(), before);
/// ```
pub struct IrqGuard {
    /// Whether interrupts were enabled when the guard was created.
    were_enabled: bool,
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqGuard {
    /// Disables interrupts if they are currently enabled and remembers the state.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        let enabled = interrupts_enabled();
        if enabled {
            disable_interrupts();
        }
        Self {
            were_enabled: enabled,
        }
    }

    /// Whether this guard will re-enable interrupts when dropped.
    #[inline]
    #[must_use]
    pub const fn restores(&self) -> bool {
        self.were_enabled
    }
}

impl Drop for IrqGuard {
    /// Restores interrupts only if they were previously enabled.
    fn drop(&mut self) {
        if self.were_enabled {
            enable_interrupts();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_guards_restore_outermost_state() {
        assert!(interrupts_enabled());
        {
            let outer = IrqGuard::new();
            assert!(outer.restores());
            {
                let inner = IrqGuard::new();
                assert!(!inner.restores());
                assert!(!interrupts_enabled());
            }
            assert!(!interrupts_enabled());
        }
        assert!(interrupts_enabled());
    }

    #[test]
    fn guard_keeps_interrupts_off_if_they_were_off() {
        disable_interrupts();
        {
            let _g = IrqGuard::new();
            assert!(!interrupts_enabled());
        }
        assert!(!interrupts_enabled());
        enable_interrupts();
    }
}
