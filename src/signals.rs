//! Process-wide pending-signal flags.
//!
//! SIGWINCH and SIGHUP arrive in interrupt context, where the only safe
//! action is storing a flag. The single UI thread consumes the flags on its
//! next processing pass via the `take_*` accessors; no other state is ever
//! touched from a handler.

use std::sync::atomic::{AtomicBool, Ordering};

static RESIZE_PENDING: AtomicBool = AtomicBool::new(false);
static HANGUP_PENDING: AtomicBool = AtomicBool::new(false);

/// Consume the resize-requested flag.
pub fn take_resize() -> bool {
    RESIZE_PENDING.swap(false, Ordering::Relaxed)
}

/// Consume the hangup-requested flag.
pub fn take_hangup() -> bool {
    HANGUP_PENDING.swap(false, Ordering::Relaxed)
}

extern "C" fn on_winch(_: libc::c_int) {
    RESIZE_PENDING.store(true, Ordering::Relaxed);
}

extern "C" fn on_hup(_: libc::c_int) {
    HANGUP_PENDING.store(true, Ordering::Relaxed);
}

/// Install the SIGWINCH/SIGHUP handlers.
pub fn install() -> std::io::Result<()> {
    set_handler(libc::SIGWINCH, on_winch as usize)?;
    set_handler(libc::SIGHUP, on_hup as usize)?;
    Ok(())
}

/// Restore the default disposition for both signals.
pub fn restore_default() {
    let _ = set_handler(libc::SIGWINCH, libc::SIG_DFL);
    let _ = set_handler(libc::SIGHUP, libc::SIG_DFL);
}

fn set_handler(sig: libc::c_int, action: usize) -> std::io::Result<()> {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = action;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut sa.sa_mask);
        if libc::sigaction(sig, &sa, std::ptr::null_mut()) != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_clears_the_flag() {
        on_winch(libc::SIGWINCH);
        assert!(take_resize());
        assert!(!take_resize());

        on_hup(libc::SIGHUP);
        assert!(take_hangup());
        assert!(!take_hangup());
    }
}
