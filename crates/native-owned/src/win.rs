//! Owners for Win32 kernel handles and COM interfaces.

use windows::Win32::Foundation::{CloseHandle, BOOL, HANDLE};
use windows::Win32::System::Threading::CreateEventW;
use windows_core::{Interface, PCWSTR};

use crate::{Close, ClosePtr, FinalizeError, Release, ReleasePtr};

// ============================================================================
// Kernel handles
// ============================================================================

/// A kernel object handle. Null and `INVALID_HANDLE_VALUE` are sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelHandle(pub HANDLE);

// Kernel handles are process-wide values, usable from any thread.
unsafe impl Send for KernelHandle {}
unsafe impl Sync for KernelHandle {}

impl Close for KernelHandle {
    fn is_invalid(&self) -> bool {
        self.0.is_invalid()
    }

    fn close(self) -> Result<(), FinalizeError> {
        unsafe { CloseHandle(self.0) }?;
        Ok(())
    }
}

pub type HandlePtr = ClosePtr<KernelHandle>;

impl HandlePtr {
    /// The raw handle, or a null handle when empty.
    pub fn raw(&self) -> HANDLE {
        self.get().map(|h| h.0).unwrap_or_default()
    }
}

/// Create an unnamed event object owned by the returned [`HandlePtr`].
pub fn create_event(manual_reset: bool, initially_signaled: bool) -> windows_core::Result<HandlePtr> {
    let handle = unsafe {
        CreateEventW(
            None,
            BOOL::from(manual_reset),
            BOOL::from(initially_signaled),
            PCWSTR::null(),
        )
    }?;
    tracing::debug!(?handle, manual_reset, "Created event");
    Ok(HandlePtr::new(KernelHandle(handle)))
}

// ============================================================================
// COM interfaces
// ============================================================================

/// One owned reference to a COM interface.
#[derive(Debug)]
pub struct Com<I: Interface>(pub I);

impl<I: Interface> Release for Com<I> {
    fn release(self) {
        // The interface wrapper calls `Release` when dropped.
        drop(self.0);
    }
}

pub type ComPtr<I> = ReleasePtr<Com<I>>;

#[cfg(test)]
mod tests {
    use windows::Win32::Foundation::{INVALID_HANDLE_VALUE, WAIT_OBJECT_0};
    use windows::Win32::System::Threading::{SetEvent, WaitForSingleObject};

    use super::*;

    #[test]
    fn test_event_round_trip() {
        let event = create_event(true, false).expect("create event");
        assert!(event.is_valid());

        unsafe { SetEvent(event.raw()) }.expect("signal event");
        let waited = unsafe { WaitForSingleObject(event.raw(), 0) };
        assert_eq!(waited, WAIT_OBJECT_0);
    }

    #[test]
    fn test_invalid_handle_is_sentinel() {
        let invalid = HandlePtr::new(KernelHandle(INVALID_HANDLE_VALUE));
        let null = HandlePtr::new(KernelHandle(HANDLE::default()));
        assert!(!invalid.is_valid());
        assert!(!null.is_valid());
    }

    #[test]
    fn test_empty_handle_reports_null() {
        let empty = HandlePtr::empty();
        assert!(empty.raw().is_invalid());
    }
}
