//! Helpers shared by the exported functions: argument conversion, the
//! returned-string buffer, panic containment and device dispatch.

use std::cell::RefCell;
use std::ffi::{CStr, CString, c_char, c_int};
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use synthlib_core::{Error, Result, Synthesizer};

use crate::status::{HOLZ_ERR_PANIC, to_status};
use crate::{registry, runtime};

thread_local! {
    static RETURN_BUF: RefCell<CString> = RefCell::new(CString::default());
}

/// Borrow a NUL-terminated UTF-8 argument.
///
/// # Safety
///
/// `ptr` must be NULL or point to a NUL-terminated string that stays valid
/// for the duration of the call.
pub(crate) unsafe fn c_str<'a>(ptr: *const c_char) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(Error::InvalidParameter("NULL string argument".into()));
    }
    // SAFETY: non-NULL and NUL-terminated per the caller's contract.
    let cstr = unsafe { CStr::from_ptr(ptr) };
    cstr.to_str()
        .map_err(|_| Error::InvalidParameter("string argument is not UTF-8".into()))
}

/// Store `text` in this thread's return buffer and hand out a pointer to
/// it. The pointer is valid until the next string-returning call on the
/// same thread.
pub(crate) fn return_string(text: String) -> *mut c_char {
    let bytes: Vec<u8> = text.into_bytes().into_iter().filter(|&b| b != 0).collect();
    let cstring = CString::new(bytes).unwrap_or_default();
    RETURN_BUF.with(|buf| {
        *buf.borrow_mut() = cstring;
        buf.borrow().as_ptr() as *mut c_char
    })
}

/// Render a string result the way string-returning exports report errors.
pub(crate) fn string_or_error(result: Result<String>) -> String {
    match result {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(error = %e, "C ABI string call failed");
            format!("ERROR: {e}")
        }
    }
}

/// Run `f`, turning a panic into `on_panic`. Panics must not unwind into C.
pub(crate) fn guarded<T>(on_panic: T, f: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            tracing::error!("panic caught at the C ABI boundary");
            on_panic
        }
    }
}

/// Look up the open device `serial` and run `op` against it on the shared
/// runtime.
pub(crate) fn with_device<T, F, Fut>(serial: Result<&str>, op: F) -> Result<T>
where
    F: FnOnce(Arc<dyn Synthesizer>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let synth = registry::get(serial?)?;
    runtime::block_on(op(synth))?
}

/// [`with_device`] for a raw `serialnum` argument.
///
/// # Safety
///
/// Same contract as [`c_str`] for `serialnum`.
pub(crate) unsafe fn device_call<T, F, Fut>(serialnum: *const c_char, op: F) -> Result<T>
where
    F: FnOnce(Arc<dyn Synthesizer>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let serial = unsafe { c_str(serialnum) };
    with_device(serial, op)
}

/// Run a unit operation against `serialnum` and report it as a status.
///
/// # Safety
///
/// Same contract as [`c_str`] for `serialnum`.
pub(crate) unsafe fn device_status<F, Fut>(serialnum: *const c_char, op: F) -> c_int
where
    F: FnOnce(Arc<dyn Synthesizer>) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    guarded(HOLZ_ERR_PANIC, || to_status(unsafe { device_call(serialnum, op) }))
}
