//! Error translation
//!
//! A strict theory function only reports success or failure. The details live
//! in the host engine's thread-local diagnostic channel (last message, last
//! code), which the next host call may overwrite. They are therefore read right
//! after the failing call and turned into an owned [`TheoryError`].

use crate::error::TheoryError;
use crate::ffi::binder::{Binder, ErrorPolicy, LibrarySource, SymbolSource};
use crate::ffi::loader::{LibraryResolver, LoadError};
use crate::ffi::safety::copy_c_str;
use crate::ffi::types::{ErrorCodeFn, ErrorMessageFn};
use libloading::Library;
use std::ffi::c_int;

/// Host error code: no error
pub const ERROR_SUCCESS: c_int = 0;
/// Host error code: runtime error
pub const ERROR_RUNTIME: c_int = 1;
/// Host error code: logic error
pub const ERROR_LOGIC: c_int = 2;
/// Host error code: allocation failure
pub const ERROR_BAD_ALLOC: c_int = 3;
/// Host error code: unknown error (still carries a message)
pub const ERROR_UNKNOWN: c_int = 4;

/// Placeholder used when the host has no message
pub const NO_MESSAGE: &str = "no message";

/// Map a host error code and message to an error
///
/// Codes 1, 2 and 4 are runtime failures, 3 is an allocation failure; every
/// other code is unclassified.
pub fn translate(code: c_int, message: Option<String>) -> TheoryError {
    let message = message.unwrap_or_else(|| NO_MESSAGE.to_string());
    match code {
        ERROR_RUNTIME | ERROR_LOGIC | ERROR_UNKNOWN => TheoryError::Runtime(message),
        ERROR_BAD_ALLOC => TheoryError::OutOfMemory(message),
        _ => TheoryError::Unknown,
    }
}

/// The host engine's diagnostic channel
pub trait ErrorChannel: Send {
    /// Message of the last error raised on this thread
    fn last_message(&self) -> Option<String>;

    /// Code of the last error raised on this thread
    fn last_code(&self) -> c_int;

    /// Read both values now and translate them
    fn capture(&self) -> TheoryError {
        let message = self.last_message();
        let code = self.last_code();
        translate(code, message)
    }
}

/// Diagnostic channel exported by the host library
/// (`clingo_error_message` / `clingo_error_code`)
pub struct HostErrorChannel {
    message: ErrorMessageFn,
    code: ErrorCodeFn,
    // Keeps the functions above mapped
    _source: Option<LibrarySource>,
}

impl HostErrorChannel {
    /// Prefix of the host's exported error functions
    pub const PREFIX: &'static str = "clingo";

    /// Load the host library and bind its error functions
    pub fn load(resolver: &LibraryResolver, library: &str) -> Result<Self, LoadError> {
        let source = LibrarySource::new(library, resolver.load(library)?);
        // SAFETY: the library stays loaded for as long as `Self` lives.
        let (message, code) = unsafe { Self::bind(&source)? };
        Ok(Self {
            message,
            code,
            _source: Some(source),
        })
    }

    /// Find the host copy the extension actually talks to
    ///
    /// The host's last-error state is per library copy, so a second copy of
    /// `library` would never see the extension's errors. Tried in order:
    /// 1. the extension library itself (its dependencies include the host)
    /// 2. the libraries already loaded into this process
    /// 3. `library` loaded through `resolver`
    ///
    /// # Safety
    ///
    /// `extension` must outlive the returned channel.
    pub unsafe fn locate(
        extension: &dyn SymbolSource,
        resolver: &LibraryResolver,
        library: &str,
    ) -> Result<Self, LoadError> {
        if let Ok(channel) = Self::from_source(extension) {
            tracing::debug!(library = extension.name(), "host error channel found through extension");
            return Ok(channel);
        }

        if let Some(process) = Self::process_library() {
            let source = LibrarySource::new("<process>", process);
            if let Ok((message, code)) = Self::bind(&source) {
                tracing::debug!("host error channel found in process");
                return Ok(Self {
                    message,
                    code,
                    _source: Some(source),
                });
            }
        }

        Self::load(resolver, library)
    }

    #[cfg(unix)]
    fn process_library() -> Option<Library> {
        Some(libloading::os::unix::Library::this().into())
    }

    #[cfg(windows)]
    fn process_library() -> Option<Library> {
        libloading::os::windows::Library::this().ok().map(Into::into)
    }

    /// Bind the error functions from a source that outlives the channel
    ///
    /// # Safety
    ///
    /// The addresses returned by `source` must stay valid for the lifetime of
    /// the channel and match the host's declarations.
    pub unsafe fn from_source(source: &dyn SymbolSource) -> Result<Self, LoadError> {
        let (message, code) = Self::bind(source)?;
        Ok(Self {
            message,
            code,
            _source: None,
        })
    }

    unsafe fn bind(source: &dyn SymbolSource) -> Result<(ErrorMessageFn, ErrorCodeFn), LoadError> {
        let binder = Binder::new(source, Self::PREFIX);
        let message = binder.require::<ErrorMessageFn>("error_message", ErrorPolicy::PassThrough)?;
        let code = binder.require::<ErrorCodeFn>("error_code", ErrorPolicy::PassThrough)?;
        Ok((message.get(), code.get()))
    }
}

impl ErrorChannel for HostErrorChannel {
    fn last_message(&self) -> Option<String> {
        // SAFETY: bound with the host's signature; the string is owned by the host
        // and copied before any further host call.
        unsafe { copy_c_str((self.message)()) }
    }

    fn last_code(&self) -> c_int {
        // SAFETY: bound with the host's signature.
        unsafe { (self.code)() }
    }
}

impl std::fmt::Debug for HostErrorChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostErrorChannel").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ffi::binder::SymbolTable;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::cell::RefCell;
    use std::ffi::{c_char, c_void, CString};

    thread_local! {
        static LAST: RefCell<(c_int, Option<CString>)> = const { RefCell::new((0, None)) };
    }

    extern "C" fn fake_error_message() -> *const c_char {
        LAST.with(|l| {
            l.borrow()
                .1
                .as_ref()
                .map_or(std::ptr::null(), |m| m.as_ptr())
        })
    }

    extern "C" fn fake_error_code() -> c_int {
        LAST.with(|l| l.borrow().0)
    }

    fn set_last(code: c_int, message: Option<&str>) {
        LAST.with(|l| *l.borrow_mut() = (code, message.map(|m| CString::new(m).unwrap())));
    }

    fn host_table() -> SymbolTable {
        let mut table = SymbolTable::new("libclingo");
        table
            .insert("clingo_error_message", fake_error_message as *const c_void)
            .insert("clingo_error_code", fake_error_code as *const c_void);
        table
    }

    #[rstest]
    #[case(ERROR_RUNTIME, ErrorKind::Runtime)]
    #[case(ERROR_LOGIC, ErrorKind::Runtime)]
    #[case(ERROR_UNKNOWN, ErrorKind::Runtime)]
    #[case(ERROR_BAD_ALLOC, ErrorKind::OutOfMemory)]
    #[case(ERROR_SUCCESS, ErrorKind::Unknown)]
    #[case(5, ErrorKind::Unknown)]
    #[case(-1, ErrorKind::Unknown)]
    fn test_code_to_kind(#[case] code: c_int, #[case] kind: ErrorKind) {
        assert_eq!(translate(code, Some("boom".to_string())).kind(), kind);
    }

    #[test]
    fn test_message_is_carried() {
        match translate(ERROR_LOGIC, Some("atom undefined".to_string())) {
            TheoryError::Runtime(msg) => assert_eq!(msg, "atom undefined"),
            other => panic!("unexpected {:?}", other),
        }
        match translate(ERROR_BAD_ALLOC, Some("bad_alloc".to_string())) {
            TheoryError::OutOfMemory(msg) => assert_eq!(msg, "bad_alloc"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_message_placeholder() {
        match translate(ERROR_RUNTIME, None) {
            TheoryError::Runtime(msg) => assert_eq!(msg, NO_MESSAGE),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_host_channel_capture() {
        let table = host_table();
        let channel = unsafe { HostErrorChannel::from_source(&table) }.unwrap();

        set_last(ERROR_BAD_ALLOC, Some("std::bad_alloc"));
        assert!(matches!(channel.capture(), TheoryError::OutOfMemory(m) if m == "std::bad_alloc"));

        set_last(ERROR_RUNTIME, None);
        assert_eq!(channel.last_message(), None);
        assert!(matches!(channel.capture(), TheoryError::Runtime(m) if m == NO_MESSAGE));
    }

    #[test]
    fn test_host_channel_requires_both_functions() {
        let mut table = host_table();
        table.remove("clingo_error_code");

        let result = unsafe { HostErrorChannel::from_source(&table) };
        assert!(matches!(
            result,
            Err(LoadError::SymbolNotFound { symbol, .. }) if symbol == "clingo_error_code"
        ));
    }

    #[test]
    fn test_locate_prefers_extension_symbols() {
        // The extension's dependencies export the host's error functions
        let extension = host_table();
        let resolver = LibraryResolver::new();

        let channel =
            unsafe { HostErrorChannel::locate(&extension, &resolver, "tefoli-no-such-host") }.unwrap();

        set_last(ERROR_LOGIC, Some("bound through extension"));
        assert!(matches!(channel.capture(), TheoryError::Runtime(m) if m == "bound through extension"));
    }

    #[test]
    fn test_locate_falls_back_to_loading_host() {
        let extension = SymbolTable::new("liblpx");
        let resolver = LibraryResolver::new();

        let result = unsafe { HostErrorChannel::locate(&extension, &resolver, "tefoli-no-such-host") };
        assert!(matches!(
            result,
            Err(LoadError::LibraryNotFound(name)) if name == "tefoli-no-such-host"
        ));
    }

    proptest! {
        #[test]
        fn prop_only_known_codes_are_classified(code in any::<c_int>()) {
            let kind = translate(code, None).kind();
            match code {
                1 | 2 | 4 => prop_assert_eq!(kind, ErrorKind::Runtime),
                3 => prop_assert_eq!(kind, ErrorKind::OutOfMemory),
                _ => prop_assert_eq!(kind, ErrorKind::Unknown),
            }
        }
    }
}
