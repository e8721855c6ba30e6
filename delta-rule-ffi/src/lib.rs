// Delta Rule - Change and deviation detection for telemetry datapoints
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! C bindings exposing the Delta rule as a notification rule plugin
//!
//! The notification host loads this library and drives the rule through
//! the usual plugin entry points: info, init, triggers, eval, reason,
//! reconfigure and shutdown. All documents cross the boundary as
//! null-terminated JSON strings.
//!
//! # Safety
//!
//! All functions in this module use raw pointers.
//! Callers must ensure:
//! - Pointers are valid and non-null (unless documented otherwise)
//! - Strings are null-terminated UTF-8
//! - Handles are not used after being shut down
//! - Strings returned by this library are released with
//!   `delta_rule_string_free()` and nothing else

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use delta_rule::{DeltaRule, PluginInfo};

/// Result codes for Delta rule FFI functions
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaResult {
    /// Operation completed successfully
    Ok = 0,
    /// Null pointer was provided
    ErrorNullPointer = 1,
    /// Invalid UTF-8 string
    ErrorInvalidUtf8 = 2,
    /// Configuration was rejected
    ErrorInvalidConfig = 3,
}

/// Opaque rule handle
///
/// Created with `delta_rule_init()`, freed with `delta_rule_shutdown()`.
/// Do not access internal fields directly.
pub struct DeltaRuleHandle {
    rule: DeltaRule,
}

const EMPTY_TRIGGERS: &str = "{\"triggers\":[]}";

// ============================================================================
// Version and Utility Functions
// ============================================================================

/// Get the library version string
///
/// # Returns
///
/// A null-terminated string containing the version.
/// The returned pointer is valid for the lifetime of the program.
#[no_mangle]
pub extern "C" fn delta_rule_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}

/// Convert a result code to a human-readable string
///
/// # Returns
///
/// A null-terminated string describing the result.
/// The returned pointer is valid for the lifetime of the program.
#[no_mangle]
pub extern "C" fn delta_rule_result_to_string(result: DeltaResult) -> *const c_char {
    let msg: &'static [u8] = match result {
        DeltaResult::Ok => b"Success\0",
        DeltaResult::ErrorNullPointer => b"Null pointer provided\0",
        DeltaResult::ErrorInvalidUtf8 => b"Invalid UTF-8 string\0",
        DeltaResult::ErrorInvalidConfig => b"Invalid configuration\0",
    };
    msg.as_ptr() as *const c_char
}

/// Release a string returned by this library
///
/// # Arguments
///
/// * `s` - String to free. May be NULL (no-op).
#[no_mangle]
pub extern "C" fn delta_rule_string_free(s: *mut c_char) {
    if !s.is_null() {
        unsafe {
            drop(CString::from_raw(s));
        }
    }
}

// ============================================================================
// Plugin Entry Points
// ============================================================================

/// Get the plugin information document
///
/// # Returns
///
/// A JSON string with name, version, type, interface version and default
/// configuration, or NULL on failure. Free with `delta_rule_string_free()`.
#[no_mangle]
pub extern "C" fn delta_rule_info() -> *mut c_char {
    match PluginInfo::current().to_json() {
        Ok(json) => into_c_string(json),
        Err(e) => {
            log::error!("Unable to serialize plugin information: {}", e);
            ptr::null_mut()
        }
    }
}

/// Create a rule from a configuration category
///
/// # Arguments
///
/// * `config` - Configuration category JSON (null-terminated)
///
/// # Returns
///
/// A pointer to a new rule, or NULL if the configuration is missing or
/// invalid. The rule must be freed with `delta_rule_shutdown()`.
///
/// # Example (C)
///
/// ```c
/// DeltaRuleHandle* rule = delta_rule_init("{\"asset\": {\"value\": \"pump\"}}");
/// if (rule == NULL) {
///     // Handle configuration error
/// }
/// // ... evaluate readings ...
/// delta_rule_shutdown(rule);
/// ```
#[no_mangle]
pub extern "C" fn delta_rule_init(config: *const c_char) -> *mut DeltaRuleHandle {
    let config = match read_str(config) {
        Ok(s) => s,
        Err(_) => return ptr::null_mut(),
    };

    match DeltaRule::from_category_json(config) {
        Ok(rule) => Box::into_raw(Box::new(DeltaRuleHandle { rule })),
        Err(e) => {
            log::error!("Delta rule initialisation failed: {}", e);
            ptr::null_mut()
        }
    }
}

/// Free a rule and everything it tracks
///
/// # Arguments
///
/// * `handle` - Rule to free. May be NULL (no-op).
///
/// # Safety
///
/// The handle must not be used after calling this function.
#[no_mangle]
pub extern "C" fn delta_rule_shutdown(handle: *mut DeltaRuleHandle) {
    if !handle.is_null() {
        unsafe {
            drop(Box::from_raw(handle));
        }
    }
}

/// Get the triggers document
///
/// # Returns
///
/// `{"triggers":[{"asset":"<name>"},...]}`, with an empty list when the
/// handle is NULL or no asset is registered. Free with
/// `delta_rule_string_free()`.
#[no_mangle]
pub extern "C" fn delta_rule_triggers(handle: *const DeltaRuleHandle) -> *mut c_char {
    if handle.is_null() {
        return into_c_string(EMPTY_TRIGGERS.to_string());
    }
    let handle = unsafe { &*handle };
    into_c_string(handle.rule.triggers_json())
}

/// Evaluate a batch of readings
///
/// # Arguments
///
/// * `handle` - Rule handle
/// * `readings` - JSON object mapping asset names to datapoint readings
///
/// # Returns
///
/// `true` if the rule triggered. NULL arguments and unparseable readings
/// return `false`.
#[no_mangle]
pub extern "C" fn delta_rule_eval(handle: *const DeltaRuleHandle, readings: *const c_char) -> bool {
    if handle.is_null() {
        return false;
    }
    let readings = match read_str(readings) {
        Ok(s) => s,
        Err(_) => return false,
    };
    let handle = unsafe { &*handle };
    handle.rule.eval(readings)
}

/// Get the reason document for the current notification state
///
/// # Returns
///
/// `{"reason":"triggered"|"cleared","asset":...}`, or NULL if the handle is
/// NULL. Free with `delta_rule_string_free()`.
#[no_mangle]
pub extern "C" fn delta_rule_reason(handle: *const DeltaRuleHandle) -> *mut c_char {
    if handle.is_null() {
        return ptr::null_mut();
    }
    let handle = unsafe { &*handle };
    into_c_string(handle.rule.reason())
}

/// Replace the rule configuration
///
/// # Arguments
///
/// * `handle` - Rule handle
/// * `config` - Configuration category JSON (null-terminated)
///
/// # Returns
///
/// `DELTA_RESULT_OK` on success. On error the previous configuration stays
/// in place.
#[no_mangle]
pub extern "C" fn delta_rule_reconfigure(
    handle: *const DeltaRuleHandle,
    config: *const c_char,
) -> DeltaResult {
    if handle.is_null() {
        return DeltaResult::ErrorNullPointer;
    }
    let config = match read_str(config) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let handle = unsafe { &*handle };

    match handle.rule.reconfigure(config) {
        Ok(()) => DeltaResult::Ok,
        Err(e) => {
            log::warn!("Delta rule reconfiguration rejected: {}", e);
            DeltaResult::ErrorInvalidConfig
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn read_str<'a>(s: *const c_char) -> Result<&'a str, DeltaResult> {
    if s.is_null() {
        return Err(DeltaResult::ErrorNullPointer);
    }
    unsafe { CStr::from_ptr(s) }
        .to_str()
        .map_err(|_| DeltaResult::ErrorInvalidUtf8)
}

fn into_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(c) => c.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn take(s: *mut c_char) -> String {
        assert!(!s.is_null());
        let text = unsafe { CStr::from_ptr(s) }.to_str().unwrap().to_string();
        delta_rule_string_free(s);
        text
    }

    #[test]
    fn test_version() {
        let version = delta_rule_version();
        assert!(!version.is_null());
        let version_str = unsafe { CStr::from_ptr(version) }.to_str().unwrap();
        assert_eq!(version_str, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_result_to_string() {
        let ok_str = delta_rule_result_to_string(DeltaResult::Ok);
        let ok = unsafe { CStr::from_ptr(ok_str) }.to_str().unwrap();
        assert_eq!(ok, "Success");
    }

    #[test]
    fn test_info() {
        let info = take(delta_rule_info());
        assert!(info.contains("\"name\":\"Delta\""));
    }

    #[test]
    fn test_init_null_and_invalid() {
        assert!(delta_rule_init(ptr::null()).is_null());

        let bad = CString::new("{\"asset\": \"\"}").unwrap();
        assert!(delta_rule_init(bad.as_ptr()).is_null());
    }

    #[test]
    fn test_null_handle() {
        assert_eq!(take(delta_rule_triggers(ptr::null())), EMPTY_TRIGGERS);
        assert!(!delta_rule_eval(ptr::null(), ptr::null()));
        assert!(delta_rule_reason(ptr::null()).is_null());
        assert_eq!(
            delta_rule_reconfigure(ptr::null(), ptr::null()),
            DeltaResult::ErrorNullPointer
        );
        // Should not crash
        delta_rule_shutdown(ptr::null_mut());
        delta_rule_string_free(ptr::null_mut());
    }

    #[test]
    fn test_lifecycle() {
        let config = CString::new("{\"asset\": {\"value\": \"pump\"}}").unwrap();
        let handle = delta_rule_init(config.as_ptr());
        assert!(!handle.is_null());

        assert_eq!(
            take(delta_rule_triggers(handle)),
            "{\"triggers\":[{\"asset\":\"pump\"}]}"
        );

        let readings = CString::new("{\"pump\": {\"rpm\": 900}}").unwrap();
        assert!(delta_rule_eval(handle, readings.as_ptr()));
        assert!(!delta_rule_eval(handle, readings.as_ptr()));

        let reason = take(delta_rule_reason(handle));
        assert!(reason.contains("\"cleared\""));

        delta_rule_shutdown(handle);
    }
}
