//! C ABI exported to the orchestrator's plugin loader.
//!
//! Strings crossing the boundary are NUL-terminated UTF-8. Every string
//! returned here is allocated by the plugin and must be released with
//! [`FreeString`].

#![allow(non_snake_case)]

use std::ffi::{c_char, CStr, CString};

use crate::error::ERROR_MARKER;
use crate::{logging, plugin};

/// Build the command line for one module.
///
/// Returns either the command line or an `ERROR: ` prefixed message.
///
/// # Safety
/// `module` and `recipe` must be null or point to NUL-terminated strings
/// that stay valid for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn BuildModule(module: *const c_char, recipe: *const c_char) -> *mut c_char {
    logging::init();

    let response = match (read_arg(module, "module"), read_arg(recipe, "recipe")) {
        (Ok(module), Ok(recipe)) => plugin::build_module(module, recipe),
        (Err(msg), _) | (_, Err(msg)) => format!("{}{}", ERROR_MARKER, msg),
    };
    into_raw(response)
}

/// Plugin metadata as JSON.
#[no_mangle]
pub extern "C" fn PlugInfo() -> *mut c_char {
    into_raw(plugin::plugin_info().to_json())
}

/// Release a string returned by this plugin.
///
/// # Safety
/// `s` must be null or a pointer previously returned by [`BuildModule`] or
/// [`PlugInfo`] that has not been freed yet.
#[no_mangle]
pub unsafe extern "C" fn FreeString(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

unsafe fn read_arg<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, String> {
    if ptr.is_null() {
        return Err(format!("{} payload is null", what));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|e| format!("{} payload is not valid UTF-8: {}", what, e))
}

fn into_raw(s: String) -> *mut c_char {
    let c = CString::new(s).unwrap_or_else(|_| {
        CString::new(format!("{}response contains a NUL byte", ERROR_MARKER))
            .unwrap_or_default()
    });
    c.into_raw()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    fn take(raw: *mut c_char) -> String {
        assert!(!raw.is_null());
        let s = unsafe { CStr::from_ptr(raw) }.to_str().unwrap().to_string();
        unsafe { FreeString(raw) };
        s
    }

    #[test]
    fn test_plug_info() {
        let info = take(PlugInfo());
        assert!(info.contains(r#""name":"fsguard""#));
    }

    #[test]
    fn test_null_payload() {
        let recipe = CString::new("{}").unwrap();
        let out = take(unsafe { BuildModule(ptr::null(), recipe.as_ptr()) });
        assert_eq!(out, "ERROR: module payload is null");
    }

    #[test]
    fn test_invalid_utf8_payload() {
        let module = CString::new(vec![0xff, 0xfe]).unwrap();
        let recipe = CString::new("{}").unwrap();
        let out = take(unsafe { BuildModule(module.as_ptr(), recipe.as_ptr()) });
        assert!(out.starts_with("ERROR: module payload is not valid UTF-8"));
    }

    #[test]
    fn test_config_error_crosses_boundary() {
        let module = CString::new(
            r#"{"name":"m1","type":"fsguard","fsGuardLocation":"/out","generateKey":false,"keyPath":" "}"#,
        )
        .unwrap();
        let recipe = CString::new(r#"{"downloadsPath":"/d","sourcesPath":"/s"}"#).unwrap();
        let out = take(unsafe { BuildModule(module.as_ptr(), recipe.as_ptr()) });
        assert_eq!(
            out,
            "ERROR: Keypath not specified and GenerateKey set to false. Cannot proceed"
        );
    }

    #[test]
    fn test_nul_in_response_is_reported() {
        let out = take(into_raw("a\0b".to_string()));
        assert_eq!(out, "ERROR: response contains a NUL byte");
    }

    #[test]
    fn test_free_null_is_noop() {
        unsafe { FreeString(ptr::null_mut()) };
    }
}
