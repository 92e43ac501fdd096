//! The VST entry point: configuration discovery, shell-or-single decision
//! and `AEffect` construction.
//!
//! Three optional files next to the plugin binary steer what gets exposed:
//!
//! * `.bundle` — one bundle directory per line, relative to the binary;
//!   absent means "scan the system-wide LV2 world";
//! * `.whitelist` — one URI prefix per line; a single entry selects exactly
//!   one plugin and skips the shell;
//! * `.blacklist` — one URI prefix per line, rejected during enumeration.

use std::os::raw::c_void;
use std::path::PathBuf;
use std::ptr;

use log::{debug, warn};

use crate::api::consts::VST_MAGIC;
use crate::api::{AEffect, HostCallbackProc};
use crate::bridge::Bridge;
use crate::descriptor::{uri_to_id, Resolver};
use crate::host::HostCallback;
use crate::interfaces;
use crate::plugin::Effect;
use crate::shell::Shell;

/// The exported VST 2.4 entry point.
#[allow(non_snake_case)]
#[no_mangle]
pub extern "C" fn VSTPluginMain(callback: HostCallbackProc) -> *mut AEffect {
    main(callback)
}

/// Alias some old macOS hosts look up instead of `VSTPluginMain`.
#[cfg(target_os = "macos")]
#[no_mangle]
pub extern "C" fn main_macho(callback: HostCallbackProc) -> *mut AEffect {
    main(callback)
}

/// Alias some old Windows hosts look up instead of `VSTPluginMain`.
#[cfg(target_os = "windows")]
#[allow(non_snake_case)]
#[no_mangle]
pub extern "C" fn MAIN(callback: HostCallbackProc) -> *mut AEffect {
    main(callback)
}

/// Initializes the bridge and returns a raw pointer to an `AEffect`, or
/// null when no plugin can be exposed to this host.
#[doc(hidden)]
pub fn main(callback: HostCallbackProc) -> *mut AEffect {
    init_logging();

    // Initialize the AEffect with all function pointers before anything can
    // call back into it.
    let effect = Box::into_raw(Box::new(AEffect {
        magic: VST_MAGIC,
        dispatcher: interfaces::dispatch,

        _process: interfaces::process_deprecated,

        setParameter: interfaces::set_parameter,
        getParameter: interfaces::get_parameter,

        numPrograms: 0,
        numParams: 0,
        numInputs: 0,
        numOutputs: 0,

        flags: 0,

        reserved1: 0,
        reserved2: 0,

        initialDelay: 0,

        _realQualities: 0,
        _offQualities: 0,
        _ioRatio: 0.0,

        object: ptr::null_mut(),
        user: ptr::null_mut(),

        uniqueId: 0,
        version: 0,

        processReplacing: interfaces::process_replacing,
        processReplacingF64: interfaces::process_replacing_f64,

        future: [0u8; 56],
    }));

    let host = HostCallback::wrap(callback, effect);
    if host.vst_version() == 0 {
        // pre-VST-2 host
        unsafe { drop(Box::from_raw(effect)) };
        return ptr::null_mut();
    }

    let object = match instantiate(host) {
        Some(object) => object,
        None => {
            unsafe { drop(Box::from_raw(effect)) };
            return ptr::null_mut();
        }
    };

    unsafe {
        let e = &mut *effect;
        e.numParams = object.num_params();
        e.numInputs = object.num_inputs();
        e.numOutputs = object.num_outputs();
        e.uniqueId = object.unique_id();
        e.version = object.version();
        e.flags = object.flags().bits();
        e.object = Box::into_raw(Box::new(object)) as *mut c_void;
    }

    effect
}

/// Decide what this binary exposes to the calling host: a single bridge, or
/// the shell enumerator.
fn instantiate(host: HostCallback) -> Option<Box<dyn Effect>> {
    let dir = module_dir();
    let (bundles, whitelist) = match &dir {
        Some(dir) => {
            let bundles: Vec<PathBuf> = load_lines(dir.join(".bundle"))
                .into_iter()
                .map(|line| dir.join(line))
                .collect();
            (bundles, load_lines(dir.join(".whitelist")))
        }
        None => (Vec::new(), Vec::new()),
    };

    let mut id: u32 = 0;
    if whitelist.len() == 1 {
        id = uri_to_id(&whitelist[0]);
        debug!("single whitelisted plugin '{}' -> {:08x}", whitelist[0], id);
    }

    if id == 0 {
        if host.can_do("shellCategory") == 0 {
            warn!("host does not support shell plugins and no plugin is whitelisted");
            return None;
        }
        id = host.current_id() as i32 as u32;
    }

    if id == 0 {
        let blacklist = dir
            .map(|dir| load_lines(dir.join(".blacklist")))
            .unwrap_or_default();
        return Some(Box::new(Shell::new(&bundles, whitelist, blacklist)));
    }

    let resolver = Resolver::new(&bundles);
    let desc = match resolver.resolve_by_id(id) {
        Ok(desc) => desc,
        Err(e) => {
            warn!("cannot resolve plugin {:08x}: {}", id, e);
            return None;
        }
    };
    debug!(
        "VST-ID {:08x}: '{}' from {}",
        desc.id,
        desc.dsp_uri,
        desc.dsp_path.display()
    );
    match Bridge::new(host, desc) {
        Ok(bridge) => Some(Box::new(bridge)),
        Err(e) => {
            warn!("instantiation failed: {}", e);
            None
        }
    }
}

fn init_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("warn"),
        )
        .try_init();
    });
}

/// Non-empty lines of a config file; missing files read as empty.
fn load_lines(path: PathBuf) -> Vec<String> {
    match std::fs::read_to_string(&path) {
        Ok(content) => parse_lines(&content),
        Err(_) => Vec::new(),
    }
}

fn parse_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|l| l.trim_end_matches('\r').trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Directory of the shared object this code was loaded from; used to
/// resolve the dotfiles and relative bundle paths.
#[cfg(unix)]
fn module_dir() -> Option<PathBuf> {
    use std::ffi::CStr;

    let f: crate::api::PluginMain = VSTPluginMain;
    let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
    if unsafe { libc::dladdr(f as *const c_void, &mut info) } == 0 || info.dli_fname.is_null() {
        return None;
    }
    let path = unsafe { CStr::from_ptr(info.dli_fname) }.to_str().ok()?;
    std::path::Path::new(path).parent().map(|p| p.to_path_buf())
}

#[cfg(not(unix))]
fn module_dir() -> Option<PathBuf> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::AEffect;

    extern "C" fn fail_callback(
        _effect: *mut AEffect,
        _opcode: i32,
        _index: i32,
        _value: isize,
        _ptr: *mut c_void,
        _opt: f32,
    ) -> isize {
        0
    }

    #[test]
    fn old_hosts_get_no_effect() {
        assert_eq!(VSTPluginMain(fail_callback), ptr::null_mut());
    }

    #[test]
    fn config_lines_are_trimmed_and_filtered() {
        let lines = parse_lines("urn:test:a\r\n\n  \nurn:test:b\n");
        assert_eq!(lines, vec!["urn:test:a".to_string(), "urn:test:b".to_string()]);
        assert!(parse_lines("").is_empty());
    }
}
