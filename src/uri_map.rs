//! URI ↔ URID interning shared by the DSP side, the UI side and state
//! (de)serialization.
//!
//! A plain append-only list: URID `n` (1-based) is the URI at index `n - 1`,
//! URID 0 is invalid per LV2 convention. The set is small (dozens to low
//! hundreds of URIs per plugin) and string lookups only happen off the audio
//! thread, so a linear scan beats carrying a hash map.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use parking_lot::Mutex;

use crate::lv2::{LV2Urid, LV2UridMap, LV2UridMapHandle, LV2UridUnmap, LV2UridUnmapHandle};

/// Process-lifetime URI interner. One instance per bridge, shared with the
/// plugin and its UI through the `urid:map`/`urid:unmap` features.
pub struct UriMap {
    /// Interned URIs, never removed or reordered. Entries are `CString`s so
    /// `unmap` can hand out NUL-terminated pointers; the heap buffers stay
    /// put when the vector grows.
    uris: Mutex<Vec<CString>>,
}

impl UriMap {
    /// Create an empty map.
    pub fn new() -> UriMap {
        UriMap {
            uris: Mutex::new(Vec::new()),
        }
    }

    /// Map `uri` to its URID, interning it on first sight. Never returns 0
    /// for a valid URI. Allocates; must not be called from the audio thread.
    pub fn map(&self, uri: &str) -> LV2Urid {
        let mut uris = self.uris.lock();
        for (i, known) in uris.iter().enumerate() {
            if known.as_bytes() == uri.as_bytes() {
                return (i + 1) as LV2Urid;
            }
        }
        match CString::new(uri) {
            Ok(s) => {
                uris.push(s);
                uris.len() as LV2Urid
            }
            Err(_) => 0,
        }
    }

    /// Reverse-map a URID. Returns `None` for 0 and out-of-range ids.
    ///
    /// The returned reference stays valid for the lifetime of the map:
    /// entries are append-only and a `CString`'s buffer does not move when
    /// the index vector reallocates.
    pub fn unmap(&self, urid: LV2Urid) -> Option<&CStr> {
        let uris = self.uris.lock();
        let entry = uris.get((urid as usize).checked_sub(1)?)?;
        let ptr = entry.as_ptr();
        drop(uris);
        Some(unsafe { CStr::from_ptr(ptr) })
    }

    /// Number of interned URIs.
    pub fn len(&self) -> usize {
        self.uris.lock().len()
    }

    /// Whether no URI has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build the `urid:map` feature payload pointing at this map. The caller
    /// must keep `self` (and the returned struct) alive for as long as any
    /// plugin holds the feature.
    pub fn as_urid_map(&self) -> LV2UridMap {
        LV2UridMap {
            handle: self as *const UriMap as LV2UridMapHandle,
            map: map_callback,
        }
    }

    /// Build the `urid:unmap` feature payload pointing at this map.
    pub fn as_urid_unmap(&self) -> LV2UridUnmap {
        LV2UridUnmap {
            handle: self as *const UriMap as LV2UridUnmapHandle,
            unmap: unmap_callback,
        }
    }
}

impl Default for UriMap {
    fn default() -> Self {
        UriMap::new()
    }
}

extern "C" fn map_callback(handle: LV2UridMapHandle, uri: *const c_char) -> LV2Urid {
    if handle.is_null() || uri.is_null() {
        return 0;
    }
    let map = unsafe { &*(handle as *const UriMap) };
    match unsafe { CStr::from_ptr(uri) }.to_str() {
        Ok(s) => map.map(s),
        Err(_) => 0,
    }
}

extern "C" fn unmap_callback(handle: LV2UridUnmapHandle, urid: LV2Urid) -> *const c_char {
    if handle.is_null() {
        return std::ptr::null();
    }
    let map = unsafe { &*(handle as *const UriMap) };
    match map.unmap(urid) {
        Some(uri) => uri.as_ptr(),
        None => {
            log::warn!("invalid URID lookup: {}", urid);
            std::ptr::null()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_is_idempotent() {
        let map = UriMap::new();
        let a = map.map("http://example.org/a");
        let b = map.map("http://example.org/b");
        assert_ne!(a, 0);
        assert_ne!(a, b);
        assert_eq!(map.map("http://example.org/a"), a);
        assert_eq!(map.map("http://example.org/b"), b);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn ids_are_monotonic_from_one() {
        let map = UriMap::new();
        for i in 1..=100u32 {
            assert_eq!(map.map(&format!("urn:test:{}", i)), i);
        }
    }

    #[test]
    fn unmap_round_trips() {
        let map = UriMap::new();
        let id = map.map("urn:test:amp");
        assert_eq!(map.unmap(id).unwrap().to_str().unwrap(), "urn:test:amp");
        assert!(map.unmap(0).is_none());
        assert!(map.unmap(id + 1).is_none());
    }

    #[test]
    fn c_callbacks_agree_with_rust_api() {
        let map = UriMap::new();
        let f = map.as_urid_map();
        let uri = std::ffi::CString::new("urn:test:cb").unwrap();
        let id = (f.map)(f.handle, uri.as_ptr());
        assert_eq!(id, map.map("urn:test:cb"));

        let u = map.as_urid_unmap();
        let back = (u.unmap)(u.handle, id);
        assert!(!back.is_null());
        assert_eq!(
            unsafe { CStr::from_ptr(back) }.to_str().unwrap(),
            "urn:test:cb"
        );
        assert!((u.unmap)(u.handle, 0).is_null());
    }
}
