//! VST chunk ↔ LV2 state translation.
//!
//! The chunk is a compact binary blob: a header with the property and
//! port-value counts, the plugin's `state:interface` properties (keys and
//! types written out as length-prefixed URI strings so the blob survives a
//! process with a differently-populated URID map), then one record per
//! control input port. All 32 bit framing fields are big-endian; the four
//! raw float bytes of a port value are host order, a wire format kept for
//! compatibility with existing saves.

use std::os::raw::c_void;

use log::warn;

use crate::lv2::{LV2_STATE_IS_POD, LV2_STATE_SUCCESS};
use crate::uri_map::UriMap;

/// One `state:interface` property, keyed and typed by URID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Property {
    /// Key URID.
    pub key: u32,
    /// Value type URID.
    pub type_: u32,
    /// `LV2_State_Flags` of the stored value.
    pub flags: u32,
    /// Opaque value bytes.
    pub value: Vec<u8>,
}

/// One control port value, identified by port symbol.
#[derive(Clone, Debug, PartialEq)]
pub struct PortValue {
    /// Current value of the port.
    pub value: f32,
    /// The port's stable symbol.
    pub symbol: String,
}

/// Everything a chunk carries.
#[derive(Clone, Debug, Default)]
pub struct StateData {
    /// Plugin properties collected through the store callback.
    pub props: Vec<Property>,
    /// Control input port values.
    pub values: Vec<PortValue>,
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_string(out: &mut Vec<u8>, s: &str) {
    put_u32(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

/// Serialize to the chunk wire format. Property keys/types that cannot be
/// unmapped are written as empty strings (and warned about); they will not
/// match anything on restore.
pub fn serialize(state: &StateData, map: &UriMap) -> Vec<u8> {
    let unmap = |urid: u32| -> String {
        match map.unmap(urid).and_then(|s| s.to_str().ok()) {
            Some(s) => s.to_string(),
            None => {
                warn!("cannot unmap URID {} while saving state", urid);
                String::new()
            }
        }
    };

    let mut out = Vec::new();
    put_u32(&mut out, state.props.len() as u32);
    put_u32(&mut out, state.values.len() as u32);

    for p in &state.props {
        put_string(&mut out, &unmap(p.key));
        put_string(&mut out, &unmap(p.type_));
        put_u32(&mut out, p.flags);
        put_u32(&mut out, p.value.len() as u32);
        out.extend_from_slice(&p.value);
    }
    for v in &state.values {
        out.extend_from_slice(&v.value.to_ne_bytes());
        put_string(&mut out, &v.symbol);
    }
    out
}

struct Reader<'a> {
    data: &'a [u8],
    at: usize,
}

impl<'a> Reader<'a> {
    fn u32(&mut self) -> Option<u32> {
        let bytes = self.data.get(self.at..self.at + 4)?;
        self.at += 4;
        Some(u32::from_be_bytes(bytes.try_into().unwrap()))
    }

    fn f32_raw(&mut self) -> Option<f32> {
        let bytes = self.data.get(self.at..self.at + 4)?;
        self.at += 4;
        Some(f32::from_ne_bytes(bytes.try_into().unwrap()))
    }

    fn string(&mut self) -> Option<String> {
        let len = self.u32()? as usize;
        let bytes = self.data.get(self.at..self.at + len)?;
        self.at += len;
        String::from_utf8(bytes.to_vec()).ok()
    }

    fn bytes(&mut self, len: usize) -> Option<Vec<u8>> {
        let bytes = self.data.get(self.at..self.at + len)?;
        self.at += len;
        Some(bytes.to_vec())
    }
}

/// Parse a chunk. Returns `None` on any short or malformed input, leaving
/// it to the caller to keep the current plugin state untouched.
pub fn unserialize(data: &[u8], map: &UriMap) -> Option<StateData> {
    let mut r = Reader { data, at: 0 };
    let n_props = r.u32()?;
    let n_values = r.u32()?;

    let mut state = StateData::default();
    for _ in 0..n_props {
        let key = r.string()?;
        let type_ = r.string()?;
        let flags = r.u32()?;
        let size = r.u32()? as usize;
        let value = r.bytes(size)?;
        state.props.push(Property {
            key: map.map(&key),
            type_: map.map(&type_),
            flags,
            value,
        });
    }
    for _ in 0..n_values {
        let value = r.f32_raw()?;
        let symbol = r.string()?;
        state.values.push(PortValue { value, symbol });
    }
    Some(state)
}

/// `LV2_State_Store_Function` handed to the plugin's `save`; `handle` is a
/// `StateData`. Values are always copied (non-POD values are only valid for
/// the duration of the call anyway).
pub unsafe extern "C" fn store_callback(
    handle: *mut c_void,
    key: u32,
    value: *const c_void,
    size: usize,
    type_: u32,
    flags: u32,
) -> u32 {
    let state = &mut *(handle as *mut StateData);
    let value = if value.is_null() || size == 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(value as *const u8, size).to_vec()
    };
    if flags & LV2_STATE_IS_POD == 0 {
        warn!("storing non-POD state property {} by copy", key);
    }
    state.props.push(Property {
        key,
        type_,
        flags,
        value,
    });
    LV2_STATE_SUCCESS
}

/// `LV2_State_Retrieve_Function` handed to the plugin's `restore`; `handle`
/// is a `StateData`.
pub unsafe extern "C" fn retrieve_callback(
    handle: *mut c_void,
    key: u32,
    size: *mut usize,
    type_: *mut u32,
    flags: *mut u32,
) -> *const c_void {
    let state = &*(handle as *const StateData);
    for p in &state.props {
        if p.key == key {
            if !size.is_null() {
                *size = p.value.len();
            }
            if !type_.is_null() {
                *type_ = p.type_;
            }
            if !flags.is_null() {
                *flags = p.flags;
            }
            return p.value.as_ptr() as *const c_void;
        }
    }
    std::ptr::null()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state(map: &UriMap) -> StateData {
        StateData {
            props: vec![
                Property {
                    key: map.map("urn:test:prop-a"),
                    type_: map.map("http://lv2plug.in/ns/ext/atom#Int"),
                    flags: LV2_STATE_IS_POD,
                    value: vec![1, 2, 3, 4],
                },
                Property {
                    key: map.map("urn:test:prop-b"),
                    type_: map.map("http://lv2plug.in/ns/ext/atom#Chunk"),
                    flags: LV2_STATE_IS_POD,
                    value: b"opaque".to_vec(),
                },
            ],
            values: vec![
                PortValue {
                    value: 0.5,
                    symbol: "gain".to_string(),
                },
                PortValue {
                    value: 1.0,
                    symbol: "mix".to_string(),
                },
                PortValue {
                    value: -3.0,
                    symbol: "trim".to_string(),
                },
            ],
        }
    }

    #[test]
    fn chunk_round_trips() {
        let map = UriMap::new();
        let state = sample_state(&map);
        let blob = serialize(&state, &map);

        // restore into a fresh URID universe, as a host reload would
        let map2 = UriMap::new();
        let restored = unserialize(&blob, &map2).unwrap();

        assert_eq!(restored.values, state.values);
        assert_eq!(restored.props.len(), 2);
        for (a, b) in restored.props.iter().zip(state.props.iter()) {
            assert_eq!(a.flags, b.flags);
            assert_eq!(a.value, b.value);
            assert_eq!(map2.unmap(a.key).unwrap(), map.unmap(b.key).unwrap());
            assert_eq!(map2.unmap(a.type_).unwrap(), map.unmap(b.type_).unwrap());
        }
    }

    #[test]
    fn header_counts_are_big_endian() {
        let map = UriMap::new();
        let state = sample_state(&map);
        let blob = serialize(&state, &map);
        assert_eq!(&blob[0..4], &[0, 0, 0, 2]);
        assert_eq!(&blob[4..8], &[0, 0, 0, 3]);
    }

    #[test]
    fn truncated_chunks_are_rejected() {
        let map = UriMap::new();
        let state = sample_state(&map);
        let blob = serialize(&state, &map);

        assert!(unserialize(&[], &map).is_none());
        assert!(unserialize(&blob[..6], &map).is_none());
        for cut in [9, blob.len() / 2, blob.len() - 1] {
            assert!(unserialize(&blob[..cut], &map).is_none(), "cut {}", cut);
        }
    }

    #[test]
    fn malformed_length_is_rejected() {
        let map = UriMap::new();
        let mut blob = serialize(&sample_state(&map), &map);
        // corrupt the first string length into something far past the end
        blob[8] = 0xff;
        assert!(unserialize(&blob, &map).is_none());
    }

    #[test]
    fn retrieve_finds_stored_properties() {
        let map = UriMap::new();
        let mut state = StateData::default();
        let key = map.map("urn:test:k");
        let type_ = map.map("urn:test:t");

        let payload = [9u8, 8, 7];
        unsafe {
            store_callback(
                &mut state as *mut StateData as *mut c_void,
                key,
                payload.as_ptr() as *const c_void,
                payload.len(),
                type_,
                LV2_STATE_IS_POD,
            );
        }
        assert_eq!(state.props.len(), 1);

        let mut size = 0usize;
        let mut t = 0u32;
        let mut flags = 0u32;
        let ptr = unsafe {
            retrieve_callback(
                &mut state as *mut StateData as *mut c_void,
                key,
                &mut size,
                &mut t,
                &mut flags,
            )
        };
        assert!(!ptr.is_null());
        assert_eq!(size, 3);
        assert_eq!(t, type_);
        assert_eq!(flags, LV2_STATE_IS_POD);
        let got = unsafe { std::slice::from_raw_parts(ptr as *const u8, size) };
        assert_eq!(got, &payload);

        let missing = unsafe {
            retrieve_callback(
                &mut state as *mut StateData as *mut c_void,
                key + 100,
                &mut size,
                &mut t,
                &mut flags,
            )
        };
        assert!(missing.is_null());
    }
}
