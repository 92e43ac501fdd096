//! Atom sequence buffers and the little forge that writes transport
//! positions.
//!
//! The bridge owns one input and one output sequence per instance, connected
//! to the plugin's atom/MIDI ports once at init. Everything here works on
//! raw bytes over an 8-byte aligned backing store; events inside a sequence
//! are padded to 8 bytes as the atom spec requires.

use std::os::raw::c_void;

use crate::api::{TimeInfo, TimeInfoFlags};
use crate::lv2::{Lv2AtomEvent, Lv2AtomSequence};
use crate::uri_map::UriMap;

/// Size of the `Lv2Atom` header.
pub const ATOM_HEADER: usize = 8;
/// Size of an event header: 8 byte timestamp + atom header.
pub const EVENT_HEADER: usize = 16;

/// Round an atom body size up to the sequence alignment.
#[inline]
pub fn pad(size: usize) -> usize {
    (size + 7) & !7
}

/// The URIDs the real-time path needs, interned once at bridge init so the
/// audio thread never touches the map.
#[allow(missing_docs)]
#[derive(Clone, Copy, Default)]
pub struct Urids {
    pub midi_event: u32,
    pub atom_sequence: u32,
    pub atom_event_transfer: u32,
    pub atom_object: u32,
    pub atom_float: u32,
    pub atom_int: u32,
    pub atom_long: u32,
    pub time_position: u32,
    pub time_frame: u32,
    pub time_speed: u32,
    pub time_bar: u32,
    pub time_bar_beat: u32,
    pub time_beat_unit: u32,
    pub time_beats_per_bar: u32,
    pub time_beats_per_minute: u32,
}

impl Urids {
    /// Intern the event vocabulary.
    pub fn map(map: &UriMap) -> Urids {
        use crate::lv2::uri;
        Urids {
            midi_event: map.map(uri::MIDI_EVENT),
            atom_sequence: map.map(uri::ATOM_SEQUENCE),
            atom_event_transfer: map.map(uri::ATOM_EVENT_TRANSFER),
            atom_object: map.map(uri::ATOM_OBJECT),
            atom_float: map.map(uri::ATOM_FLOAT),
            atom_int: map.map(uri::ATOM_INT),
            atom_long: map.map(uri::ATOM_LONG),
            time_position: map.map(uri::TIME_POSITION),
            time_frame: map.map(uri::TIME_FRAME),
            time_speed: map.map(uri::TIME_SPEED),
            time_bar: map.map(uri::TIME_BAR),
            time_bar_beat: map.map(uri::TIME_BAR_BEAT),
            time_beat_unit: map.map(uri::TIME_BEAT_UNIT),
            time_beats_per_bar: map.map(uri::TIME_BEATS_PER_BAR),
            time_beats_per_minute: map.map(uri::TIME_BEATS_PER_MINUTE),
        }
    }
}

/// A heap buffer holding one `Lv2AtomSequence`, aligned for the 64 bit event
/// timestamps the plugin reads out of it.
pub struct SequenceBuffer {
    buf: Box<[u64]>,
    capacity: usize,
}

impl SequenceBuffer {
    /// Allocate a sequence buffer of at least `bytes` bytes (header
    /// included).
    pub fn new(bytes: usize) -> SequenceBuffer {
        let words = pad(bytes.max(EVENT_HEADER)) / 8;
        SequenceBuffer {
            buf: vec![0u64; words].into_boxed_slice(),
            capacity: words * 8,
        }
    }

    /// Total byte capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pointer handed to `connect_port`.
    pub fn as_connect_ptr(&mut self) -> *mut c_void {
        self.buf.as_mut_ptr() as *mut c_void
    }

    fn seq(&self) -> &Lv2AtomSequence {
        unsafe { &*(self.buf.as_ptr() as *const Lv2AtomSequence) }
    }

    fn seq_mut(&mut self) -> &mut Lv2AtomSequence {
        unsafe { &mut *(self.buf.as_mut_ptr() as *mut Lv2AtomSequence) }
    }

    /// Raw view of the whole backing store.
    pub fn raw(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.buf.as_ptr() as *const u8, self.capacity) }
    }

    /// Mutable raw view, for refilling from a ring.
    pub fn raw_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.buf.as_mut_ptr() as *mut u8, self.capacity) }
    }

    /// Body size as advertised in the atom header.
    pub fn payload_size(&self) -> u32 {
        self.seq().atom.size
    }

    /// Bytes occupied by the sequence: atom header plus body.
    pub fn total_size(&self) -> usize {
        ATOM_HEADER + self.seq().atom.size as usize
    }

    /// Begin an empty input sequence: type `atom:Sequence`, body is just the
    /// sequence body header.
    pub fn reset_input(&mut self, sequence_urid: u32) {
        let seq = self.seq_mut();
        seq.atom.size = ATOM_HEADER as u32;
        seq.atom.type_ = sequence_urid;
        seq.body.unit = 0;
        seq.body.pad = 0;
    }

    /// Prepare the output sequence: a typeless chunk advertising the whole
    /// writable capacity to the plugin.
    pub fn reset_output(&mut self) {
        let cap = (self.capacity - ATOM_HEADER) as u32;
        let seq = self.seq_mut();
        seq.atom.size = cap;
        seq.atom.type_ = 0;
    }

    /// Whether the body holds any event beyond the sequence body header.
    pub fn has_events(&self) -> bool {
        self.seq().atom.size as usize > ATOM_HEADER
    }

    /// Append one event. Returns false (leaving the sequence untouched) when
    /// it does not fit in `limit` bytes of sequence body.
    pub fn append_event(&mut self, frames: i64, type_: u32, data: &[u8], limit: usize) -> bool {
        let used = self.seq().atom.size as usize;
        let needed = pad(EVENT_HEADER + data.len());
        if used + needed > limit.min(self.capacity - ATOM_HEADER) {
            return false;
        }

        let offset = ATOM_HEADER + used;
        {
            let raw = self.raw_mut();
            raw[offset..offset + 8].copy_from_slice(&frames.to_ne_bytes());
            raw[offset + 8..offset + 12].copy_from_slice(&(data.len() as u32).to_ne_bytes());
            raw[offset + 12..offset + 16].copy_from_slice(&type_.to_ne_bytes());
            raw[offset + 16..offset + 16 + data.len()].copy_from_slice(data);
            let end = offset + 16 + data.len();
            let padded_end = offset + needed;
            raw[end..padded_end].fill(0);
        }
        self.seq_mut().atom.size = (used + needed) as u32;
        true
    }

    /// Append an event whose payload is already a complete atom (header and
    /// body), e.g. one forwarded verbatim from the UI. Returns false when it
    /// does not fit in `limit` bytes of sequence body.
    pub fn append_raw_event(&mut self, frames: i64, atom_bytes: &[u8], limit: usize) -> bool {
        if atom_bytes.len() < ATOM_HEADER {
            return false;
        }
        let used = self.seq().atom.size as usize;
        let needed = pad(8 + atom_bytes.len());
        if used + needed > limit.min(self.capacity - ATOM_HEADER) {
            return false;
        }

        let offset = ATOM_HEADER + used;
        {
            let raw = self.raw_mut();
            raw[offset..offset + 8].copy_from_slice(&frames.to_ne_bytes());
            raw[offset + 8..offset + 8 + atom_bytes.len()].copy_from_slice(atom_bytes);
            let end = offset + 8 + atom_bytes.len();
            raw[end..offset + needed].fill(0);
        }
        self.seq_mut().atom.size = (used + needed) as u32;
        true
    }

    /// Iterate the events of the sequence body.
    pub fn events(&self) -> SequenceIter<'_> {
        SequenceIter {
            raw: self.raw(),
            offset: EVENT_HEADER,
            end: self.total_size().min(self.capacity),
        }
    }
}

/// Iterator over `(event, payload)` pairs of a sequence.
pub struct SequenceIter<'a> {
    raw: &'a [u8],
    offset: usize,
    end: usize,
}

impl<'a> Iterator for SequenceIter<'a> {
    type Item = (Lv2AtomEvent, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset + EVENT_HEADER > self.end {
            return None;
        }
        let ev = unsafe { *(self.raw[self.offset..].as_ptr() as *const Lv2AtomEvent) };
        let data_start = self.offset + EVENT_HEADER;
        let data_end = data_start + ev.body.size as usize;
        if data_end > self.end {
            return None;
        }
        self.offset += pad(EVENT_HEADER + ev.body.size as usize);
        Some((ev, &self.raw[data_start..data_end]))
    }
}

/// MIDI wire length implied by a status byte: most messages are 3 bytes,
/// program change / channel pressure / MTC quarter frame / song select are
/// 2, and system real-time messages are 1.
pub fn midi_wire_size(status: u8) -> usize {
    match status {
        0xc0..=0xdf => 2,
        0xf1 | 0xf3 => 2,
        0xf8 | 0xfa | 0xfb | 0xfe | 0xff => 1,
        _ => 3,
    }
}

fn put(buf: &mut [u8], at: &mut usize, bytes: &[u8]) {
    buf[*at..*at + bytes.len()].copy_from_slice(bytes);
    *at += bytes.len();
}

fn put_prop_head(buf: &mut [u8], at: &mut usize, key: u32) {
    put(buf, at, &key.to_ne_bytes());
    put(buf, at, &0u32.to_ne_bytes()); // context
}

fn put_long(buf: &mut [u8], at: &mut usize, urid: u32, v: i64) {
    put(buf, at, &8u32.to_ne_bytes());
    put(buf, at, &urid.to_ne_bytes());
    put(buf, at, &v.to_ne_bytes());
}

fn put_float(buf: &mut [u8], at: &mut usize, urid: u32, v: f32) {
    put(buf, at, &4u32.to_ne_bytes());
    put(buf, at, &urid.to_ne_bytes());
    put(buf, at, &v.to_ne_bytes());
    put(buf, at, &0u32.to_ne_bytes()); // pad to 8
}

fn put_int(buf: &mut [u8], at: &mut usize, urid: u32, v: i32) {
    put(buf, at, &4u32.to_ne_bytes());
    put(buf, at, &urid.to_ne_bytes());
    put(buf, at, &v.to_ne_bytes());
    put(buf, at, &0u32.to_ne_bytes()); // pad to 8
}

/// Forge a `time:Position` object atom into `out`, returning its total size
/// (header + body).
///
/// Always writes `frame` and `speed`; bar/beat/tempo properties are added
/// only when the host flagged both the musical position and the bar start as
/// valid.
pub fn forge_position(out: &mut [u8; 256], urids: &Urids, ti: &TimeInfo) -> usize {
    let flags = TimeInfoFlags::from_bits_truncate(ti.flags);
    let rolling = flags.contains(TimeInfoFlags::TRANSPORT_PLAYING);

    let mut at = ATOM_HEADER;
    // LV2_Atom_Object_Body
    put(out, &mut at, &1u32.to_ne_bytes()); // id
    put(out, &mut at, &urids.time_position.to_ne_bytes()); // otype

    put_prop_head(out, &mut at, urids.time_frame);
    put_long(out, &mut at, urids.atom_long, ti.sample_pos.floor() as i64);
    put_prop_head(out, &mut at, urids.time_speed);
    put_float(out, &mut at, urids.atom_float, if rolling { 1.0 } else { 0.0 });

    let have_bbt = flags.contains(TimeInfoFlags::PPQ_POS_VALID | TimeInfoFlags::BARS_VALID);
    if have_bbt {
        let ppq_scaling = ti.time_sig_denominator as f64 / 4.0;
        let bar_beat = (ti.ppq_pos - ti.bar_start_pos) / ppq_scaling;
        let bar = (ti.bar_start_pos / ti.time_sig_numerator as f64 / ppq_scaling).floor() as i64;

        put_prop_head(out, &mut at, urids.time_bar_beat);
        put_float(out, &mut at, urids.atom_float, bar_beat as f32);
        put_prop_head(out, &mut at, urids.time_bar);
        put_long(out, &mut at, urids.atom_long, bar);
        put_prop_head(out, &mut at, urids.time_beat_unit);
        put_int(out, &mut at, urids.atom_int, ti.time_sig_denominator);
        put_prop_head(out, &mut at, urids.time_beats_per_bar);
        put_float(out, &mut at, urids.atom_float, ti.time_sig_numerator as f32);
        put_prop_head(out, &mut at, urids.time_beats_per_minute);
        put_float(out, &mut at, urids.atom_float, ti.tempo as f32);
    }

    // fill in the object header
    let body = (at - ATOM_HEADER) as u32;
    out[0..4].copy_from_slice(&body.to_ne_bytes());
    out[4..8].copy_from_slice(&urids.atom_object.to_ne_bytes());
    at
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_urids() -> Urids {
        let map = UriMap::new();
        Urids::map(&map)
    }

    #[test]
    fn fresh_input_sequence_is_empty() {
        let mut seq = SequenceBuffer::new(1024);
        seq.reset_input(42);
        assert_eq!(seq.payload_size(), 8);
        assert!(!seq.has_events());
        assert_eq!(seq.events().count(), 0);
    }

    #[test]
    fn output_reset_advertises_capacity() {
        let mut seq = SequenceBuffer::new(1024);
        seq.reset_output();
        assert_eq!(seq.payload_size(), 1024 - 8);
    }

    #[test]
    fn append_pads_to_eight_bytes() {
        let mut seq = SequenceBuffer::new(1024);
        seq.reset_input(1);
        assert!(seq.append_event(3, 7, &[0x90, 0x40, 0x7f], 1024));
        // 8 body header + (16 event header + 3 payload bytes) padded to 24
        assert_eq!(seq.payload_size(), 8 + 24);

        let events: Vec<_> = seq.events().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0.frames, 3);
        assert_eq!(events[0].0.body.size, 3);
        assert_eq!(events[0].0.body.type_, 7);
        assert_eq!(events[0].1, &[0x90, 0x40, 0x7f]);
    }

    #[test]
    fn append_respects_limit() {
        let mut seq = SequenceBuffer::new(4096);
        seq.reset_input(1);
        // 56 bytes of body space: two 3-byte events (24 each) plus the body
        // header fit, a third event does not.
        assert!(seq.append_event(0, 7, &[1, 2, 3], 56));
        assert!(seq.append_event(1, 7, &[4, 5, 6], 56));
        assert!(!seq.append_event(2, 7, &[7, 8, 9], 56));
        assert_eq!(seq.events().count(), 2);
    }

    #[test]
    fn raw_events_carry_their_own_atom_header() {
        let mut seq = SequenceBuffer::new(1024);
        seq.reset_input(1);
        // a 4-byte atom:Float (type 5) as the UI would transfer it
        let mut atom = Vec::new();
        atom.extend_from_slice(&4u32.to_ne_bytes());
        atom.extend_from_slice(&5u32.to_ne_bytes());
        atom.extend_from_slice(&1.5f32.to_ne_bytes());
        assert!(seq.append_raw_event(0, &atom, 1024));

        let events: Vec<_> = seq.events().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0.body.size, 4);
        assert_eq!(events[0].0.body.type_, 5);
        assert_eq!(events[0].1, &1.5f32.to_ne_bytes());
    }

    #[test]
    fn events_iterate_in_order() {
        let mut seq = SequenceBuffer::new(1024);
        seq.reset_input(1);
        for i in 0..5i64 {
            assert!(seq.append_event(i, 9, &[i as u8; 5], 1024));
        }
        let frames: Vec<i64> = seq.events().map(|(ev, _)| ev.frames).collect();
        assert_eq!(frames, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn wire_size_by_status_class() {
        assert_eq!(midi_wire_size(0x90), 3); // note on
        assert_eq!(midi_wire_size(0xb2), 3); // control change
        assert_eq!(midi_wire_size(0xc5), 2); // program change
        assert_eq!(midi_wire_size(0xd0), 2); // channel pressure
        assert_eq!(midi_wire_size(0xf1), 2); // MTC quarter frame
        assert_eq!(midi_wire_size(0xf8), 1); // clock tick
        assert_eq!(midi_wire_size(0xff), 1); // reset
        assert_eq!(midi_wire_size(0xe0), 3); // pitch bend
    }

    fn read_u32(buf: &[u8], at: usize) -> u32 {
        u32::from_ne_bytes(buf[at..at + 4].try_into().unwrap())
    }

    #[test]
    fn position_without_bars_has_frame_and_speed_only() {
        let urids = test_urids();
        let ti = TimeInfo {
            sample_pos: 12345.7,
            flags: TimeInfoFlags::TRANSPORT_PLAYING.bits(),
            ..TimeInfo::default()
        };
        let mut buf = [0u8; 256];
        let total = forge_position(&mut buf, &urids, &ti);

        assert_eq!(read_u32(&buf, 4), urids.atom_object);
        assert_eq!(read_u32(&buf, 0) as usize, total - 8);
        assert_eq!(read_u32(&buf, 12), urids.time_position);
        // frame property
        assert_eq!(read_u32(&buf, 16), urids.time_frame);
        assert_eq!(read_u32(&buf, 28), urids.atom_long);
        assert_eq!(
            i64::from_ne_bytes(buf[32..40].try_into().unwrap()),
            12345
        );
        // speed property
        assert_eq!(read_u32(&buf, 40), urids.time_speed);
        assert_eq!(
            f32::from_ne_bytes(buf[56..60].try_into().unwrap()),
            1.0
        );
        // object body: 8 + frame (8 + 16) + speed (8 + 16)
        assert_eq!(total, 8 + 8 + 24 + 24);
    }

    #[test]
    fn position_with_bars_carries_tempo_and_signature() {
        let urids = test_urids();
        let ti = TimeInfo {
            sample_pos: 0.0,
            ppq_pos: 9.0,
            bar_start_pos: 8.0,
            tempo: 120.0,
            time_sig_numerator: 4,
            time_sig_denominator: 4,
            flags: (TimeInfoFlags::PPQ_POS_VALID
                | TimeInfoFlags::BARS_VALID
                | TimeInfoFlags::TEMPO_VALID
                | TimeInfoFlags::TIME_SIG_VALID)
                .bits(),
            ..TimeInfo::default()
        };
        let mut buf = [0u8; 256];
        let total = forge_position(&mut buf, &urids, &ti);

        // frame + speed + barBeat + bar + beatUnit + beatsPerBar + bpm
        assert_eq!(total, 8 + 8 + 24 + 24 + 24 + 24 + 24 + 24 + 24);
        // barBeat = (9 - 8) / (4/4 / 1) = 1.0, written exactly once
        let mut bar_beat_heads = 0;
        let mut at = 16;
        while at + 8 <= total {
            if read_u32(&buf, at) == urids.time_bar_beat {
                bar_beat_heads += 1;
                assert_eq!(
                    f32::from_ne_bytes(buf[at + 16..at + 20].try_into().unwrap()),
                    1.0
                );
            }
            at += 8;
        }
        assert_eq!(bar_beat_heads, 1);
    }
}
