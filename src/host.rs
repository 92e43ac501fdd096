//! Host specific structures.

use std::os::raw::c_void;

use crate::api::{self, AEffect, HostCallbackProc, TimeInfo};

/// Opcodes for the `audioMasterCallback`. Numbering follows VST 2.4;
/// deprecated entries the bridge never issues are omitted, so every variant
/// carries an explicit discriminant.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[doc(hidden)]
pub enum OpCode {
    /// [index]: parameter index. [opt]: parameter value.
    Automate = 0,
    /// [return]: host vst version (e.g. 2400 for VST 2.4).
    Version = 1,
    /// [return]: current plugin ID (used by shell plugins to figure out
    /// which sub-plugin to load in `VSTPluginMain`).
    CurrentId = 2,
    /// Give idle time to the host application.
    Idle = 3,
    /// Deprecated but universally honored: ask the host to deliver MIDI via
    /// `effProcessEvents`.
    WantMidi = 6,
    /// [value]: request mask of `TimeInfoFlags`.
    /// [return]: `*const TimeInfo` or null if not supported.
    GetTime = 7,
    /// [ptr]: `*mut api::Events` with MIDI output for the host.
    ProcessEvents = 8,
    /// Notifies the host that latency or the I/O setup changed.
    IoChanged = 13,
    /// [index]: width. [value]: height. [return]: 1 if supported.
    SizeWindow = 15,
    /// [return]: current sample rate.
    GetSampleRate = 16,
    /// [return]: current block size.
    GetBlockSize = 17,
    /// [return]: `ProcessLevel` of the calling context.
    GetCurrentProcessLevel = 23,
    /// Something (e.g. a program) changed; the host should update its
    /// display.
    UpdateDisplay = 42,
    /// [ptr]: "can do" string. [return]: 1 for supported.
    CanDo = 37,
}

/// In which context the host is currently calling, answered by
/// `audioMasterGetCurrentProcessLevel`.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessLevel {
    /// Unsupported by host.
    Unknown = 0,
    /// GUI thread.
    User = 1,
    /// Audio process thread.
    Realtime = 2,
    /// Sequencer thread (MIDI, etc).
    Prefetch = 3,
    /// Offline processing thread (freewheeling export).
    Offline = 4,
}

/// Thin wrapper around the `audioMasterCallback` and the `AEffect` it
/// belongs to.
///
/// This is `Copy` on purpose: the bridge, its editor and the worker glue all
/// hold their own handle. The host guarantees the callback and the effect
/// pointer stay valid for the lifetime of the plugin instance.
#[derive(Clone, Copy)]
pub struct HostCallback {
    callback: HostCallbackProc,
    effect: *mut AEffect,
}

impl HostCallback {
    /// Wrap a raw callback for the given effect.
    pub fn wrap(callback: HostCallbackProc, effect: *mut AEffect) -> HostCallback {
        HostCallback { callback, effect }
    }

    fn raw_call(&self, opcode: OpCode, index: i32, value: isize, ptr: *mut c_void, opt: f32) -> isize {
        unsafe { (self.callback)(self.effect, opcode as i32, index, value, ptr, opt) }
    }

    /// The `AEffect` this callback belongs to. Null before `wrap`-time for
    /// the pre-instantiation probe.
    pub fn effect(&self) -> *mut AEffect {
        self.effect
    }

    /// The host's VST version (e.g. 2400). Old pre-VST-2 hosts answer 0 and
    /// are rejected.
    pub fn vst_version(&self) -> isize {
        self.raw_call(OpCode::Version, 0, 0, std::ptr::null_mut(), 0.0)
    }

    /// The unique ID of the (sub-)plugin the host wants to load. Only
    /// meaningful for shell plugins.
    pub fn current_id(&self) -> isize {
        self.raw_call(OpCode::CurrentId, 0, 0, std::ptr::null_mut(), 0.0)
    }

    /// Notify the host that a parameter value changed.
    pub fn automate(&self, index: i32, value: f32) {
        self.raw_call(OpCode::Automate, index, 0, std::ptr::null_mut(), value);
    }

    /// Ask whether the host can do `what` (e.g. `"shellCategory"`).
    pub fn can_do(&self, what: &str) -> isize {
        let s = std::ffi::CString::new(what).unwrap_or_default();
        self.raw_call(OpCode::CanDo, 0, 0, s.as_ptr() as *mut c_void, 0.0)
    }

    /// Ask the host to deliver MIDI events to `effProcessEvents`.
    pub fn want_midi(&self) {
        self.raw_call(OpCode::WantMidi, 0, 0, std::ptr::null_mut(), 0.0);
    }

    /// Query the host transport. `mask` is the set of `TimeInfoFlags` the
    /// caller is interested in. The host-owned struct is copied out; it is
    /// only valid until the next call.
    pub fn time_info(&self, mask: api::TimeInfoFlags) -> Option<TimeInfo> {
        let ret = self.raw_call(
            OpCode::GetTime,
            0,
            mask.bits() as isize,
            std::ptr::null_mut(),
            0.0,
        );
        if ret == 0 {
            None
        } else {
            Some(unsafe { *(ret as *const TimeInfo) })
        }
    }

    /// Send MIDI events to the host.
    pub fn process_events(&self, events: &api::Events) -> bool {
        self.raw_call(
            OpCode::ProcessEvents,
            0,
            0,
            events as *const api::Events as *mut c_void,
            0.0,
        ) == 1
    }

    /// The host's current sample rate, if it answers.
    pub fn sample_rate(&self) -> Option<f32> {
        let res = self.raw_call(OpCode::GetSampleRate, 0, 0, std::ptr::null_mut(), 0.0);
        if res > 0 {
            Some(res as f32)
        } else {
            None
        }
    }

    /// The host's current maximum block size, if it answers.
    pub fn block_size(&self) -> Option<i32> {
        let res = self.raw_call(OpCode::GetBlockSize, 0, 0, std::ptr::null_mut(), 0.0);
        if res > 0 {
            Some(res as i32)
        } else {
            None
        }
    }

    /// In which context the host is currently calling.
    pub fn process_level(&self) -> ProcessLevel {
        match self.raw_call(
            OpCode::GetCurrentProcessLevel,
            0,
            0,
            std::ptr::null_mut(),
            0.0,
        ) {
            1 => ProcessLevel::User,
            2 => ProcessLevel::Realtime,
            3 => ProcessLevel::Prefetch,
            4 => ProcessLevel::Offline,
            _ => ProcessLevel::Unknown,
        }
    }

    /// Ask the host to resize the editor window.
    pub fn size_window(&self, width: i32, height: i32) -> bool {
        self.raw_call(
            OpCode::SizeWindow,
            width,
            height as isize,
            std::ptr::null_mut(),
            0.0,
        ) != 0
    }

    /// Tell the host that latency or the I/O setup changed.
    pub fn io_changed(&self) -> bool {
        self.raw_call(OpCode::IoChanged, 0, 0, std::ptr::null_mut(), 0.0) != 0
    }

    /// Ask the host to refresh its generic plugin display.
    pub fn update_display(&self) -> bool {
        self.raw_call(OpCode::UpdateDisplay, 0, 0, std::ptr::null_mut(), 0.0) != 0
    }
}
