//! Structures and types for interfacing with the VST 2.4 API.

use std::os::raw::c_void;

use crate::plugin::Effect;

/// Constant values
#[allow(missing_docs)] // For obvious constants
pub mod consts {
    pub const MAX_PARAM_STR_LEN: usize = 8;
    pub const MAX_EFFECT_NAME_LEN: usize = 32;
    pub const MAX_PRODUCT_STR_LEN: usize = 64;
    pub const MAX_VENDOR_STR_LEN: usize = 64;
    pub const MAX_SHELL_NAME_LEN: usize = 64;

    /// VST plugins are identified by a magic number. This corresponds to 0x56737450.
    pub const VST_MAGIC: i32 =
        (b'V' as i32) << 24 | (b's' as i32) << 16 | (b't' as i32) << 8 | (b'P' as i32);

    /// `MidiEvent::event_type` for plain (non-sysex) MIDI events.
    pub const MIDI_TYPE: i32 = 1;
}

/// `VSTPluginMain` function signature.
pub type PluginMain = extern "C" fn(callback: HostCallbackProc) -> *mut AEffect;

/// Host callback function passed to the plugin. Used to query host state and
/// to deliver events/automation back to the host.
pub type HostCallbackProc = unsafe extern "C" fn(
    effect: *mut AEffect,
    opcode: i32,
    index: i32,
    value: isize,
    ptr: *mut c_void,
    opt: f32,
) -> isize;

/// Dispatcher function used to process opcodes. Called by the host.
pub type DispatcherProc = extern "C" fn(
    effect: *mut AEffect,
    opcode: i32,
    index: i32,
    value: isize,
    ptr: *mut c_void,
    opt: f32,
) -> isize;

/// Process function used to process 32 bit floating point samples. Called by the host.
pub type ProcessProc = extern "C" fn(
    effect: *mut AEffect,
    inputs: *const *const f32,
    outputs: *mut *mut f32,
    sample_frames: i32,
);

/// Process function used to process 64 bit floating point samples. Called by the host.
pub type ProcessProcF64 = extern "C" fn(
    effect: *mut AEffect,
    inputs: *const *const f64,
    outputs: *mut *mut f64,
    sample_frames: i32,
);

/// Callback function used to set parameter values. Called by the host.
pub type SetParameterProc = extern "C" fn(effect: *mut AEffect, index: i32, parameter: f32);

/// Callback function used to get parameter values. Called by the host.
pub type GetParameterProc = extern "C" fn(effect: *mut AEffect, index: i32) -> f32;

/// Used with the VST API to pass around plugin information.
#[allow(non_snake_case)]
#[repr(C)]
pub struct AEffect {
    /// Magic number. Must be `['V', 'S', 'T', 'P']`.
    pub magic: i32,

    /// Host to plug-in dispatcher.
    pub dispatcher: DispatcherProc,

    /// Accumulating process mode is deprecated in VST 2.4! Use `processReplacing` instead!
    pub _process: ProcessProc,

    /// Set value of automatable parameter.
    pub setParameter: SetParameterProc,

    /// Get value of automatable parameter.
    pub getParameter: GetParameterProc,

    /// Number of programs (presets).
    pub numPrograms: i32,

    /// Number of parameters. All programs are assumed to have this many parameters.
    pub numParams: i32,

    /// Number of audio inputs.
    pub numInputs: i32,

    /// Number of audio outputs.
    pub numOutputs: i32,

    /// Bitmask made of values from `api::PluginFlags`.
    pub flags: i32,

    /// Reserved for host, must be 0.
    pub reserved1: isize,

    /// Reserved for host, must be 0.
    pub reserved2: isize,

    /// For algorithms which need input in the first place (group delay or
    /// latency in samples).
    pub initialDelay: i32,

    /// Deprecated unused member.
    pub _realQualities: i32,

    /// Deprecated unused member.
    pub _offQualities: i32,

    /// Deprecated unused member.
    pub _ioRatio: f32,

    /// Void pointer usable by the api to store object data.
    pub object: *mut c_void,

    /// User defined pointer.
    pub user: *mut c_void,

    /// Registered unique identifier. This is used to identify a plug-in
    /// during save+load of presets and projects.
    pub uniqueId: i32,

    /// Plug-in version (e.g. 1100 for v1.1.0.0).
    pub version: i32,

    /// Process audio samples in replacing mode.
    pub processReplacing: ProcessProc,

    /// Process double-precision audio samples in replacing mode.
    pub processReplacingF64: ProcessProcF64,

    /// Reserved for future use (please zero).
    pub future: [u8; 56],
}

impl AEffect {
    /// Return a handle to the effect object. Only works for effects created
    /// by this library.
    pub unsafe fn get_effect(&mut self) -> &mut Box<dyn Effect> {
        &mut *(self.object as *mut Box<dyn Effect>)
    }

    /// Drop the effect object. Only works for effects created by this
    /// library.
    pub unsafe fn drop_effect(&mut self) {
        drop(Box::from_raw(self.object as *mut Box<dyn Effect>));
    }
}

bitflags! {
    /// Flags for VST plugins.
    pub struct PluginFlags: i32 {
        /// Plugin has an editor.
        const HAS_EDITOR = 1;
        /// Plugin can process 32 bit audio. (Mandatory in VST 2.4).
        const CAN_REPLACING = 1 << 4;
        /// Plugin preset data is handled in formatless chunks.
        const PROGRAM_CHUNKS = 1 << 5;
        /// Plugin is a synth.
        const IS_SYNTH = 1 << 8;
        /// Plugin does not produce sound when all input is silence.
        const NO_SOUND_IN_STOP = 1 << 9;
        /// Supports 64 bit audio processing.
        const CAN_DOUBLE_REPLACING = 1 << 12;
    }
}

bitflags! {
    /// Transport state flags in `TimeInfo::flags`.
    pub struct TimeInfoFlags: i32 {
        /// Play, cycle or record state has changed.
        const TRANSPORT_CHANGED = 1;
        /// The transport is rolling.
        const TRANSPORT_PLAYING = 1 << 1;
        /// The host is cycling.
        const TRANSPORT_CYCLE_ACTIVE = 1 << 2;
        /// The host is recording.
        const TRANSPORT_RECORDING = 1 << 3;
        /// `TimeInfo::nanoseconds` is valid.
        const NANOSECONDS_VALID = 1 << 8;
        /// `TimeInfo::ppq_pos` is valid.
        const PPQ_POS_VALID = 1 << 9;
        /// `TimeInfo::tempo` is valid.
        const TEMPO_VALID = 1 << 10;
        /// `TimeInfo::bar_start_pos` is valid.
        const BARS_VALID = 1 << 11;
        /// Cycle positions are valid.
        const CYCLE_POS_VALID = 1 << 12;
        /// Time signature fields are valid.
        const TIME_SIG_VALID = 1 << 13;
        /// SMPTE fields are valid.
        const SMPTE_VALID = 1 << 14;
        /// `TimeInfo::samples_to_next_clock` is valid.
        const CLOCK_VALID = 1 << 15;
    }
}

/// Host transport information, answered by `audioMasterGetTime`.
#[repr(C)]
#[derive(Copy, Clone, Default)]
pub struct TimeInfo {
    /// Current position in audio samples. Always valid.
    pub sample_pos: f64,
    /// Current sample rate in Hz. Always valid.
    pub sample_rate: f64,
    /// System time in nanoseconds.
    pub nanoseconds: f64,
    /// Musical position in quarter notes.
    pub ppq_pos: f64,
    /// Current tempo in BPM.
    pub tempo: f64,
    /// Last bar start position in quarter notes.
    pub bar_start_pos: f64,
    /// Cycle start in quarter notes.
    pub cycle_start_pos: f64,
    /// Cycle end in quarter notes.
    pub cycle_end_pos: f64,
    /// Time signature numerator.
    pub time_sig_numerator: i32,
    /// Time signature denominator.
    pub time_sig_denominator: i32,
    /// SMPTE offset in SMPTE subframes.
    pub smpte_offset: i32,
    /// SMPTE frame rate selector.
    pub smpte_frame_rate: i32,
    /// MIDI clock resolution, samples to the next clock tick.
    pub samples_to_next_clock: i32,
    /// `TimeInfoFlags` bitmask.
    pub flags: i32,
}

/// A struct which contains VST events, exchanged with the host via
/// `effProcessEvents` and `audioMasterProcessEvents`.
#[repr(C)]
pub struct Events {
    /// Number of events.
    pub num_events: i32,

    /// Reserved for future use. Should be 0.
    pub _reserved: isize,

    /// Variable-length array of pointers to `api::Event` objects.
    ///
    /// The VST standard specifies a variable length array of initial size 2.
    /// If there are more than 2 elements a larger array must be stored in
    /// this structure.
    pub events: [*mut Event; 2],
}

impl Events {
    /// View the incoming events as a slice of raw event pointers.
    #[inline(always)]
    pub fn events_raw(&self) -> &[*const Event] {
        use std::slice;
        unsafe {
            slice::from_raw_parts(
                &self.events[0] as *const *mut _ as *const *const _,
                self.num_events as usize,
            )
        }
    }
}

/// The type of event that has occurred. See `api::Event::event_type`.
#[repr(i32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventType {
    /// MIDI event. See `api::MidiEvent`.
    Midi = 1,

    /// Deprecated.
    _Audio,
    /// Deprecated.
    _Video,
    /// Deprecated.
    _Parameter,
    /// Deprecated.
    _Trigger,

    /// System exclusive event.
    SysEx,
}

/// A VST event intended to be cast to a corresponding type.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct Event {
    /// The type of event. Determines the struct this object can be cast to.
    pub event_type: EventType,

    /// Size of this structure.
    pub byte_size: i32,

    /// Number of samples into the current processing block that this event
    /// occurs on.
    pub delta_frames: i32,

    /// Generic flags, none defined in the VST api yet.
    pub _flags: i32,

    /// The `Event` type is cast appropriately, so this acts as reserved space.
    pub _reserved: [u8; 16],
}

/// A MIDI event.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct MidiEvent {
    /// Should be `consts::MIDI_TYPE`.
    pub event_type: i32,

    /// Size of this structure.
    pub byte_size: i32,

    /// Number of samples into the current processing block that this event
    /// occurs on.
    pub delta_frames: i32,

    /// See `MidiEventFlags`.
    pub flags: i32,

    /// Length in sample frames of the entire note if available, otherwise 0.
    pub note_length: i32,

    /// Offset in samples into the note from note start if available,
    /// otherwise 0.
    pub note_offset: i32,

    /// 1 to 3 MIDI bytes; the wire length is implied by the status byte.
    pub midi_data: [u8; 3],

    /// Reserved MIDI byte (0).
    pub _midi_reserved: u8,

    /// Detuning between -63 and +64 cents.
    pub detune: i8,

    /// Note off velocity between 0 and 127.
    pub note_off_velocity: u8,

    /// Reserved for future use. Should be 0.
    pub _reserved1: u8,
    /// Reserved for future use. Should be 0.
    pub _reserved2: u8,
}

impl Default for MidiEvent {
    fn default() -> MidiEvent {
        MidiEvent {
            event_type: consts::MIDI_TYPE,
            byte_size: std::mem::size_of::<MidiEvent>() as i32,
            delta_frames: 0,
            flags: 0,
            note_length: 0,
            note_offset: 0,
            midi_data: [0; 3],
            _midi_reserved: 0,
            detune: 0,
            note_off_velocity: 0,
            _reserved1: 0,
            _reserved2: 0,
        }
    }
}

bitflags! {
    /// MIDI event flags.
    pub struct MidiEventFlags: i32 {
        /// This event is played live (not in playback from a sequencer
        /// track) and may be prioritized by a high-latency plugin.
        const REALTIME_EVENT = 1;
    }
}

/// Rectangle used to specify the dimensions of an editor window, answered by
/// `effEditGetRect`.
#[repr(C)]
#[derive(Copy, Clone, Default)]
pub struct Rect {
    /// Y value in pixels of top side.
    pub top: i16,
    /// X value in pixels of left side.
    pub left: i16,
    /// Y value in pixels of bottom side.
    pub bottom: i16,
    /// X value in pixels of right side.
    pub right: i16,
}

bitflags! {
    /// Flags in `ParameterProperties::flags`.
    pub struct ParameterFlags: i32 {
        /// The parameter is a boolean switch.
        const IS_SWITCH = 1;
        /// `min_integer` and `max_integer` are valid.
        const USES_INTEGER_MIN_MAX = 1 << 1;
        /// `step_float` fields are valid.
        const USES_FLOAT_STEP = 1 << 2;
        /// `step_integer` fields are valid.
        const USES_INT_STEP = 1 << 3;
        /// `display_index` is valid.
        const SUPPORTS_DISPLAY_INDEX = 1 << 4;
        /// Category fields are valid.
        const SUPPORTS_DISPLAY_CATEGORY = 1 << 5;
        /// The parameter value can ramp between two points.
        const CAN_RAMP = 1 << 6;
    }
}

/// Extended parameter description answered by `effGetParameterProperties`.
#[repr(C)]
pub struct ParameterProperties {
    /// Float step for one UI increment.
    pub step_float: f32,
    /// Small float step.
    pub small_step_float: f32,
    /// Large float step.
    pub large_step_float: f32,
    /// Parameter label.
    pub label: [u8; 64],
    /// `ParameterFlags` bitmask.
    pub flags: i32,
    /// Integer minimum.
    pub min_integer: i32,
    /// Integer maximum.
    pub max_integer: i32,
    /// Integer step.
    pub step_integer: i32,
    /// Large integer step.
    pub large_step_integer: i32,
    /// Short label, recommended 6 characters + delimiter.
    pub short_label: [u8; 8],
    /// Index where this parameter should be displayed.
    pub display_index: i16,
    /// Parameter category, 0 for none.
    pub category: i16,
    /// Number of parameters in this category.
    pub num_parameters_in_category: i16,
    /// Reserved, zero.
    pub reserved: i16,
    /// Category label.
    pub category_label: [u8; 24],
    /// Reserved for future use.
    pub future: [u8; 16],
}
