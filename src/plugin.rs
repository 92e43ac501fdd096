//! Plugin specific structures: opcodes, categories and the `Effect` trait
//! implemented by the bridge and the shell.

use std::os::raw::c_void;

use num_enum::TryFromPrimitive;

use crate::api;

/// Plugin type. Generally either Effect or Synth.
///
/// Other types are not necessary to build a plugin and are only useful for
/// the host to categorize the plugin.
#[repr(isize)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    /// Unknown / not implemented
    Unknown = 0,
    /// Any effect
    Effect,
    /// VST instrument
    Synth,
    /// Scope, tuner, spectrum analyser, etc.
    Analysis,
    /// Dynamics, etc.
    Mastering,
    /// Panners, etc.
    Spacializer,
    /// Delays and Reverbs
    RoomFx,
    /// Dedicated surround processor.
    SurroundFx,
    /// Denoiser, etc.
    Restoration,
    /// Offline processing.
    OfflineProcess,
    /// Contains other plugins.
    Shell,
    /// Tone generator, etc.
    Generator,
}

#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive)]
#[doc(hidden)]
pub enum OpCode {
    Initialize,
    Shutdown,

    /// [value]: preset number to change to.
    ChangePreset,
    /// [return]: current preset number.
    GetCurrentPresetNum,
    /// [ptr]: char array with new preset name.
    SetCurrentPresetName,
    /// [ptr]: char buffer for current preset name.
    GetCurrentPresetName,

    /// [ptr]: char buffer for parameter label (e.g. "db", "ms", etc).
    GetParameterLabel,
    /// [ptr]: char buffer (e.g. "0.5", "ROOM", etc).
    GetParameterDisplay,
    /// [ptr]: char buffer. (e.g. "Release", "Gain").
    GetParameterName,

    /// Deprecated.
    _GetVu,

    /// [opt]: new sample rate.
    SetSampleRate,
    /// [value]: new maximum block size.
    SetBlockSize,
    /// [value]: 1 when plugin enabled, 0 when disabled.
    StateChanged,

    /// [ptr]: Rect** receiving pointer to editor size.
    EditorGetRect,
    /// [ptr]: system dependent window pointer, e.g. HWND on Windows.
    EditorOpen,
    /// Close editor. No arguments.
    EditorClose,

    /// Deprecated.
    _EditorDraw,
    /// Deprecated.
    _EditorMouse,
    /// Deprecated.
    _EditorKey,

    /// Idle call from host.
    EditorIdle,

    /// Deprecated.
    _EditorTop,
    /// Deprecated.
    _EditorSleep,
    /// Deprecated.
    _EditorIdentify,

    /// [ptr]: void** for chunk data address. [index]: 0 for bank, 1 for program.
    GetData,
    /// [ptr]: data. [value]: byte size. [index]: 0 for bank, 1 for program.
    SetData,

    /// [ptr]: `api::Events`.
    ProcessEvents,
    /// [index]: param index. [return]: 1=true, 0=false.
    CanBeAutomated,
    /// [index]: param index. [ptr]: parameter string. [return]: true for success.
    StringToParameter,

    /// Deprecated.
    _GetNumCategories,

    /// [index]: program name. [ptr]: char buffer for name.
    GetPresetName,

    /// Deprecated.
    _CopyPreset,
    /// Deprecated.
    _ConnectIn,
    /// Deprecated.
    _ConnectOut,

    /// [index]: input index. [ptr]: `VstPinProperties`.
    GetInputInfo,
    /// [index]: output index. [ptr]: `VstPinProperties`.
    GetOutputInfo,
    /// [return]: `Category` of the plugin.
    GetCategory,

    /// Deprecated.
    _GetCurrentPosition,
    /// Deprecated.
    _GetDestinationBuffer,

    /// [ptr]: `VstAudioFile` array. [value]: count. [index]: start flag.
    OfflineNotify,
    /// [ptr]: `VstOfflineTask` array. [value]: count.
    OfflinePrepare,
    /// [ptr]: `VstOfflineTask` array. [value]: count.
    OfflineRun,

    /// [ptr]: `VstVariableIo`, used for variable I/O processing.
    ProcessVarIo,
    /// [value]: input `*mut VstSpeakerArrangement`.
    /// [ptr]: output `*mut VstSpeakerArrangement`.
    SetSpeakerArrangement,

    /// Deprecated.
    _SetBlocksizeAndSampleRate,

    /// Soft bypass (automatable). [value]: 1 = bypass, 0 = nobypass.
    SoftBypass,
    /// [ptr]: buffer for effect name, limited to 32 chars.
    GetEffectName,

    /// Deprecated.
    _GetErrorText,

    /// [ptr]: buffer for vendor name, limited to `consts::MAX_VENDOR_STR_LEN`.
    GetVendorName,
    /// [ptr]: buffer for product name, limited to `consts::MAX_PRODUCT_STR_LEN`.
    GetProductName,
    /// [return]: vendor specific version.
    GetVendorVersion,
    /// no definition, vendor specific.
    VendorSpecific,
    /// [ptr]: "Can do" string. [return]: 1 = yes, 0 = maybe, -1 = no.
    CanDo,
    /// [return]: tail size (e.g. reverb time). 0 is default, 1 means no tail.
    GetTailSize,

    /// Deprecated.
    _Idle,
    /// Deprecated.
    _GetIcon,
    /// Deprecated.
    _SetVewPosition,

    /// [index]: param index. [ptr]: `api::ParameterProperties`.
    /// [return]: 1 if supported.
    GetParamInfo,

    /// Deprecated.
    _KeysRequired,

    /// [return]: 2400 for vst 2.4.
    GetApiVersion,

    /// [index]: ASCII char. [value]: key code. [opt]: modifier bitmask.
    EditorKeyDown,
    /// [index]: ASCII char. [value]: key code. [opt]: modifier bitmask.
    EditorKeyUp,
    /// [value]: 0 = circular, 1 = circular relative, 2 = linear.
    EditorSetKnobMode,

    /// [index]: MIDI channel. [ptr]: `MidiProgramName`.
    GetMidiProgramName,
    /// [index]: MIDI channel. [ptr]: `MidiProgramName`.
    GetCurrentMidiProgram,
    /// [index]: MIDI channel. [ptr]: `MidiProgramCategory`.
    GetMidiProgramCategory,
    /// [index]: MIDI channel. [return]: 1 if `MidiProgramName` changed.
    HasMidiProgramsChanged,
    /// [index]: MIDI channel. [ptr]: `MidiKeyName`.
    GetMidiKeyName,

    /// Called before a preset is loaded.
    BeginSetPreset,
    /// Called after a preset is loaded.
    EndSetPreset,

    /// [value]: inputs `*mut VstSpeakerArrangement`.
    /// [ptr]: outputs `*mut VstSpeakerArrangement`.
    GetSpeakerArrangement,
    /// [ptr]: buffer for the next sub-plugin's name, limited to
    /// `consts::MAX_SHELL_NAME_LEN`. [return]: next plugin's uniqueID.
    ShellGetNextPlugin,

    /// No args. Called once before the start of process calls.
    StartProcess,
    /// No arguments. Called after the stop of process calls.
    StopProcess,
    /// [value]: number of samples to process. Called in offline mode before
    /// processing.
    SetTotalSampleToProcess,
    /// [value]: pan law. [opt]: gain.
    SetPanLaw,

    /// [ptr]: `VstPatchChunkInfo`.
    BeginLoadBank,
    /// [ptr]: `VstPatchChunkInfo`.
    BeginLoadPreset,

    /// [value]: 0 if 32 bit, anything else if 64 bit.
    SetPrecision,

    /// [return]: number of used MIDI Inputs (1-15).
    GetNumMidiInputs,
    /// [return]: number of used MIDI Outputs (1-15).
    GetNumMidiOutputs,
}

/// The object behind `AEffect::object`: either the LV2 bridge or the shell
/// enumerator.
///
/// Every method has a default implementation so the shell only overrides the
/// handful of opcodes it answers. The dispatcher in `interfaces` translates
/// raw opcodes into these calls.
#[allow(unused_variables)]
pub trait Effect {
    /// `effOpen`.
    fn open(&mut self) {}

    /// `effClose`. The object is dropped right after this returns.
    fn close(&mut self) {}

    /// Process a block of 32 bit audio. `inputs`/`outputs` are host-owned
    /// arrays of channel pointers, one per audio port.
    ///
    /// Real-time safe: implementations may not allocate, lock, log or
    /// perform I/O.
    fn process(&mut self, inputs: *const *const f32, outputs: *mut *mut f32, n_samples: i32) {}

    /// `effProcessEvents`: incoming MIDI for the next process cycle.
    fn process_events(&mut self, events: &api::Events) -> isize {
        0
    }

    /// Set a parameter from its normalized `[0, 1]` VST value. Returns true
    /// if the value changed.
    fn set_parameter(&mut self, index: i32, value: f32) -> bool {
        false
    }

    /// Get a parameter as its normalized `[0, 1]` VST value.
    fn get_parameter(&self, index: i32) -> f32 {
        0.0
    }

    /// Parameter name ("Gain").
    fn parameter_name(&self, index: i32) -> String {
        String::new()
    }

    /// Parameter value rendered as text ("0.50").
    fn parameter_display(&self, index: i32) -> String {
        String::new()
    }

    /// Parameter unit label ("dB").
    fn parameter_label(&self, index: i32) -> String {
        String::new()
    }

    /// `effGetParameterProperties`. Returns true when `props` was filled.
    fn parameter_properties(&self, index: i32, props: &mut api::ParameterProperties) -> bool {
        false
    }

    /// `effCanBeAutomated`.
    fn can_be_automated(&self, index: i32) -> bool {
        true
    }

    /// `effSetSampleRate`.
    fn set_sample_rate(&mut self, rate: f32) {}

    /// `effSetBlockSize`.
    fn set_block_size(&mut self, size: i64) {}

    /// `effMainsChanged(1)`.
    fn resume(&mut self) {}

    /// `effMainsChanged(0)`.
    fn suspend(&mut self) {}

    /// `effGetChunk`. The returned slice must stay valid until the next call
    /// (the host copies it synchronously).
    fn get_chunk(&mut self, is_preset: bool) -> &[u8] {
        &[]
    }

    /// `effSetChunk`.
    fn set_chunk(&mut self, data: &[u8], is_preset: bool) -> isize {
        0
    }

    /// `effCanDo`.
    fn can_do(&self, what: &str) -> isize {
        0
    }

    /// `effSetBypass`. Returns 1 when bypass is supported.
    fn bypass(&mut self, bypass: bool) -> isize {
        0
    }

    /// `effGetPlugCategory`.
    fn category(&self) -> Category {
        Category::Unknown
    }

    /// `effShellGetNextPlugin`: the next sub-plugin as `(unique id, name)`,
    /// or `None` when the iteration is done.
    fn shell_next_plugin(&mut self) -> Option<(i32, String)> {
        None
    }

    /// Effect name, 32 chars max on the wire.
    fn effect_name(&self) -> String {
        String::new()
    }

    /// Product string, 64 chars max on the wire.
    fn product_string(&self) -> String {
        self.effect_name()
    }

    /// Vendor string, 64 chars max on the wire.
    fn vendor_string(&self) -> String {
        String::new()
    }

    /// Vendor specific version.
    fn vendor_version(&self) -> isize {
        1000
    }

    /// `effEditGetRect`. Some editor bounds when an editor is realized.
    fn edit_rect(&mut self) -> Option<*mut api::Rect> {
        None
    }

    /// `effEditOpen`. `window` is a platform dependent parent window handle.
    fn edit_open(&mut self, window: *mut c_void) -> bool {
        false
    }

    /// `effEditClose`.
    fn edit_close(&mut self) {}

    /// `effEditIdle`.
    fn edit_idle(&mut self) {}

    /// Host-provided HiDPI scale factor (Reaper/Cockos vendor extension).
    fn set_ui_scale(&mut self, scale: f32) {}

    /// `AEffect::numParams`.
    fn num_params(&self) -> i32 {
        0
    }

    /// `AEffect::numInputs`.
    fn num_inputs(&self) -> i32 {
        0
    }

    /// `AEffect::numOutputs`.
    fn num_outputs(&self) -> i32 {
        0
    }

    /// `AEffect::uniqueId`.
    fn unique_id(&self) -> i32 {
        0
    }

    /// `AEffect::version`.
    fn version(&self) -> i32 {
        0
    }

    /// `AEffect::flags`.
    fn flags(&self) -> api::PluginFlags {
        api::PluginFlags::CAN_REPLACING
    }
}

#[cfg(test)]
mod tests {
    use super::OpCode;
    use std::convert::TryFrom;

    #[test]
    fn opcode_numbering_follows_vst24() {
        assert_eq!(OpCode::try_from(0), Ok(OpCode::Initialize));
        assert_eq!(OpCode::try_from(10), Ok(OpCode::SetSampleRate));
        assert_eq!(OpCode::try_from(12), Ok(OpCode::StateChanged));
        assert_eq!(OpCode::try_from(13), Ok(OpCode::EditorGetRect));
        assert_eq!(OpCode::try_from(23), Ok(OpCode::GetData));
        assert_eq!(OpCode::try_from(25), Ok(OpCode::ProcessEvents));
        assert_eq!(OpCode::try_from(35), Ok(OpCode::GetCategory));
        assert_eq!(OpCode::try_from(44), Ok(OpCode::SoftBypass));
        assert_eq!(OpCode::try_from(51), Ok(OpCode::CanDo));
        assert_eq!(OpCode::try_from(58), Ok(OpCode::GetApiVersion));
        assert_eq!(OpCode::try_from(70), Ok(OpCode::ShellGetNextPlugin));
        assert!(OpCode::try_from(1234).is_err());
    }
}
