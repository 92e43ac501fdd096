//! The slice of the LV2 C ABI the bridge talks to directly.
//!
//! `lv2_raw` covers the core feature and URID structs; the extension
//! interfaces the bridge resolves at runtime (worker, options, state, UI)
//! are declared here, mirroring their C headers field for field. All structs
//! are `#[repr(C)]` and are only ever exchanged with plugin code through raw
//! pointers.

use std::os::raw::{c_char, c_int, c_void};

pub use lv2_raw::core::LV2Feature;
pub use lv2_raw::urid::{LV2Urid, LV2UridMap, LV2UridMapHandle, LV2UridUnmap, LV2UridUnmapHandle};

/// Opaque handle to an instantiated plugin.
pub type Lv2Handle = *mut c_void;

/// The `lv2_descriptor` entry point exported by an LV2 binary.
pub type Lv2DescriptorFn = unsafe extern "C" fn(index: u32) -> *const Lv2Descriptor;

/// The `lv2ui_descriptor` entry point exported by an LV2 UI binary.
pub type Lv2UiDescriptorFn = unsafe extern "C" fn(index: u32) -> *const Lv2UiDescriptor;

/// An LV2 plugin descriptor (`LV2_Descriptor`).
#[repr(C)]
pub struct Lv2Descriptor {
    /// URI identifying the plugin.
    pub uri: *const c_char,
    /// Instantiate the plugin at `sample_rate` with the given host features.
    pub instantiate: Option<
        unsafe extern "C" fn(
            descriptor: *const Lv2Descriptor,
            sample_rate: f64,
            bundle_path: *const c_char,
            features: *const *const LV2Feature,
        ) -> Lv2Handle,
    >,
    /// Point a port at its data location.
    pub connect_port:
        Option<unsafe extern "C" fn(instance: Lv2Handle, port: u32, data: *mut c_void)>,
    /// Prepare for processing.
    pub activate: Option<unsafe extern "C" fn(instance: Lv2Handle)>,
    /// Process a block of `n_samples`.
    pub run: Option<unsafe extern "C" fn(instance: Lv2Handle, n_samples: u32)>,
    /// Counterpart of `activate`.
    pub deactivate: Option<unsafe extern "C" fn(instance: Lv2Handle)>,
    /// Destroy the instance.
    pub cleanup: Option<unsafe extern "C" fn(instance: Lv2Handle)>,
    /// Query an extension interface by URI.
    pub extension_data: Option<unsafe extern "C" fn(uri: *const c_char) -> *const c_void>,
}

/// An atom header (`LV2_Atom`): size of the body in bytes and its type URID.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Lv2Atom {
    /// Body size in bytes, not including this header.
    pub size: u32,
    /// Type URID of the body.
    pub type_: u32,
}

/// Body header of an atom sequence (`LV2_Atom_Sequence_Body`).
#[repr(C)]
#[derive(Copy, Clone)]
pub struct Lv2AtomSequenceBody {
    /// URID of the unit of event time stamps (0 = audio frames).
    pub unit: u32,
    /// Unused, must be 0.
    pub pad: u32,
}

/// An atom sequence (`LV2_Atom_Sequence`): the container the bridge hands to
/// atom/MIDI ports.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct Lv2AtomSequence {
    /// `size` counts the body: sequence body header plus all events.
    pub atom: Lv2Atom,
    /// Sequence body header; events follow contiguously.
    pub body: Lv2AtomSequenceBody,
}

/// One event in an atom sequence (`LV2_Atom_Event`), followed by `body.size`
/// bytes of payload padded to 8 bytes.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct Lv2AtomEvent {
    /// Event time in audio frames relative to the cycle start.
    pub frames: i64,
    /// Payload header.
    pub body: Lv2Atom,
}

/// `LV2_Worker_Status` return codes.
pub type Lv2WorkerStatus = u32;
/// Work completed successfully.
pub const LV2_WORKER_SUCCESS: Lv2WorkerStatus = 0;
/// Unknown or general failure.
pub const LV2_WORKER_ERR_UNKNOWN: Lv2WorkerStatus = 1;

/// Callback given to the plugin's `work()` for queueing a response.
pub type Lv2WorkerRespondFn =
    unsafe extern "C" fn(handle: *mut c_void, size: u32, data: *const c_void) -> Lv2WorkerStatus;

/// The `worker:schedule` feature struct handed to the plugin
/// (`LV2_Worker_Schedule`).
#[repr(C)]
pub struct Lv2WorkerSchedule {
    /// Host context passed back to `schedule_work`.
    pub handle: *mut c_void,
    /// Called by the plugin from the processing thread to queue work.
    pub schedule_work: Option<
        unsafe extern "C" fn(
            handle: *mut c_void,
            size: u32,
            data: *const c_void,
        ) -> Lv2WorkerStatus,
    >,
}

/// The plugin-side worker interface resolved via `extension_data`
/// (`LV2_Worker_Interface`).
#[repr(C)]
pub struct Lv2WorkerInterface {
    /// Do a unit of work off the processing thread.
    pub work: Option<
        unsafe extern "C" fn(
            instance: Lv2Handle,
            respond: Lv2WorkerRespondFn,
            handle: *mut c_void,
            size: u32,
            data: *const c_void,
        ) -> Lv2WorkerStatus,
    >,
    /// Deliver a queued response on the processing thread.
    pub work_response: Option<
        unsafe extern "C" fn(instance: Lv2Handle, size: u32, body: *const c_void) -> Lv2WorkerStatus,
    >,
    /// Called at the end of a cycle in which responses were delivered.
    pub end_run: Option<unsafe extern "C" fn(instance: Lv2Handle) -> Lv2WorkerStatus>,
}

/// Option applies to the plugin instance itself (`LV2_OPTIONS_INSTANCE`).
pub const LV2_OPTIONS_INSTANCE: u32 = 0;

/// One option record (`LV2_Options_Option`); an options array is terminated
/// by a zeroed record.
#[repr(C)]
pub struct Lv2OptionsOption {
    /// Context of the subject (`LV2_OPTIONS_INSTANCE` here).
    pub context: u32,
    /// Subject URID, 0 for the instance context.
    pub subject: u32,
    /// Option key URID.
    pub key: LV2Urid,
    /// Size of `value` in bytes.
    pub size: u32,
    /// Type URID of `value`.
    pub type_: LV2Urid,
    /// Pointer to the option value.
    pub value: *const c_void,
}

/// The plugin-side options interface (`LV2_Options_Interface`).
#[repr(C)]
pub struct Lv2OptionsInterface {
    /// Read options into a caller-allocated array.
    pub get: Option<
        unsafe extern "C" fn(instance: Lv2Handle, options: *mut Lv2OptionsOption) -> u32,
    >,
    /// Apply the given options; used for `bufsz:nominalBlockLength` updates.
    pub set: Option<
        unsafe extern "C" fn(instance: Lv2Handle, options: *const Lv2OptionsOption) -> u32,
    >,
}

/// `LV2_State_Status` success code.
pub const LV2_STATE_SUCCESS: u32 = 0;
/// Flag: the stored value is plain old data and may be copied byte by byte.
pub const LV2_STATE_IS_POD: u32 = 1;

/// Host callback storing one property during `save`
/// (`LV2_State_Store_Function`).
pub type Lv2StateStoreFn = unsafe extern "C" fn(
    handle: *mut c_void,
    key: u32,
    value: *const c_void,
    size: usize,
    type_: u32,
    flags: u32,
) -> u32;

/// Host callback producing one property during `restore`
/// (`LV2_State_Retrieve_Function`).
pub type Lv2StateRetrieveFn = unsafe extern "C" fn(
    handle: *mut c_void,
    key: u32,
    size: *mut usize,
    type_: *mut u32,
    flags: *mut u32,
) -> *const c_void;

/// The plugin-side state interface (`LV2_State_Interface`).
#[repr(C)]
pub struct Lv2StateInterface {
    /// Serialize plugin state through the store callback.
    pub save: Option<
        unsafe extern "C" fn(
            instance: Lv2Handle,
            store: Lv2StateStoreFn,
            handle: *mut c_void,
            flags: u32,
            features: *const *const LV2Feature,
        ) -> u32,
    >,
    /// Restore plugin state through the retrieve callback.
    pub restore: Option<
        unsafe extern "C" fn(
            instance: Lv2Handle,
            retrieve: Lv2StateRetrieveFn,
            handle: *mut c_void,
            flags: u32,
            features: *const *const LV2Feature,
        ) -> u32,
    >,
}

/// Opaque handle to an instantiated plugin UI.
pub type Lv2UiHandle = *mut c_void;
/// The widget produced by a UI, e.g. an X11 window id.
pub type Lv2UiWidget = *mut c_void;

/// Callback the UI uses to write to a plugin port
/// (`LV2UI_Write_Function`).
pub type Lv2UiWriteFn = Option<
    unsafe extern "C" fn(
        controller: *mut c_void,
        port_index: u32,
        buffer_size: u32,
        protocol: u32,
        buffer: *const c_void,
    ),
>;

/// An LV2 UI descriptor (`LV2UI_Descriptor`).
#[repr(C)]
pub struct Lv2UiDescriptor {
    /// URI identifying the UI.
    pub uri: *const c_char,
    /// Create the UI widget inside the host-provided parent.
    pub instantiate: Option<
        unsafe extern "C" fn(
            descriptor: *const Lv2UiDescriptor,
            plugin_uri: *const c_char,
            bundle_path: *const c_char,
            write_function: Lv2UiWriteFn,
            controller: *mut c_void,
            widget: *mut Lv2UiWidget,
            features: *const *const LV2Feature,
        ) -> Lv2UiHandle,
    >,
    /// Destroy the UI.
    pub cleanup: Option<unsafe extern "C" fn(ui: Lv2UiHandle)>,
    /// Deliver a port value or event to the UI.
    pub port_event: Option<
        unsafe extern "C" fn(
            ui: Lv2UiHandle,
            port_index: u32,
            buffer_size: u32,
            format: u32,
            buffer: *const c_void,
        ),
    >,
    /// Query a UI extension interface by URI.
    pub extension_data: Option<unsafe extern "C" fn(uri: *const c_char) -> *const c_void>,
}

/// The `ui:resize` feature struct (`LV2UI_Resize`).
#[repr(C)]
pub struct Lv2UiResize {
    /// Host context passed back to `ui_resize`.
    pub handle: *mut c_void,
    /// Called by the UI to request a new size.
    pub ui_resize:
        Option<unsafe extern "C" fn(handle: *mut c_void, width: c_int, height: c_int) -> c_int>,
}

/// The `ui:idleInterface` resolved from the UI's `extension_data`
/// (`LV2UI_Idle_Interface`).
#[repr(C)]
pub struct Lv2UiIdleInterface {
    /// Periodic housekeeping; non-zero return means the UI wants to close.
    pub idle: Option<unsafe extern "C" fn(ui: Lv2UiHandle) -> c_int>,
}

/// URIs of the LV2 vocabulary the bridge speaks.
#[allow(missing_docs)]
pub mod uri {
    pub const INPUT_PORT: &str = "http://lv2plug.in/ns/lv2core#InputPort";
    pub const OUTPUT_PORT: &str = "http://lv2plug.in/ns/lv2core#OutputPort";
    pub const CONTROL_PORT: &str = "http://lv2plug.in/ns/lv2core#ControlPort";
    pub const AUDIO_PORT: &str = "http://lv2plug.in/ns/lv2core#AudioPort";
    pub const CV_PORT: &str = "http://lv2plug.in/ns/lv2core#CVPort";
    pub const ATOM_PORT: &str = "http://lv2plug.in/ns/ext/atom#AtomPort";

    pub const CORE_TOGGLED: &str = "http://lv2plug.in/ns/lv2core#toggled";
    pub const CORE_INTEGER: &str = "http://lv2plug.in/ns/lv2core#integer";
    pub const CORE_SAMPLE_RATE: &str = "http://lv2plug.in/ns/lv2core#sampleRate";
    pub const CORE_ENUMERATION: &str = "http://lv2plug.in/ns/lv2core#enumeration";
    pub const CORE_REPORTS_LATENCY: &str = "http://lv2plug.in/ns/lv2core#reportsLatency";
    pub const CORE_ENABLED: &str = "http://lv2plug.in/ns/lv2core#enabled";
    pub const CORE_MINOR_VERSION: &str = "http://lv2plug.in/ns/lv2core#minorVersion";
    pub const CORE_MICRO_VERSION: &str = "http://lv2plug.in/ns/lv2core#microVersion";

    pub const CLASS_ANALYSER: &str = "http://lv2plug.in/ns/lv2core#AnalyserPlugin";
    pub const CLASS_INSTRUMENT: &str = "http://lv2plug.in/ns/lv2core#InstrumentPlugin";
    pub const CLASS_OSCILLATOR: &str = "http://lv2plug.in/ns/lv2core#OscillatorPlugin";
    pub const CLASS_SPATIAL: &str = "http://lv2plug.in/ns/lv2core#SpatialPlugin";

    pub const URID_MAP: &str = "http://lv2plug.in/ns/ext/urid#map";
    pub const URID_UNMAP: &str = "http://lv2plug.in/ns/ext/urid#unmap";

    pub const WORKER_SCHEDULE: &str = "http://lv2plug.in/ns/ext/worker#schedule";
    pub const WORKER_INTERFACE: &str = "http://lv2plug.in/ns/ext/worker#interface";

    pub const OPTIONS_OPTIONS: &str = "http://lv2plug.in/ns/ext/options#options";
    pub const OPTIONS_INTERFACE: &str = "http://lv2plug.in/ns/ext/options#interface";
    pub const OPTIONS_REQUIRED_OPTION: &str = "http://lv2plug.in/ns/ext/options#requiredOption";

    pub const BUF_SIZE_BOUNDED: &str = "http://lv2plug.in/ns/ext/buf-size#boundedBlockLength";
    pub const BUF_SIZE_MIN_BLOCK: &str = "http://lv2plug.in/ns/ext/buf-size#minBlockLength";
    pub const BUF_SIZE_MAX_BLOCK: &str = "http://lv2plug.in/ns/ext/buf-size#maxBlockLength";
    pub const BUF_SIZE_NOMINAL_BLOCK: &str =
        "http://lv2plug.in/ns/ext/buf-size#nominalBlockLength";
    pub const BUF_SIZE_SEQUENCE_SIZE: &str = "http://lv2plug.in/ns/ext/buf-size#sequenceSize";

    pub const PARAM_SAMPLE_RATE: &str = "http://lv2plug.in/ns/ext/parameters#sampleRate";

    pub const ATOM_SEQUENCE: &str = "http://lv2plug.in/ns/ext/atom#Sequence";
    pub const ATOM_EVENT_TRANSFER: &str = "http://lv2plug.in/ns/ext/atom#eventTransfer";
    pub const ATOM_FLOAT: &str = "http://lv2plug.in/ns/ext/atom#Float";
    pub const ATOM_INT: &str = "http://lv2plug.in/ns/ext/atom#Int";
    pub const ATOM_LONG: &str = "http://lv2plug.in/ns/ext/atom#Long";
    pub const ATOM_OBJECT: &str = "http://lv2plug.in/ns/ext/atom#Object";
    pub const ATOM_SUPPORTS: &str = "http://lv2plug.in/ns/ext/atom#supports";

    pub const MIDI_EVENT: &str = "http://lv2plug.in/ns/ext/midi#MidiEvent";

    pub const TIME_POSITION: &str = "http://lv2plug.in/ns/ext/time#Position";
    pub const TIME_FRAME: &str = "http://lv2plug.in/ns/ext/time#frame";
    pub const TIME_SPEED: &str = "http://lv2plug.in/ns/ext/time#speed";
    pub const TIME_BAR: &str = "http://lv2plug.in/ns/ext/time#bar";
    pub const TIME_BAR_BEAT: &str = "http://lv2plug.in/ns/ext/time#barBeat";
    pub const TIME_BEAT_UNIT: &str = "http://lv2plug.in/ns/ext/time#beatUnit";
    pub const TIME_BEATS_PER_BAR: &str = "http://lv2plug.in/ns/ext/time#beatsPerBar";
    pub const TIME_BEATS_PER_MINUTE: &str = "http://lv2plug.in/ns/ext/time#beatsPerMinute";

    pub const STATE_INTERFACE: &str = "http://lv2plug.in/ns/ext/state#interface";

    pub const RESIZE_PORT_MINIMUM_SIZE: &str =
        "http://lv2plug.in/ns/ext/resize-port#minimumSize";

    pub const PORT_PROPS_LOGARITHMIC: &str =
        "http://lv2plug.in/ns/ext/port-props#logarithmic";
    pub const PORT_PROPS_RANGE_STEPS: &str = "http://lv2plug.in/ns/ext/port-props#rangeSteps";
    pub const PORT_PROPS_NOT_ON_GUI: &str = "http://lv2plug.in/ns/ext/port-props#notOnGUI";
    pub const PORT_PROPS_EXPENSIVE: &str = "http://lv2plug.in/ns/ext/port-props#expensive";
    pub const PORT_PROPS_CAUSES_ARTIFACTS: &str =
        "http://lv2plug.in/ns/ext/port-props#causesArtifacts";
    pub const PORT_PROPS_NOT_AUTOMATIC: &str =
        "http://lv2plug.in/ns/ext/port-props#notAutomatic";

    pub const UI_X11: &str = "http://lv2plug.in/ns/extensions/ui#X11UI";
    pub const UI_COCOA: &str = "http://lv2plug.in/ns/extensions/ui#CocoaUI";
    pub const UI_WINDOWS: &str = "http://lv2plug.in/ns/extensions/ui#WindowsUI";
    pub const UI_PARENT: &str = "http://lv2plug.in/ns/extensions/ui#parent";
    pub const UI_RESIZE: &str = "http://lv2plug.in/ns/extensions/ui#resize";
    pub const UI_IDLE_INTERFACE: &str = "http://lv2plug.in/ns/extensions/ui#idleInterface";
    pub const UI_SCALE_FACTOR: &str = "http://lv2plug.in/ns/extensions/ui#scaleFactor";

    pub const INSTANCE_ACCESS: &str = "http://lv2plug.in/ns/ext/instance-access";

    pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const RDFS_COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";

    /// The native UI class on this platform.
    #[cfg(target_os = "windows")]
    pub const UI_NATIVE: &str = UI_WINDOWS;
    /// The native UI class on this platform.
    #[cfg(target_os = "macos")]
    pub const UI_NATIVE: &str = UI_COCOA;
    /// The native UI class on this platform.
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    pub const UI_NATIVE: &str = UI_X11;
}
