//! The bridge core: one VST effect wrapping one LV2 plugin instance.
//!
//! Construction resolves the `lv2_descriptor` out of the plugin's shared
//! library, instantiates it with the `urid:map`, `urid:unmap`,
//! `worker:schedule` and `options:options` features and wires every port:
//! control ports to a float cell the bridge owns, event ports to the atom
//! sequence buffers, audio ports to whatever the host hands `process` each
//! cycle.
//!
//! Thread contract: `process`, `set_parameter` and `get_parameter` run on
//! the host's audio thread and stay free of allocation, locks, logging and
//! I/O. Everything else runs on the host's UI thread. The plugin's UI can
//! re-enter the bridge from inside `port_event` (via the write function);
//! the single-port `recursion` guard on the editor suppresses the echo.

use std::ffi::CStr;
use std::fmt;
use std::os::raw::c_void;
use std::sync::Arc;

use libloading::Library;
use log::{debug, warn};

use crate::api::{self, TimeInfo, TimeInfoFlags};
use crate::atom::{self, SequenceBuffer, Urids, ATOM_HEADER};
use crate::descriptor::{PluginDescriptor, PortKind};
use crate::host::{HostCallback, ProcessLevel};
use crate::lv2::{
    uri, LV2Feature, LV2UridMap, LV2UridUnmap, Lv2Descriptor, Lv2DescriptorFn, Lv2Handle,
    Lv2OptionsInterface, Lv2OptionsOption, Lv2StateInterface, Lv2WorkerInterface,
    Lv2WorkerSchedule, LV2_OPTIONS_INSTANCE,
};
use crate::plugin::{Category, Effect};
use crate::ring::RingBuffer;
use crate::state::{self, PortValue, StateData};
use crate::ui::Editor;
use crate::uri_map::UriMap;
use crate::worker::{self, Worker};

/// Max audio cycles per GUI refresh the rings are provisioned for.
const UPDATE_FREQ_RATIO: usize = 60;
/// Depth of the incoming MIDI queue; also advertised to the plugin as
/// `bufsz:sequenceSize`.
const MIDI_BUF_SIZE: usize = 8192;

/// Sentinel for "no port" in the parameter maps.
pub(crate) const PORT_NONE: u32 = u32::MAX;

/// A parameter update record on the `ctrl_to_ui` ring.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ParamChange {
    /// LV2 port index.
    pub port: u32,
    /// New port value (LV2 range).
    pub value: f32,
}

/// Option values handed to the plugin; pinned on the heap because the
/// plugin may keep pointers into them.
struct OptionValues {
    sample_rate: f32,
    block_size: i32,
    seq_size: i32,
}

/// Plugin callbacks resolved once at init so the audio path does not
/// re-check `Option`s.
#[derive(Clone, Copy)]
struct DspFns {
    connect_port: unsafe extern "C" fn(Lv2Handle, u32, *mut c_void),
    run: unsafe extern "C" fn(Lv2Handle, u32),
    activate: Option<unsafe extern "C" fn(Lv2Handle)>,
    deactivate: Option<unsafe extern "C" fn(Lv2Handle)>,
    cleanup: Option<unsafe extern "C" fn(Lv2Handle)>,
    extension_data: Option<unsafe extern "C" fn(*const std::os::raw::c_char) -> *const c_void>,
}

/// Why the bridge could not come up.
#[derive(Debug)]
pub enum BridgeError {
    /// The DSP library could not be opened.
    Library(String),
    /// `lv2_descriptor` does not yield a descriptor for the plugin URI.
    NoDescriptor(String),
    /// The descriptor lacks a mandatory callback.
    IncompleteDescriptor(&'static str),
    /// `instantiate` returned null.
    Instantiate(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::Library(e) => write!(f, "cannot open DSP library: {}", e),
            BridgeError::NoDescriptor(uri) => write!(f, "no LV2 descriptor for '{}'", uri),
            BridgeError::IncompleteDescriptor(what) => {
                write!(f, "LV2 descriptor lacks {}", what)
            }
            BridgeError::Instantiate(uri) => write!(f, "failed to instantiate '{}'", uri),
        }
    }
}

impl std::error::Error for BridgeError {}

/// The VST-visible object for one LV2 plugin.
pub struct Bridge {
    host: HostCallback,
    desc: Arc<PluginDescriptor>,

    /// Keeps the DSP binary mapped; must outlive `instance` and `worker`.
    _lib: Library,
    lv2_descriptor: Lv2DescriptorFn,
    dsp: *const Lv2Descriptor,
    fns: Option<DspFns>,
    instance: Lv2Handle,

    map: Arc<UriMap>,
    urid_map: Box<LV2UridMap>,
    urid_unmap: Box<LV2UridUnmap>,
    schedule: Box<Lv2WorkerSchedule>,
    opt_values: Box<OptionValues>,
    options: Box<[Lv2OptionsOption; 5]>,
    urids: Urids,

    worker: Option<Box<Worker>>,
    opts_iface: *const Lv2OptionsInterface,

    /// Current port values; one float cell per port, the plugin holds the
    /// addresses of the control cells.
    ports: Box<[f32]>,
    /// Snapshot at the start of the last cycle, to detect output changes.
    ports_pre: Box<[f32]>,
    /// LV2 port index → VST parameter slot (or `PORT_NONE`).
    portmap_ctrl: Box<[u32]>,
    /// VST parameter slot → LV2 port index.
    portmap_rctrl: Box<[u32]>,
    num_params: i32,

    atom_in: SequenceBuffer,
    atom_out: SequenceBuffer,
    /// LV2 index of the event input port, `PORT_NONE` if absent.
    port_event_in: u32,
    /// LV2 index of the event output port, `PORT_NONE` if absent.
    port_event_out: u32,
    /// Staging area for framing atom transfers in and out of the byte
    /// rings; a frame is always published with a single ring write.
    ui_scratch: Box<[u8]>,

    /// Parameter updates towards the open UI.
    pub(crate) ctrl_to_ui: Arc<RingBuffer<ParamChange>>,
    /// Output atom sequences towards the open UI.
    pub(crate) atom_to_ui: Arc<RingBuffer<u8>>,
    /// Atom events written by the UI, drained each cycle.
    pub(crate) atom_from_ui: Arc<RingBuffer<u8>>,
    /// Incoming VST MIDI, drained each cycle.
    midi_buffer: RingBuffer<api::MidiEvent>,

    ui: Editor,
    /// Force a full parameter refresh on the next cycle with an open UI.
    ui_sync: bool,
    ui_scale: f32,
    active: bool,

    sample_rate: f32,
    block_size: i32,
    ti: TimeInfo,

    state_chunk: Vec<u8>,
}

impl Bridge {
    /// Build the bridge for a resolved plugin. The returned value must be
    /// heap-pinned (the dispatcher boxes it) before any UI or worker
    /// callback can observe its address.
    pub fn new(host: HostCallback, desc: PluginDescriptor) -> Result<Bridge, BridgeError> {
        let desc = Arc::new(desc);

        let lib = unsafe { Library::new(&desc.dsp_path) }
            .map_err(|e| BridgeError::Library(e.to_string()))?;
        let lv2_descriptor: Lv2DescriptorFn = unsafe {
            lib.get(b"lv2_descriptor\0")
                .map(|sym| *sym)
                .map_err(|e| BridgeError::Library(e.to_string()))?
        };

        let map = Arc::new(UriMap::new());
        let urid_map = Box::new(map.as_urid_map());
        let urid_unmap = Box::new(map.as_urid_unmap());
        let schedule = Box::new(Lv2WorkerSchedule {
            handle: std::ptr::null_mut(),
            schedule_work: Some(worker::schedule_callback),
        });
        let opt_values = Box::new(OptionValues {
            sample_rate: 48000.0,
            block_size: 8192,
            seq_size: MIDI_BUF_SIZE as i32,
        });
        let options = Box::new(
            [
                Lv2OptionsOption {
                    context: LV2_OPTIONS_INSTANCE,
                    subject: 0,
                    key: 0,
                    size: 4,
                    type_: 0,
                    value: &opt_values.sample_rate as *const f32 as *const c_void,
                },
                Lv2OptionsOption {
                    context: LV2_OPTIONS_INSTANCE,
                    subject: 0,
                    key: 0,
                    size: 4,
                    type_: 0,
                    value: &opt_values.block_size as *const i32 as *const c_void,
                },
                Lv2OptionsOption {
                    context: LV2_OPTIONS_INSTANCE,
                    subject: 0,
                    key: 0,
                    size: 4,
                    type_: 0,
                    value: &opt_values.block_size as *const i32 as *const c_void,
                },
                Lv2OptionsOption {
                    context: LV2_OPTIONS_INSTANCE,
                    subject: 0,
                    key: 0,
                    size: 4,
                    type_: 0,
                    value: &opt_values.seq_size as *const i32 as *const c_void,
                },
                Lv2OptionsOption {
                    context: LV2_OPTIONS_INSTANCE,
                    subject: 0,
                    size: 0,
                    key: 0,
                    type_: 0,
                    value: std::ptr::null(),
                },
            ],
        );

        let nports = desc.counts.total as usize;
        let min_atom = desc.min_atom_bufsiz as usize;
        let ctrl_ring = 1 + UPDATE_FREQ_RATIO * desc.counts.ctrl().max(1) as usize;

        let ui = Editor::new(desc.clone(), map.clone());

        let mut bridge = Bridge {
            host,
            _lib: lib,
            lv2_descriptor,
            dsp: std::ptr::null(),
            fns: None,
            instance: std::ptr::null_mut(),
            map,
            urid_map,
            urid_unmap,
            schedule,
            opt_values,
            options,
            urids: Urids::default(),
            worker: None,
            opts_iface: std::ptr::null(),
            ports: vec![0.0; nports].into_boxed_slice(),
            ports_pre: vec![0.0; nports].into_boxed_slice(),
            portmap_ctrl: vec![PORT_NONE; nports].into_boxed_slice(),
            portmap_rctrl: vec![PORT_NONE; desc.counts.ctrl_in.max(1) as usize]
                .into_boxed_slice(),
            num_params: 0,
            atom_in: SequenceBuffer::new(min_atom + ATOM_HEADER),
            atom_out: SequenceBuffer::new(min_atom + ATOM_HEADER),
            port_event_in: PORT_NONE,
            port_event_out: PORT_NONE,
            ui_scratch: vec![0u8; min_atom + 2 * ATOM_HEADER].into_boxed_slice(),
            ctrl_to_ui: Arc::new(RingBuffer::new(ctrl_ring)),
            atom_to_ui: Arc::new(RingBuffer::new(1 + UPDATE_FREQ_RATIO * min_atom)),
            atom_from_ui: Arc::new(RingBuffer::new(UPDATE_FREQ_RATIO * min_atom)),
            midi_buffer: RingBuffer::new(MIDI_BUF_SIZE),
            ui,
            ui_sync: true,
            ui_scale: 1.0,
            active: false,
            sample_rate: host.sample_rate().unwrap_or(48000.0),
            block_size: host.block_size().unwrap_or(8192),
            ti: TimeInfo::default(),
            state_chunk: Vec::new(),
            desc,
        };
        bridge.init()?;
        Ok(bridge)
    }

    /// The resolved description this bridge runs from.
    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.desc
    }

    /// Instantiate and wire the plugin. Runs once at construction and again
    /// whenever the host changes the sample rate.
    fn init(&mut self) -> Result<(), BridgeError> {
        // options carry pointers to the current rate/block values
        self.opt_values.sample_rate = self.sample_rate;
        self.opt_values.block_size = self.block_size;
        let urid_float = self.map.map(uri::ATOM_FLOAT);
        let urid_int = self.map.map(uri::ATOM_INT);
        self.options[0].key = self.map.map(uri::PARAM_SAMPLE_RATE);
        self.options[0].type_ = urid_float;
        self.options[1].key = self.map.map(uri::BUF_SIZE_MIN_BLOCK);
        self.options[1].type_ = urid_int;
        self.options[2].key = self.map.map(uri::BUF_SIZE_MAX_BLOCK);
        self.options[2].type_ = urid_int;
        self.options[3].key = self.map.map(uri::BUF_SIZE_SEQUENCE_SIZE);
        self.options[3].type_ = urid_int;

        // find the descriptor matching our URI
        let mut index = 0;
        self.dsp = loop {
            let d = unsafe { (self.lv2_descriptor)(index) };
            if d.is_null() {
                return Err(BridgeError::NoDescriptor(self.desc.dsp_uri.clone()));
            }
            let d_uri = unsafe { CStr::from_ptr((*d).uri) };
            if d_uri.to_str() == Ok(self.desc.dsp_uri.as_str()) {
                break d;
            }
            index += 1;
        };

        let dsp = unsafe { &*self.dsp };
        let fns = DspFns {
            connect_port: dsp
                .connect_port
                .ok_or(BridgeError::IncompleteDescriptor("connect_port"))?,
            run: dsp.run.ok_or(BridgeError::IncompleteDescriptor("run"))?,
            activate: dsp.activate,
            deactivate: dsp.deactivate,
            cleanup: dsp.cleanup,
            extension_data: dsp.extension_data,
        };
        let instantiate = dsp
            .instantiate
            .ok_or(BridgeError::IncompleteDescriptor("instantiate"))?;

        // host features
        let uri_map_c = std::ffi::CString::new(uri::URID_MAP).unwrap_or_default();
        let uri_unmap_c = std::ffi::CString::new(uri::URID_UNMAP).unwrap_or_default();
        let uri_sched_c = std::ffi::CString::new(uri::WORKER_SCHEDULE).unwrap_or_default();
        let uri_options_c = std::ffi::CString::new(uri::OPTIONS_OPTIONS).unwrap_or_default();
        let map_feature = LV2Feature {
            uri: uri_map_c.as_ptr(),
            data: &*self.urid_map as *const LV2UridMap as *mut c_void,
        };
        let unmap_feature = LV2Feature {
            uri: uri_unmap_c.as_ptr(),
            data: &*self.urid_unmap as *const LV2UridUnmap as *mut c_void,
        };
        let schedule_feature = LV2Feature {
            uri: uri_sched_c.as_ptr(),
            data: &*self.schedule as *const Lv2WorkerSchedule as *mut c_void,
        };
        let options_feature = LV2Feature {
            uri: uri_options_c.as_ptr(),
            data: self.options.as_ptr() as *mut c_void,
        };
        let features: [*const LV2Feature; 5] = [
            &map_feature,
            &unmap_feature,
            &schedule_feature,
            &options_feature,
            std::ptr::null(),
        ];

        let bundle_dir = self
            .desc
            .dsp_path
            .parent()
            .map(|d| format!("{}/", d.display()))
            .unwrap_or_default();
        let bundle_c = std::ffi::CString::new(bundle_dir).unwrap_or_default();

        self.instance = unsafe {
            instantiate(
                self.dsp,
                self.sample_rate as f64,
                bundle_c.as_ptr(),
                features.as_ptr(),
            )
        };
        if self.instance.is_null() {
            return Err(BridgeError::Instantiate(self.desc.dsp_uri.clone()));
        }

        // connect ports
        let mut c_ctrl: u32 = 0;
        for p in 0..self.desc.counts.total as usize {
            let port = &self.desc.ports[p];
            match port.kind {
                PortKind::ControlIn => {
                    self.ports[p] = port.default;
                    unsafe {
                        (fns.connect_port)(
                            self.instance,
                            p as u32,
                            &mut self.ports[p] as *mut f32 as *mut c_void,
                        );
                    }
                    self.ctrl_to_ui.write(&[ParamChange {
                        port: p as u32,
                        value: self.ports[p],
                    }]);
                    if !port.not_on_gui && !port.not_automatic {
                        self.portmap_ctrl[p] = c_ctrl;
                        self.portmap_rctrl[c_ctrl as usize] = p as u32;
                        c_ctrl += 1;
                    } else {
                        self.portmap_ctrl[p] = PORT_NONE;
                    }
                }
                PortKind::ControlOut => unsafe {
                    (fns.connect_port)(
                        self.instance,
                        p as u32,
                        &mut self.ports[p] as *mut f32 as *mut c_void,
                    );
                },
                PortKind::MidiIn | PortKind::AtomIn => {
                    self.port_event_in = p as u32;
                    unsafe {
                        (fns.connect_port)(self.instance, p as u32, self.atom_in.as_connect_ptr());
                    }
                }
                PortKind::MidiOut | PortKind::AtomOut => {
                    self.port_event_out = p as u32;
                    unsafe {
                        (fns.connect_port)(self.instance, p as u32, self.atom_out.as_connect_ptr());
                    }
                }
                PortKind::AudioIn | PortKind::AudioOut => {
                    // re-pointed to the host buffers on every cycle
                }
            }
        }
        self.num_params = c_ctrl as i32;

        if self.desc.counts.event_in() + self.desc.counts.event_out() > 0 {
            self.urids = Urids::map(&self.map);
        } else {
            self.urids = Urids::default();
        }

        self.opts_iface = std::ptr::null();
        let mut worker_iface: *const Lv2WorkerInterface = std::ptr::null();
        if let Some(extension_data) = fns.extension_data {
            let worker_c = std::ffi::CString::new(uri::WORKER_INTERFACE).unwrap_or_default();
            let options_c = std::ffi::CString::new(uri::OPTIONS_INTERFACE).unwrap_or_default();
            worker_iface =
                unsafe { extension_data(worker_c.as_ptr()) } as *const Lv2WorkerInterface;
            self.opts_iface =
                unsafe { extension_data(options_c.as_ptr()) } as *const Lv2OptionsInterface;
        }

        if !worker_iface.is_null() {
            let worker = unsafe { Worker::new(worker_iface, self.instance) };
            self.schedule.handle = &*worker as *const Worker as *mut c_void;
            self.worker = Some(worker);
        }

        self.fns = Some(fns);
        debug!(
            "instantiated '{}' ({} params, rate {})",
            self.desc.dsp_uri, self.num_params, self.sample_rate
        );
        Ok(())
    }

    /// Stop the worker and destroy the plugin instance.
    fn deinit(&mut self) {
        self.worker = None;
        self.schedule.handle = std::ptr::null_mut();
        self.suspend();
        if let Some(fns) = self.fns {
            if let (Some(cleanup), false) = (fns.cleanup, self.instance.is_null()) {
                unsafe { cleanup(self.instance) };
            }
        }
        self.instance = std::ptr::null_mut();
        self.fns = None;
        // queued events belong to the torn-down instance
        self.midi_buffer.reset();
        self.atom_from_ui.reset();
    }

    /// The LV2 port behind a VST parameter slot.
    fn param_port(&self, index: i32) -> Option<usize> {
        if index < 0 || index as usize >= self.portmap_rctrl.len() {
            return None;
        }
        let p = self.portmap_rctrl[index as usize];
        if p == PORT_NONE {
            None
        } else {
            Some(p as usize)
        }
    }

    /// `set_parameter` plus `audioMasterAutomate`: the path taken by the
    /// plugin's own UI and by chunk restore.
    pub(crate) fn set_parameter_automated(&mut self, index: i32, value: f32) {
        if self.set_parameter(index, value) {
            self.host.automate(index, value);
        }
    }

    /// The UI wrote to a port: control floats go through the automated
    /// parameter path, atoms into the `atom_from_ui` ring.
    pub(crate) fn ui_write_to_dsp(
        &mut self,
        port_index: u32,
        buffer_size: u32,
        protocol: u32,
        buffer: *const c_void,
    ) {
        if buffer_size == 0 || self.ui.recursion == port_index {
            return;
        }

        if protocol != 0 {
            let total = ATOM_HEADER + buffer_size as usize;
            if self.atom_from_ui.write_space() >= total {
                // framed as {size, type 0} + atom; published in one write so
                // the audio thread never sees a length without its payload
                let payload = unsafe {
                    std::slice::from_raw_parts(buffer as *const u8, buffer_size as usize)
                };
                let mut frame = Vec::with_capacity(total);
                frame.extend_from_slice(&buffer_size.to_ne_bytes());
                frame.extend_from_slice(&0u32.to_ne_bytes());
                frame.extend_from_slice(payload);
                self.atom_from_ui.write(&frame);
            }
            return;
        }

        if buffer_size != 4 {
            return;
        }
        let p = port_index as usize;
        if p >= self.desc.ports.len() || self.desc.ports[p].kind != PortKind::ControlIn {
            warn!("UI write to non-control-input port {}", port_index);
            return;
        }
        let vst_index = self.portmap_ctrl[p];
        if vst_index == PORT_NONE {
            return;
        }
        let value = unsafe { *(buffer as *const f32) };
        let normalized = self.desc.ports[p].to_vst(value);
        self.set_parameter_automated(vst_index as i32, normalized);
    }

    /// The UI asked for a new size.
    pub(crate) fn ui_set_size(&mut self, width: i32, height: i32) {
        self.ui.set_size(width, height);
        self.host.size_window(width, height);
    }

    fn state_iface(&self) -> *const Lv2StateInterface {
        let fns = match self.fns {
            Some(f) => f,
            None => return std::ptr::null(),
        };
        let extension_data = match fns.extension_data {
            Some(f) => f,
            None => return std::ptr::null(),
        };
        let state_c = std::ffi::CString::new(uri::STATE_INTERFACE).unwrap_or_default();
        unsafe { extension_data(state_c.as_ptr()) as *const Lv2StateInterface }
    }

    /// Append the transport position, UI events and queued MIDI to the input
    /// sequence.
    fn fill_event_input(&mut self, transport_changed: bool, ti: Option<&TimeInfo>) {
        let limit = self.desc.min_atom_bufsiz as usize;
        self.atom_in.reset_input(self.urids.atom_sequence);

        if transport_changed && self.desc.send_time_info {
            if let Some(ti) = ti {
                let mut pos = [0u8; 256];
                let total = atom::forge_position(&mut pos, &self.urids, ti);
                let type_ = u32::from_ne_bytes(pos[4..8].try_into().unwrap());
                self.atom_in
                    .append_event(0, type_, &pos[ATOM_HEADER..total], limit);
            }
        }

        if self.ui.has_editor() {
            loop {
                if self.atom_from_ui.read_space() <= ATOM_HEADER {
                    break;
                }
                let mut framing = [0u8; ATOM_HEADER];
                self.atom_from_ui.read(&mut framing);
                let size = u32::from_ne_bytes(framing[0..4].try_into().unwrap()) as usize;
                if size > self.ui_scratch.len() {
                    // stream out of sync; drop what we can and stop
                    self.atom_from_ui.skip(size);
                    break;
                }
                let got = self.atom_from_ui.read(&mut self.ui_scratch[..size]);
                if got < size {
                    break;
                }
                self.atom_in
                    .append_raw_event(0, &self.ui_scratch[..size], limit);
            }
        }

        if self.desc.counts.midi_in > 0 {
            let mut mev = [api::MidiEvent::default()];
            while self.midi_buffer.read(&mut mev) == 1 {
                let size = atom::midi_wire_size(mev[0].midi_data[0]);
                self.atom_in.append_event(
                    mev[0].delta_frames as i64,
                    self.urids.midi_event,
                    &mev[0].midi_data[..size],
                    limit,
                );
            }
        }
    }

    /// Publish parameter changes (and the full set after a UI reconnect) to
    /// the control ring.
    fn publish_ctrl_changes(&mut self) {
        if let Some(lp) = self.desc.latency_ctrl_port {
            let lp = lp as usize;
            if self.ports_pre[lp] != self.ports[lp] {
                let effect = self.host.effect();
                if !effect.is_null() {
                    unsafe { (*effect).initialDelay = self.ports[lp].floor() as i32 };
                }
            }
        }

        if !self.ui.is_open() {
            self.ui_sync = true;
            return;
        }
        for p in 0..self.desc.counts.total as usize {
            let kind = self.desc.ports[p].kind;
            if kind == PortKind::ControlIn && self.ui_sync {
                self.ctrl_to_ui.write(&[ParamChange {
                    port: p as u32,
                    value: self.ports[p],
                }]);
                continue;
            }
            if kind != PortKind::ControlOut {
                continue;
            }
            if self.ports_pre[p] == self.ports[p] && !self.ui_sync {
                continue;
            }
            if self.ctrl_to_ui.write_space() < 1 {
                continue;
            }
            self.ctrl_to_ui.write(&[ParamChange {
                port: p as u32,
                value: self.ports[p],
            }]);
        }
        self.ui_sync = false;
    }

    /// Ship the output sequence to the UI ring and re-frame MIDI output
    /// events for the host.
    fn publish_event_output(&mut self) {
        if self.port_event_out == PORT_NONE || !self.atom_out.has_events() {
            return;
        }

        let total = self.atom_out.total_size();
        let frame_len = ATOM_HEADER + total;
        if self.ui.is_open()
            && frame_len <= self.ui_scratch.len()
            && self.atom_to_ui.write_space() >= frame_len
        {
            self.ui_scratch[0..4].copy_from_slice(&(total as u32).to_ne_bytes());
            self.ui_scratch[4..8].copy_from_slice(&0u32.to_ne_bytes());
            self.ui_scratch[8..frame_len].copy_from_slice(&self.atom_out.raw()[..total]);
            self.atom_to_ui.write(&self.ui_scratch[..frame_len]);
        }

        if self.desc.counts.midi_out > 0 {
            for (ev, data) in self.atom_out.events() {
                if ev.body.type_ != self.urids.midi_event || ev.body.size >= 4 {
                    continue;
                }
                let mut mev = api::MidiEvent {
                    delta_frames: ev.frames as i32,
                    ..api::MidiEvent::default()
                };
                mev.midi_data[..data.len()].copy_from_slice(data);
                let events = api::Events {
                    num_events: 1,
                    _reserved: 0,
                    events: [
                        &mut mev as *mut api::MidiEvent as *mut api::Event,
                        std::ptr::null_mut(),
                    ],
                };
                self.host.process_events(&events);
            }
        }
    }
}

impl Effect for Bridge {
    fn process(&mut self, inputs: *const *const f32, outputs: *mut *mut f32, n_samples: i32) {
        let fns = match self.fns {
            Some(f) => f,
            None => return,
        };

        // re-point the audio ports at the host buffers
        let mut ins = 0isize;
        let mut outs = 0isize;
        for p in 0..self.desc.counts.total as usize {
            match self.desc.ports[p].kind {
                PortKind::AudioIn => unsafe {
                    (fns.connect_port)(self.instance, p as u32, *inputs.offset(ins) as *mut c_void);
                    ins += 1;
                },
                PortKind::AudioOut => unsafe {
                    (fns.connect_port)(
                        self.instance,
                        p as u32,
                        *outputs.offset(outs) as *mut c_void,
                    );
                    outs += 1;
                },
                _ => {}
            }
        }

        let ti = self.host.time_info(
            TimeInfoFlags::PPQ_POS_VALID
                | TimeInfoFlags::BARS_VALID
                | TimeInfoFlags::TIME_SIG_VALID
                | TimeInfoFlags::TEMPO_VALID,
        );
        let transport_changed = match &ti {
            Some(t) => {
                t.flags != self.ti.flags
                    || t.sample_pos != self.ti.sample_pos
                    || t.tempo != self.ti.tempo
                    || t.time_sig_denominator != self.ti.time_sig_denominator
                    || t.time_sig_numerator != self.ti.time_sig_numerator
            }
            None => false,
        };

        if self.port_event_in != PORT_NONE {
            self.fill_event_input(transport_changed, ti.as_ref());
        }
        if self.port_event_out != PORT_NONE {
            self.atom_out.reset_output();
        }

        self.ports_pre.copy_from_slice(&self.ports);

        unsafe { (fns.run)(self.instance, n_samples as u32) };

        if let Some(worker) = &self.worker {
            worker.emit_response();
        }

        if let Some(t) = ti {
            self.ti = t;
            if TimeInfoFlags::from_bits_truncate(t.flags)
                .contains(TimeInfoFlags::TRANSPORT_PLAYING)
            {
                self.ti.sample_pos += n_samples as f64;
            }
        }

        self.publish_ctrl_changes();
        self.publish_event_output();

        if let Some(worker) = &self.worker {
            worker.end_run();
        }
    }

    fn process_events(&mut self, events: &api::Events) -> isize {
        for &ev in events.events_raw() {
            let ev = unsafe { &*ev };
            if ev.event_type != api::EventType::Midi {
                continue;
            }
            let mev = unsafe { &*(ev as *const api::Event as *const api::MidiEvent) };
            if self.midi_buffer.write_space() > 0 {
                self.midi_buffer.write(&[*mev]);
            }
        }
        0
    }

    fn set_parameter(&mut self, index: i32, value: f32) -> bool {
        let p = match self.param_port(index) {
            Some(p) => p,
            None => return false,
        };
        let val = self.desc.ports[p].to_lv2(value);
        if self.ports[p] == val {
            return false;
        }
        self.ports[p] = val;
        if self.ui.is_open() && self.ctrl_to_ui.write_space() > 0 {
            self.ctrl_to_ui.write(&[ParamChange {
                port: p as u32,
                value: val,
            }]);
        }
        true
    }

    fn get_parameter(&self, index: i32) -> f32 {
        match self.param_port(index) {
            Some(p) => self.desc.ports[p].to_vst(self.ports[p]),
            None => 0.0,
        }
    }

    fn parameter_name(&self, index: i32) -> String {
        self.param_port(index)
            .map(|p| self.desc.ports[p].name.clone())
            .unwrap_or_default()
    }

    fn parameter_display(&self, index: i32) -> String {
        match self.param_port(index) {
            Some(p) => {
                let mut v = self.ports[p];
                if self.desc.ports[p].sr_dependent {
                    v *= self.sample_rate;
                }
                format!("{:.2}", v)
            }
            None => String::new(),
        }
    }

    fn parameter_label(&self, index: i32) -> String {
        self.param_port(index)
            .map(|p| self.desc.ports[p].doc.clone())
            .unwrap_or_default()
    }

    fn parameter_properties(&self, index: i32, props: &mut api::ParameterProperties) -> bool {
        let p = match self.param_port(index) {
            Some(p) => p,
            None => return false,
        };
        let port = &self.desc.ports[p];

        let mut flags = api::ParameterFlags::SUPPORTS_DISPLAY_INDEX;
        props.display_index = index as i16;

        if port.toggled {
            flags |= api::ParameterFlags::IS_SWITCH;
        }
        if port.integer_step {
            flags |= api::ParameterFlags::USES_INT_STEP | api::ParameterFlags::USES_INTEGER_MIN_MAX;
            props.step_integer = 1;
            props.large_step_integer = 1;
            props.min_integer = port.min as i32;
            props.max_integer = port.max as i32;
        } else {
            flags |= api::ParameterFlags::USES_FLOAT_STEP | api::ParameterFlags::CAN_RAMP;
            props.step_float = 1.0 / port.steps;
            props.small_step_float = props.step_float / 2.0;
            props.large_step_float = (props.step_float * 5.0).min(1.0);
        }
        props.flags = flags.bits();

        copy_to_buf(&mut props.label, &port.doc);
        copy_to_buf(&mut props.short_label, &port.name);
        true
    }

    fn can_be_automated(&self, index: i32) -> bool {
        match self.param_port(index) {
            Some(p) => !self.desc.ports[p].not_automatic,
            None => false,
        }
    }

    fn set_sample_rate(&mut self, rate: f32) {
        if self.sample_rate == rate {
            return;
        }
        debug!("sample rate {} -> {}, re-instantiating", self.sample_rate, rate);
        self.sample_rate = rate;
        self.deinit();
        if let Err(e) = self.init() {
            warn!("re-initialization failed: {}", e);
        }
    }

    fn set_block_size(&mut self, size: i64) {
        if self.block_size as i64 == size {
            return;
        }
        self.block_size = size as i32;
        self.opt_values.block_size = self.block_size;
        if self.opts_iface.is_null() {
            return;
        }
        if let Some(set) = unsafe { (*self.opts_iface).set } {
            let option = [
                Lv2OptionsOption {
                    context: LV2_OPTIONS_INSTANCE,
                    subject: 0,
                    key: self.map.map(uri::BUF_SIZE_NOMINAL_BLOCK),
                    size: 4,
                    type_: self.map.map(uri::ATOM_INT),
                    value: &self.opt_values.block_size as *const i32 as *const c_void,
                },
                Lv2OptionsOption {
                    context: LV2_OPTIONS_INSTANCE,
                    subject: 0,
                    key: 0,
                    size: 0,
                    type_: 0,
                    value: std::ptr::null(),
                },
            ];
            unsafe { set(self.instance, option.as_ptr()) };
        }
    }

    fn resume(&mut self) {
        if self.active {
            return;
        }
        if let Some(fns) = self.fns {
            if let Some(activate) = fns.activate {
                unsafe { activate(self.instance) };
            }
        }
        if let Some(worker) = &self.worker {
            worker.set_freewheeling(self.host.process_level() == ProcessLevel::Offline);
        }
        if self.desc.counts.midi_in > 0 {
            self.host.want_midi();
        }
        self.active = true;
    }

    fn suspend(&mut self) {
        if !self.active {
            return;
        }
        if let Some(fns) = self.fns {
            if let Some(deactivate) = fns.deactivate {
                unsafe { deactivate(self.instance) };
            }
        }
        self.active = false;
    }

    fn get_chunk(&mut self, _is_preset: bool) -> &[u8] {
        let mut data = StateData::default();
        for p in 0..self.desc.counts.total as usize {
            if self.desc.ports[p].kind != PortKind::ControlIn {
                continue;
            }
            data.values.push(PortValue {
                value: self.ports[p],
                symbol: self.desc.ports[p].symbol.clone(),
            });
        }

        let iface = self.state_iface();
        if !iface.is_null() {
            if let Some(save) = unsafe { (*iface).save } {
                let status = unsafe {
                    save(
                        self.instance,
                        state::store_callback,
                        &mut data as *mut StateData as *mut c_void,
                        0,
                        std::ptr::null(),
                    )
                };
                if status != crate::lv2::LV2_STATE_SUCCESS {
                    warn!("plugin state save returned {}", status);
                }
            }
        }

        self.state_chunk = state::serialize(&data, &self.map);
        &self.state_chunk
    }

    fn set_chunk(&mut self, data: &[u8], _is_preset: bool) -> isize {
        let parsed = match state::unserialize(data, &self.map) {
            Some(s) => s,
            None => {
                warn!("failed to de-serialize state chunk ({} bytes)", data.len());
                return 0;
            }
        };

        for pv in &parsed.values {
            for p in 0..self.desc.counts.total as usize {
                if self.desc.ports[p].kind != PortKind::ControlIn
                    || self.desc.ports[p].symbol != pv.symbol
                    || self.ports[p] == pv.value
                {
                    continue;
                }
                self.ports[p] = pv.value;
                if self.ui.is_open() && self.ctrl_to_ui.write_space() > 0 {
                    self.ctrl_to_ui.write(&[ParamChange {
                        port: p as u32,
                        value: pv.value,
                    }]);
                }
                let vst_index = self.portmap_ctrl[p];
                if vst_index != PORT_NONE {
                    let normalized = self.desc.ports[p].to_vst(pv.value);
                    self.host.automate(vst_index as i32, normalized);
                }
            }
        }

        let iface = self.state_iface();
        if !iface.is_null() {
            if let Some(restore) = unsafe { (*iface).restore } {
                unsafe {
                    restore(
                        self.instance,
                        state::retrieve_callback,
                        &parsed as *const StateData as *mut StateData as *mut c_void,
                        0,
                        std::ptr::null(),
                    );
                }
            }
        }
        1
    }

    fn can_do(&self, what: &str) -> isize {
        match what {
            "receiveVstEvents" | "receiveVstMidiEvent" => (self.desc.counts.midi_in > 0) as isize,
            "sendVstEvents" | "sendVstMidiEvent" => (self.desc.counts.midi_out > 0) as isize,
            "receiveVstTimeInfo" => self.desc.send_time_info as isize,
            "bypass" => self.desc.enable_ctrl_port.is_some() as isize,
            #[cfg(target_os = "macos")]
            "hasCockosViewAsConfig" => 0xbeef0000u32 as isize,
            _ => 0,
        }
    }

    fn bypass(&mut self, bypass: bool) -> isize {
        let port = match self.desc.enable_ctrl_port {
            Some(p) => p as usize,
            None => return 0,
        };
        let vst_index = self.portmap_ctrl[port];
        if vst_index == PORT_NONE {
            return 0;
        }
        let value = if bypass { 0.0 } else { 1.0 };
        self.set_parameter_automated(vst_index as i32, value);
        1
    }

    fn category(&self) -> Category {
        let c = &self.desc.counts;
        if c.audio_in == 0 && c.midi_in == 0 {
            return Category::Generator;
        }
        if c.audio_in == 0 && c.midi_in > 0 && c.audio_out > 0 {
            return Category::Synth;
        }
        if c.audio_in > 0 && c.audio_out > 0 {
            return Category::Effect;
        }
        Category::Unknown
    }

    fn effect_name(&self) -> String {
        self.desc.name.clone()
    }

    fn vendor_string(&self) -> String {
        self.desc.vendor.clone()
    }

    fn edit_rect(&mut self) -> Option<*mut api::Rect> {
        self.ui.get_rect()
    }

    fn edit_open(&mut self, window: *mut c_void) -> bool {
        if !self.ui.has_editor() {
            return false;
        }
        let controller = self as *mut Bridge as *mut c_void;
        let instance = self.instance;
        let sample_rate = self.sample_rate;
        let scale = self.ui_scale;
        let opened = self.ui.open(controller, window, instance, sample_rate, scale);
        if opened {
            // prime the UI with the initial port values
            self.edit_idle();
            self.edit_idle();
        }
        opened
    }

    fn edit_close(&mut self) {
        self.ui.close();
    }

    fn edit_idle(&mut self) {
        if !self.ui.is_open() {
            return;
        }

        let mut pv = [ParamChange::default()];
        while self.ctrl_to_ui.read(&mut pv) == 1 {
            // port_event may call back into ui_write_to_dsp for this very
            // port; the guard keeps the value from bouncing.
            self.ui.recursion = pv[0].port;
            unsafe {
                self.ui.port_event(
                    pv[0].port,
                    4,
                    0,
                    &pv[0].value as *const f32 as *const c_void,
                );
            }
            self.ui.recursion = PORT_NONE;
        }

        let port = self.port_event_out;
        if port != PORT_NONE {
            loop {
                if self.atom_to_ui.read_space() <= ATOM_HEADER {
                    break;
                }
                let mut framing = [0u8; ATOM_HEADER];
                self.atom_to_ui.read(&mut framing);
                let size = u32::from_ne_bytes(framing[0..4].try_into().unwrap()) as usize;
                if size > self.ui.atombuf.capacity() {
                    self.atom_to_ui.skip(size);
                    continue;
                }
                if self.atom_to_ui.read(&mut self.ui.atombuf.raw_mut()[..size]) < size {
                    break;
                }
                let format = self.ui.urid_event_transfer;
                let mut events: Vec<(usize, usize)> = Vec::new();
                {
                    let raw = self.ui.atombuf.raw().as_ptr() as usize;
                    for (ev, data) in self.ui.atombuf.events() {
                        let off = data.as_ptr() as usize - raw;
                        events.push((off, ev.body.size as usize));
                    }
                }
                for (off, len) in events {
                    // port_event receives the event's atom: size is the
                    // body, the buffer starts at the atom header.
                    let atom_ptr =
                        unsafe { self.ui.atombuf.raw().as_ptr().add(off - ATOM_HEADER) };
                    unsafe {
                        self.ui
                            .port_event(port, len as u32, format, atom_ptr as *const c_void);
                    }
                }
            }
        }

        self.ui.run_idle_interface();
    }

    fn set_ui_scale(&mut self, scale: f32) {
        self.ui_scale = scale;
    }

    fn num_params(&self) -> i32 {
        self.num_params
    }

    fn num_inputs(&self) -> i32 {
        self.desc.counts.audio_in as i32
    }

    fn num_outputs(&self) -> i32 {
        self.desc.counts.audio_out as i32
    }

    fn unique_id(&self) -> i32 {
        self.desc.id as i32
    }

    fn version(&self) -> i32 {
        100 * self.desc.version_minor + self.desc.version_micro
    }

    fn flags(&self) -> api::PluginFlags {
        let mut flags = api::PluginFlags::CAN_REPLACING;
        if self.desc.has_state_interface {
            flags |= api::PluginFlags::PROGRAM_CHUNKS;
        }
        if self.ui.has_editor() {
            flags |= api::PluginFlags::HAS_EDITOR;
        }
        if self.category() == Category::Synth {
            flags |= api::PluginFlags::IS_SYNTH;
        }
        flags
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.deinit();
    }
}

/// The LV2 UI write function; `controller` is the owning bridge.
pub(crate) unsafe extern "C" fn ui_write_callback(
    controller: *mut c_void,
    port_index: u32,
    buffer_size: u32,
    protocol: u32,
    buffer: *const c_void,
) {
    if controller.is_null() || buffer.is_null() {
        return;
    }
    let bridge = &mut *(controller as *mut Bridge);
    bridge.ui_write_to_dsp(port_index, buffer_size, protocol, buffer);
}

/// NUL-pad `src` into a fixed C char buffer, always leaving a terminator.
pub(crate) fn copy_to_buf(dst: &mut [u8], src: &str) {
    dst.fill(0);
    let n = src.len().min(dst.len() - 1);
    dst[..n].copy_from_slice(&src.as_bytes()[..n]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_change_records_are_compact() {
        // the control ring carries plain {port, value} records
        assert_eq!(std::mem::size_of::<ParamChange>(), 8);
    }

    #[test]
    fn copy_to_buf_truncates_and_terminates() {
        let mut buf = [0xffu8; 8];
        copy_to_buf(&mut buf, "Frequency");
        assert_eq!(&buf[..7], b"Frequen");
        assert_eq!(buf[7], 0);

        let mut buf = [0xffu8; 8];
        copy_to_buf(&mut buf, "Hz");
        assert_eq!(&buf[..3], b"Hz\0");
        assert_eq!(buf[7], 0);
    }
}
