//! Hosting of the plugin's native LV2 UI behind the VST editor opcodes.
//!
//! The editor loads the UI shared library picked by the resolver, embeds the
//! widget into the host-provided parent window and shuttles data through the
//! bridge's rings: `ctrl_to_ui` and `atom_to_ui` are drained on every
//! `effEditIdle`, UI writes land in `atom_from_ui` or in the automated
//! parameter path. The actual drain loops live on the bridge
//! (`Bridge::edit_idle`), which owns both ends of the plumbing.

use std::ffi::CString;
use std::os::raw::{c_int, c_void};
use std::sync::Arc;

use libloading::Library;
use log::{debug, warn};

use crate::api::Rect;
use crate::atom::SequenceBuffer;
use crate::bridge::Bridge;
use crate::descriptor::PluginDescriptor;
use crate::lv2::{
    uri, LV2Feature, LV2UridMap, LV2UridUnmap, Lv2Handle, Lv2OptionsOption, Lv2UiDescriptor,
    Lv2UiHandle, Lv2UiIdleInterface, Lv2UiResize, Lv2UiWidget, Lv2UiDescriptorFn,
    LV2_OPTIONS_INSTANCE,
};
use crate::uri_map::UriMap;

/// Option values pinned on the heap; the UI may hold pointers to them for
/// its whole lifetime.
struct UiOptionValues {
    sample_rate: f32,
    scale_factor: f32,
}

/// The bridge's editor: inert when the plugin has no (loadable) native UI.
pub struct Editor {
    desc: Arc<PluginDescriptor>,
    /// Keeps the interner behind the `urid_map`/`urid_unmap` payloads alive.
    _map: Arc<UriMap>,

    /// Keeps the UI binary mapped; dropped last.
    _lib: Option<Library>,
    descriptor: *const Lv2UiDescriptor,
    instance: Lv2UiHandle,
    widget: Lv2UiWidget,
    idle_iface: *const Lv2UiIdleInterface,

    rect: Rect,

    /// Scratch sequence the idle loop copies atom transfers into.
    pub(crate) atombuf: SequenceBuffer,
    /// Port currently being delivered via `port_event`; a UI writing that
    /// same port back from inside its handler is suppressed.
    pub(crate) recursion: u32,
    /// URID of `atom:eventTransfer`, the port-event format for sequences.
    pub(crate) urid_event_transfer: u32,

    urid_map: Box<LV2UridMap>,
    urid_unmap: Box<LV2UridUnmap>,
    resize: Box<Lv2UiResize>,
    opt_values: Box<UiOptionValues>,
    options: Box<[Lv2OptionsOption; 3]>,
}

impl Editor {
    /// Probe and load the UI library named by the descriptor. An unloadable
    /// UI leaves an inert editor; the DSP side is unaffected.
    pub fn new(desc: Arc<PluginDescriptor>, map: Arc<UriMap>) -> Editor {
        let atombuf = SequenceBuffer::new(desc.min_atom_bufsiz as usize + 8);
        let urid_event_transfer = map.map(uri::ATOM_EVENT_TRANSFER);
        let urid_float = map.map(uri::ATOM_FLOAT);
        let urid_param_sample_rate = map.map(uri::PARAM_SAMPLE_RATE);
        let urid_scale_factor = map.map(uri::UI_SCALE_FACTOR);

        let urid_map = Box::new(map.as_urid_map());
        let urid_unmap = Box::new(map.as_urid_unmap());
        let resize = Box::new(Lv2UiResize {
            handle: std::ptr::null_mut(),
            ui_resize: Some(ui_resize_callback),
        });
        let opt_values = Box::new(UiOptionValues {
            sample_rate: 48000.0,
            scale_factor: 1.0,
        });
        let options = Box::new([
            Lv2OptionsOption {
                context: LV2_OPTIONS_INSTANCE,
                subject: 0,
                key: urid_param_sample_rate,
                size: 4,
                type_: urid_float,
                value: &opt_values.sample_rate as *const f32 as *const c_void,
            },
            Lv2OptionsOption {
                context: LV2_OPTIONS_INSTANCE,
                subject: 0,
                key: urid_scale_factor,
                size: 4,
                type_: urid_float,
                value: &opt_values.scale_factor as *const f32 as *const c_void,
            },
            Lv2OptionsOption {
                context: LV2_OPTIONS_INSTANCE,
                subject: 0,
                key: 0,
                size: 0,
                type_: 0,
                value: std::ptr::null(),
            },
        ]);

        let mut editor = Editor {
            desc,
            _map: map,
            _lib: None,
            descriptor: std::ptr::null(),
            instance: std::ptr::null_mut(),
            widget: std::ptr::null_mut(),
            idle_iface: std::ptr::null(),
            rect: Rect {
                top: 0,
                left: 0,
                bottom: 100,
                right: 100,
            },
            atombuf,
            recursion: crate::bridge::PORT_NONE,
            urid_event_transfer,
            urid_map,
            urid_unmap,
            resize,
            opt_values,
            options,
        };
        editor.load();
        editor
    }

    fn load(&mut self) {
        let (gui_path, gui_uri) = match (&self.desc.gui_path, &self.desc.gui_uri) {
            (Some(p), Some(u)) => (p.clone(), u.clone()),
            _ => return,
        };
        let lib = match unsafe { Library::new(&gui_path) } {
            Ok(lib) => lib,
            Err(e) => {
                warn!("cannot open UI library {}: {}", gui_path.display(), e);
                return;
            }
        };
        let entry: Lv2UiDescriptorFn = match unsafe { lib.get(b"lv2ui_descriptor\0") } {
            Ok(sym) => *sym,
            Err(e) => {
                warn!("no lv2ui_descriptor in {}: {}", gui_path.display(), e);
                return;
            }
        };

        let mut index = 0;
        loop {
            let d = unsafe { entry(index) };
            if d.is_null() {
                warn!("UI descriptor '{}' not found in its library", gui_uri);
                return;
            }
            let d_uri = unsafe { std::ffi::CStr::from_ptr((*d).uri) };
            if d_uri.to_str() == Ok(gui_uri.as_str()) {
                self.descriptor = d;
                break;
            }
            index += 1;
        }
        self._lib = Some(lib);
    }

    /// Whether a UI descriptor was resolved; decides `effFlagsHasEditor`.
    pub fn has_editor(&self) -> bool {
        !self.descriptor.is_null()
    }

    /// Whether the UI widget currently exists.
    pub fn is_open(&self) -> bool {
        !self.instance.is_null()
    }

    /// The current editor bounds, once a widget exists.
    pub fn get_rect(&mut self) -> Option<*mut Rect> {
        if self.is_open() {
            Some(&mut self.rect)
        } else {
            None
        }
    }

    /// Record a new widget size. The host is notified by the bridge.
    pub fn set_size(&mut self, width: i32, height: i32) {
        self.rect = Rect {
            top: 0,
            left: 0,
            bottom: height as i16,
            right: width as i16,
        };
    }

    /// Instantiate the UI inside `parent`. `controller` is the owning
    /// bridge; it receives write-function and resize callbacks.
    pub fn open(
        &mut self,
        controller: *mut c_void,
        parent: *mut c_void,
        dsp_instance: Lv2Handle,
        sample_rate: f32,
        scale_factor: f32,
    ) -> bool {
        if self.descriptor.is_null() || !self.instance.is_null() {
            return false;
        }
        let instantiate = match unsafe { (*self.descriptor).instantiate } {
            Some(f) => f,
            None => return false,
        };

        self.opt_values.sample_rate = sample_rate;
        self.opt_values.scale_factor = scale_factor;
        self.resize.handle = controller;

        let plugin_uri = match CString::new(self.desc.dsp_uri.as_str()) {
            Ok(s) => s,
            Err(_) => return false,
        };
        let bundle = match CString::new(format!("{}/", self.desc.bundle_path.display())) {
            Ok(s) => s,
            Err(_) => return false,
        };

        let uri_map_c = CString::new(uri::URID_MAP).unwrap_or_default();
        let uri_unmap_c = CString::new(uri::URID_UNMAP).unwrap_or_default();
        let uri_resize_c = CString::new(uri::UI_RESIZE).unwrap_or_default();
        let uri_parent_c = CString::new(uri::UI_PARENT).unwrap_or_default();
        let uri_instance_c = CString::new(uri::INSTANCE_ACCESS).unwrap_or_default();
        let uri_options_c = CString::new(uri::OPTIONS_OPTIONS).unwrap_or_default();

        let map_feature = LV2Feature {
            uri: uri_map_c.as_ptr(),
            data: &*self.urid_map as *const LV2UridMap as *mut c_void,
        };
        let unmap_feature = LV2Feature {
            uri: uri_unmap_c.as_ptr(),
            data: &*self.urid_unmap as *const LV2UridUnmap as *mut c_void,
        };
        let resize_feature = LV2Feature {
            uri: uri_resize_c.as_ptr(),
            data: &*self.resize as *const Lv2UiResize as *mut c_void,
        };
        let parent_feature = LV2Feature {
            uri: uri_parent_c.as_ptr(),
            data: parent,
        };
        let instance_feature = LV2Feature {
            uri: uri_instance_c.as_ptr(),
            data: dsp_instance,
        };
        let options_feature = LV2Feature {
            uri: uri_options_c.as_ptr(),
            data: self.options.as_ptr() as *mut c_void,
        };

        let features: [*const LV2Feature; 7] = [
            &map_feature,
            &unmap_feature,
            &resize_feature,
            &parent_feature,
            &instance_feature,
            &options_feature,
            std::ptr::null(),
        ];

        self.widget = std::ptr::null_mut();
        self.instance = unsafe {
            instantiate(
                self.descriptor,
                plugin_uri.as_ptr(),
                bundle.as_ptr(),
                Some(crate::bridge::ui_write_callback),
                controller,
                &mut self.widget,
                features.as_ptr(),
            )
        };
        if self.instance.is_null() {
            warn!("UI instantiation failed for '{}'", self.desc.dsp_uri);
            return false;
        }

        self.idle_iface = std::ptr::null();
        if let Some(extension_data) = unsafe { (*self.descriptor).extension_data } {
            let uri_idle_c = CString::new(uri::UI_IDLE_INTERFACE).unwrap_or_default();
            self.idle_iface =
                unsafe { extension_data(uri_idle_c.as_ptr()) } as *const Lv2UiIdleInterface;
        }
        debug!("UI '{}' open", self.desc.gui_uri.as_deref().unwrap_or(""));
        true
    }

    /// Tear the widget down; the library stays loaded for a later reopen.
    pub fn close(&mut self) {
        if self.instance.is_null() {
            return;
        }
        if let Some(cleanup) = unsafe { (*self.descriptor).cleanup } {
            unsafe { cleanup(self.instance) };
        }
        self.instance = std::ptr::null_mut();
        self.widget = std::ptr::null_mut();
        self.idle_iface = std::ptr::null();
    }

    /// Deliver one port event to the UI.
    ///
    /// # Safety
    /// `buffer` must point at `buffer_size` readable bytes; must only be
    /// called with an open UI.
    pub unsafe fn port_event(
        &mut self,
        port_index: u32,
        buffer_size: u32,
        format: u32,
        buffer: *const c_void,
    ) {
        if let Some(port_event) = (*self.descriptor).port_event {
            port_event(self.instance, port_index, buffer_size, format, buffer);
        }
    }

    /// Run the UI's own idle interface, if it exposes one.
    pub fn run_idle_interface(&mut self) {
        if self.instance.is_null() || self.idle_iface.is_null() {
            return;
        }
        if let Some(idle) = unsafe { (*self.idle_iface).idle } {
            unsafe {
                idle(self.instance);
            }
        }
    }
}

impl Drop for Editor {
    fn drop(&mut self) {
        self.close();
    }
}

/// `ui:resize` entry: the UI asks for a new widget size; `handle` is the
/// owning bridge.
unsafe extern "C" fn ui_resize_callback(handle: *mut c_void, width: c_int, height: c_int) -> c_int {
    if handle.is_null() {
        return 1;
    }
    let bridge = &mut *(handle as *mut Bridge);
    bridge.ui_set_size(width, height);
    0
}
