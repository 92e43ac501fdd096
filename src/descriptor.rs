//! Plugin description: the compact in-memory record the bridge runs from,
//! resolved out of an LV2 bundle's RDF data, plus the stable 32 bit identity
//! VST hosts know the plugin by.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::lv2::uri;

/// Direction and data type of an LV2 port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortKind {
    /// Float control input; candidate for a VST parameter slot.
    ControlIn,
    /// Float control output (latency, meters).
    ControlOut,
    /// Audio (or CV) input.
    AudioIn,
    /// Audio (or CV) output.
    AudioOut,
    /// Atom input that supports `midi:MidiEvent`.
    MidiIn,
    /// Atom output that supports `midi:MidiEvent`.
    MidiOut,
    /// Generic atom input.
    AtomIn,
    /// Generic atom output.
    AtomOut,
}

/// LV2 plugin class, from `rdf:type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PluginCategory {
    /// No recognized class.
    Uncategorized,
    /// `lv2:AnalyserPlugin`.
    Analyser,
    /// `lv2:InstrumentPlugin`.
    Instrument,
    /// `lv2:OscillatorPlugin`.
    Oscillator,
    /// `lv2:SpatialPlugin`.
    Spatial,
}

/// One port of the plugin, with everything the bridge needs to map it onto
/// a VST parameter.
#[derive(Clone, Debug)]
pub struct Port {
    /// Direction and data type.
    pub kind: PortKind,
    /// Human readable name.
    pub name: String,
    /// Stable symbol, used to match state chunks.
    pub symbol: String,
    /// `rdfs:comment`, used as the VST parameter label.
    pub doc: String,

    /// Default value.
    pub default: f32,
    /// Minimum value.
    pub min: f32,
    /// Maximum value.
    pub max: f32,
    /// Number of quantization steps for the normalized VST value.
    pub steps: f32,

    /// The port is an on/off switch.
    pub toggled: bool,
    /// Values are integers.
    pub integer_step: bool,
    /// The useful range is logarithmic.
    pub logarithmic: bool,
    /// Values are multiples of the sample rate.
    pub sr_dependent: bool,
    /// Values pick from scale points.
    pub enumeration: bool,
    /// Hidden from generic UIs; gets no VST parameter slot.
    pub not_on_gui: bool,
    /// Not suited for automation; gets no VST parameter slot.
    pub not_automatic: bool,
}

impl Default for Port {
    fn default() -> Port {
        Port {
            kind: PortKind::ControlIn,
            name: String::new(),
            symbol: String::new(),
            doc: String::new(),
            default: 0.0,
            min: 0.0,
            max: 1.0,
            steps: 100.0,
            toggled: false,
            integer_step: false,
            logarithmic: false,
            sr_dependent: false,
            enumeration: false,
            not_on_gui: false,
            not_automatic: false,
        }
    }
}

impl Port {
    /// Map an LV2 port value to the normalized `[0, 1]` VST range.
    pub fn to_vst(&self, value: f32) -> f32 {
        if self.toggled {
            return if value > 0.0 { 1.0 } else { 0.0 };
        }
        let v = if self.integer_step { value.round() } else { value };
        if self.logarithmic {
            let v = v.clamp(self.min, self.max);
            (v / self.min).ln() / (self.max / self.min).ln()
        } else {
            (v - self.min) / (self.max - self.min)
        }
    }

    /// Map a normalized `[0, 1]` VST value back to the LV2 range, quantized
    /// to `steps`.
    pub fn to_lv2(&self, value: f32) -> f32 {
        let v = (self.steps * value).round() / self.steps;
        let out = if self.toggled {
            if v >= 0.5 {
                1.0
            } else {
                0.0
            }
        } else if self.logarithmic {
            let v = v.clamp(0.0, 1.0);
            self.min * (self.max / self.min).powf(v)
        } else {
            self.min + v * (self.max - self.min)
        };
        if self.integer_step {
            out.round()
        } else {
            out
        }
    }
}

/// Counts of ports per kind.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PortCounts {
    pub total: u32,
    pub audio_in: u32,
    pub audio_out: u32,
    pub midi_in: u32,
    pub midi_out: u32,
    pub atom_in: u32,
    pub atom_out: u32,
    pub ctrl_in: u32,
    pub ctrl_out: u32,
}

impl PortCounts {
    /// Control ports of both directions.
    pub fn ctrl(&self) -> u32 {
        self.ctrl_in + self.ctrl_out
    }

    /// Event (MIDI or atom) input ports.
    pub fn event_in(&self) -> u32 {
        self.midi_in + self.atom_in
    }

    /// Event (MIDI or atom) output ports.
    pub fn event_out(&self) -> u32 {
        self.midi_out + self.atom_out
    }
}

/// The resolved description of one LV2 plugin, owned by the bridge for its
/// whole lifetime.
#[derive(Clone, Debug, Default)]
pub struct PluginDescriptor {
    /// Plugin URI.
    pub dsp_uri: String,
    /// URI of the selected native UI, if any.
    pub gui_uri: Option<String>,

    /// VST unique id: `CRC32(dsp_uri) & 0x7f7f7f7f`.
    pub id: u32,

    /// Plugin name.
    pub name: String,
    /// Author name.
    pub vendor: String,

    /// Bundle directory (the UI's bundle when a UI was selected).
    pub bundle_path: PathBuf,
    /// DSP shared library.
    pub dsp_path: PathBuf,
    /// UI shared library, if a native UI was selected.
    pub gui_path: Option<PathBuf>,

    /// `lv2:minorVersion`.
    pub version_minor: i32,
    /// `lv2:microVersion`.
    pub version_micro: i32,

    /// All ports, indexed by LV2 port index.
    pub ports: Vec<Port>,
    /// Port counts per kind.
    pub counts: PortCounts,

    /// Atom buffer capacity: at least 8192, raised by
    /// `resize-port:minimumSize`.
    pub min_atom_bufsiz: u32,
    /// Control output carrying `lv2:reportsLatency`.
    pub latency_ctrl_port: Option<u32>,
    /// Input port designated `lv2:enabled` (bypass).
    pub enable_ctrl_port: Option<u32>,

    /// An atom input supports `time:Position`; the bridge forges transport
    /// info for it.
    pub send_time_info: bool,
    /// The plugin implements `state:interface`.
    pub has_state_interface: bool,

    /// LV2 plugin class.
    pub category: PluginCategory,
}

impl Default for PluginCategory {
    fn default() -> Self {
        PluginCategory::Uncategorized
    }
}

/// Why a plugin could not be resolved into a `PluginDescriptor`.
#[derive(Debug)]
pub enum ResolveError {
    /// No plugin with the given URI or id in the loaded world.
    NotFound(String),
    /// The plugin requires a feature the bridge does not provide.
    UnsupportedFeature(String),
    /// The plugin requires an option the bridge does not provide.
    UnsupportedOption(String),
    /// A port could not be classified.
    BadPort(u32),
    /// The DSP library could not be opened or lacks `lv2_descriptor`.
    DspLibrary(String),
    /// The plugin shape is outside what the bridge supports (no ports, no
    /// name, more than one event port per direction).
    Unsupported(&'static str),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NotFound(uri) => write!(f, "plugin not found: {}", uri),
            ResolveError::UnsupportedFeature(uri) => {
                write!(f, "unsupported required feature: {}", uri)
            }
            ResolveError::UnsupportedOption(uri) => {
                write!(f, "unsupported required option: {}", uri)
            }
            ResolveError::BadPort(index) => write!(f, "cannot classify port #{}", index),
            ResolveError::DspLibrary(path) => {
                write!(f, "cannot open DSP library: {}", path)
            }
            ResolveError::Unsupported(what) => write!(f, "unsupported plugin ({})", what),
        }
    }
}

impl std::error::Error for ResolveError {}

/// CRC-32 (polynomial 0xEDB88320, reflected, init and final-xor all-ones).
pub(crate) fn crc32(msg: &str) -> u32 {
    let mut crc: u32 = 0xffff_ffff;
    for &byte in msg.as_bytes() {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xedb8_8320 & mask);
        }
    }
    !crc
}

/// The stable VST unique id of a plugin URI. The top bit of every byte is
/// cleared; some VST hosts reject ids with bytes above 0x7f.
pub fn uri_to_id(plugin_uri: &str) -> u32 {
    crc32(plugin_uri) & 0x7f7f7f7f
}

/// Strip the scheme off a `file://` URI. Plain paths pass through.
fn file_uri_to_path(uri: &str) -> PathBuf {
    let path = uri
        .strip_prefix("file://")
        .map(|rest| {
            // file://host/path is not produced by lilv; a bare authority
            // reduces to the path component.
            rest.to_string()
        })
        .unwrap_or_else(|| uri.to_string());
    PathBuf::from(path)
}

/// Check that `lib` exports `symbol`; the way to know early whether a binary
/// will actually load in this process.
fn probe_library(lib: &Path, symbol: &[u8]) -> bool {
    match unsafe { libloading::Library::new(lib) } {
        Ok(lib) => unsafe { lib.get::<*const std::os::raw::c_void>(symbol).is_ok() },
        Err(e) => {
            debug!("cannot open {}: {}", lib.display(), e);
            false
        }
    }
}

/// The loaded RDF world plus the vocabulary nodes the parser matches
/// against.
pub struct Resolver {
    world: lilv::World,

    input_port: lilv::node::Node,
    output_port: lilv::node::Node,
    control_port: lilv::node::Node,
    audio_port: lilv::node::Node,
    cv_port: lilv::node::Node,
    atom_port: lilv::node::Node,

    atom_supports: lilv::node::Node,
    midi_event: lilv::node::Node,
    time_position: lilv::node::Node,
    minimum_size: lilv::node::Node,
    rdfs_comment: lilv::node::Node,
    rdf_type: lilv::node::Node,

    reports_latency: lilv::node::Node,
    toggled: lilv::node::Node,
    integer: lilv::node::Node,
    sample_rate: lilv::node::Node,
    enumeration: lilv::node::Node,
    logarithmic: lilv::node::Node,
    range_steps: lilv::node::Node,
    not_on_gui: lilv::node::Node,
    expensive: lilv::node::Node,
    causes_artifacts: lilv::node::Node,
    not_automatic: lilv::node::Node,
    enabled: lilv::node::Node,
    minor_version: lilv::node::Node,
    micro_version: lilv::node::Node,
    required_option: lilv::node::Node,
}

/// Required features the bridge provides to every plugin.
const SUPPORTED_FEATURES: &[&str] = &[
    uri::URID_MAP,
    uri::URID_UNMAP,
    uri::WORKER_SCHEDULE,
    uri::OPTIONS_OPTIONS,
    uri::BUF_SIZE_BOUNDED,
];

/// Required options the bridge provides to every plugin.
const SUPPORTED_OPTIONS: &[&str] = &[
    uri::PARAM_SAMPLE_RATE,
    uri::BUF_SIZE_MIN_BLOCK,
    uri::BUF_SIZE_MAX_BLOCK,
    uri::BUF_SIZE_SEQUENCE_SIZE,
];

impl Resolver {
    /// Load the given bundle directories into a fresh world; with no bundles
    /// the system-wide LV2 world is loaded instead.
    pub fn new(bundles: &[PathBuf]) -> Resolver {
        let world = lilv::World::new();

        let mut loaded = 0;
        for bundle in bundles {
            let dir = format!("file://{}/", bundle.display());
            let node = world.new_uri(&dir);
            world.load_bundle(&node);
            loaded += 1;
        }
        if loaded == 0 {
            world.load_all();
        }

        Resolver {
            input_port: world.new_uri(uri::INPUT_PORT),
            output_port: world.new_uri(uri::OUTPUT_PORT),
            control_port: world.new_uri(uri::CONTROL_PORT),
            audio_port: world.new_uri(uri::AUDIO_PORT),
            cv_port: world.new_uri(uri::CV_PORT),
            atom_port: world.new_uri(uri::ATOM_PORT),

            atom_supports: world.new_uri(uri::ATOM_SUPPORTS),
            midi_event: world.new_uri(uri::MIDI_EVENT),
            time_position: world.new_uri(uri::TIME_POSITION),
            minimum_size: world.new_uri(uri::RESIZE_PORT_MINIMUM_SIZE),
            rdfs_comment: world.new_uri(uri::RDFS_COMMENT),
            rdf_type: world.new_uri(uri::RDF_TYPE),

            reports_latency: world.new_uri(uri::CORE_REPORTS_LATENCY),
            toggled: world.new_uri(uri::CORE_TOGGLED),
            integer: world.new_uri(uri::CORE_INTEGER),
            sample_rate: world.new_uri(uri::CORE_SAMPLE_RATE),
            enumeration: world.new_uri(uri::CORE_ENUMERATION),
            logarithmic: world.new_uri(uri::PORT_PROPS_LOGARITHMIC),
            range_steps: world.new_uri(uri::PORT_PROPS_RANGE_STEPS),
            not_on_gui: world.new_uri(uri::PORT_PROPS_NOT_ON_GUI),
            expensive: world.new_uri(uri::PORT_PROPS_EXPENSIVE),
            causes_artifacts: world.new_uri(uri::PORT_PROPS_CAUSES_ARTIFACTS),
            not_automatic: world.new_uri(uri::PORT_PROPS_NOT_AUTOMATIC),
            enabled: world.new_uri(uri::CORE_ENABLED),
            minor_version: world.new_uri(uri::CORE_MINOR_VERSION),
            micro_version: world.new_uri(uri::CORE_MICRO_VERSION),
            required_option: world.new_uri(uri::OPTIONS_REQUIRED_OPTION),

            world,
        }
    }

    /// All `(uri, name)` pairs in the world, in world order. Used by the
    /// shell to enumerate sub-plugins.
    pub fn plugin_list(&self) -> Vec<(String, String)> {
        self.world
            .plugins()
            .iter()
            .filter_map(|p| {
                let uri = p.uri().as_uri()?.to_string();
                let name = p.name().as_str().unwrap_or("").to_string();
                Some((uri, name))
            })
            .collect()
    }

    /// Resolve a plugin by URI.
    pub fn resolve_by_uri(&self, plugin_uri: &str) -> Result<PluginDescriptor, ResolveError> {
        for plugin in self.world.plugins().iter() {
            if plugin.uri().as_uri() == Some(plugin_uri) {
                let desc = self.parse(&plugin)?;
                verify_support(&desc)?;
                return Ok(desc);
            }
        }
        Err(ResolveError::NotFound(plugin_uri.to_string()))
    }

    /// Resolve a plugin by its VST unique id: the first plugin in the world
    /// whose masked URI CRC matches.
    pub fn resolve_by_id(&self, id: u32) -> Result<PluginDescriptor, ResolveError> {
        for plugin in self.world.plugins().iter() {
            match plugin.uri().as_uri() {
                Some(uri) if uri_to_id(uri) == id => {
                    let desc = self.parse(&plugin)?;
                    verify_support(&desc)?;
                    return Ok(desc);
                }
                _ => continue,
            }
        }
        Err(ResolveError::NotFound(format!("id {:08x}", id)))
    }

    fn parse(&self, plugin: &lilv::plugin::Plugin) -> Result<PluginDescriptor, ResolveError> {
        let plugin_uri = plugin
            .uri()
            .as_uri()
            .ok_or_else(|| ResolveError::NotFound(String::new()))?
            .to_string();

        let mut desc = PluginDescriptor {
            id: uri_to_id(&plugin_uri),
            name: plugin.name().as_str().unwrap_or("").to_string(),
            vendor: plugin
                .author_name()
                .and_then(|n| n.as_str().map(String::from))
                .unwrap_or_default(),
            min_atom_bufsiz: 8192,
            ..PluginDescriptor::default()
        };

        desc.bundle_path = plugin
            .bundle_uri()
            .and_then(|n| n.as_uri().map(file_uri_to_path))
            .unwrap_or_default();
        desc.dsp_path = plugin
            .library_uri()
            .and_then(|n| n.as_uri().map(file_uri_to_path))
            .unwrap_or_default();

        if !probe_library(&desc.dsp_path, b"lv2_descriptor\0") {
            warn!("cannot open DSP '{}' for '{}'", desc.dsp_path.display(), plugin_uri);
            return Err(ResolveError::DspLibrary(
                desc.dsp_path.display().to_string(),
            ));
        }

        if let Some(nodes) = plugin.value(&self.minor_version) {
            if let Some(n) = nodes.iter().next() {
                desc.version_minor = n.as_int().unwrap_or(0);
            }
        }
        if let Some(nodes) = plugin.value(&self.micro_version) {
            if let Some(n) = nodes.iter().next() {
                desc.version_micro = n.as_int().unwrap_or(0);
            }
        }

        for feature in plugin.required_features().iter() {
            let f = feature.as_uri().unwrap_or("");
            if !SUPPORTED_FEATURES.contains(&f) {
                warn!("unsupported required feature '{}' in '{}'", f, plugin_uri);
                return Err(ResolveError::UnsupportedFeature(f.to_string()));
            }
        }

        if let Some(types) = plugin.value(&self.rdf_type) {
            for t in types.iter() {
                desc.category = match t.as_uri().unwrap_or("") {
                    uri::CLASS_ANALYSER => PluginCategory::Analyser,
                    uri::CLASS_INSTRUMENT => PluginCategory::Instrument,
                    uri::CLASS_OSCILLATOR => PluginCategory::Oscillator,
                    uri::CLASS_SPATIAL => PluginCategory::Spatial,
                    _ => continue,
                };
            }
        }

        let subject = self.world.new_uri(&plugin_uri);
        if let Some(options) = self
            .world
            .find_nodes(Some(&subject), &self.required_option, None)
        {
            for o in options.iter() {
                let ro = o.as_uri().unwrap_or("");
                if !SUPPORTED_OPTIONS.contains(&ro) {
                    warn!("unsupported required option '{}' in '{}'", ro, plugin_uri);
                    return Err(ResolveError::UnsupportedOption(ro.to_string()));
                }
            }
        }

        self.select_ui(plugin, &plugin_uri, &mut desc);

        if let Some(data) = plugin.extension_data() {
            for n in data.iter() {
                if n.as_uri() == Some(uri::STATE_INTERFACE) {
                    desc.has_state_interface = true;
                }
            }
        }

        self.parse_ports(plugin, &mut desc)?;

        if let Some(port) = plugin.port_by_designation(&self.input_port, &self.enabled) {
            desc.enable_ctrl_port = Some(port.index() as u32);
        }

        desc.dsp_uri = plugin_uri;
        Ok(desc)
    }

    /// Pick the first UI of the platform's native class, and re-root the
    /// bundle path to the UI's bundle. A UI binary that does not open (or
    /// does not export `lv2ui_descriptor`) only disables the editor.
    fn select_ui(
        &self,
        plugin: &lilv::plugin::Plugin,
        plugin_uri: &str,
        desc: &mut PluginDescriptor,
    ) {
        let native = self.world.new_uri(uri::UI_NATIVE);
        let uis = match plugin.uis() {
            Some(uis) => uis,
            None => return,
        };
        for ui in uis.iter() {
            if !ui.is_a(&native) {
                continue;
            }
            let gui_uri = match ui.uri().as_uri() {
                Some(u) => u.to_string(),
                None => continue,
            };
            let gui_path = ui
                .binary_uri()
                .and_then(|n| n.as_uri().map(file_uri_to_path));
            let bundle = ui
                .bundle_uri()
                .and_then(|n| n.as_uri().map(file_uri_to_path));
            if let (Some(gui_path), Some(bundle)) = (gui_path, bundle) {
                desc.gui_uri = Some(gui_uri);
                desc.gui_path = Some(gui_path);
                desc.bundle_path = bundle;
            }
        }

        if let Some(gui_path) = desc.gui_path.clone() {
            if !probe_library(&gui_path, b"lv2ui_descriptor\0") {
                warn!("cannot open GUI '{}' for '{}'", gui_path.display(), plugin_uri);
                desc.gui_uri = None;
                desc.gui_path = None;
            }
        }
    }

    fn parse_ports(
        &self,
        plugin: &lilv::plugin::Plugin,
        desc: &mut PluginDescriptor,
    ) -> Result<(), ResolveError> {
        let ranges = plugin.port_ranges_float();
        let num_ports = ranges.len();
        desc.ports = Vec::with_capacity(num_ports);

        for index in 0..num_ports {
            let port = plugin
                .port_by_index(index)
                .ok_or(ResolveError::BadPort(index as u32))?;

            let is_input = port.is_a(&self.input_port);
            let is_output = port.is_a(&self.output_port);

            let mut midi = false;
            let kind = if port.is_a(&self.control_port) {
                if is_input {
                    PortKind::ControlIn
                } else {
                    PortKind::ControlOut
                }
            } else if port.is_a(&self.audio_port) || port.is_a(&self.cv_port) {
                if is_input {
                    PortKind::AudioIn
                } else {
                    PortKind::AudioOut
                }
            } else if port.is_a(&self.atom_port) {
                if let Some(supports) = port.value(&self.atom_supports) {
                    for s in supports.iter() {
                        if s == self.midi_event {
                            midi = true;
                        }
                        if s == self.time_position {
                            desc.send_time_info = true;
                        }
                    }
                }
                if let Some(min_size) = port.get(&self.minimum_size) {
                    if let Some(n) = min_size.as_int() {
                        if n > 0 && desc.min_atom_bufsiz < n as u32 {
                            desc.min_atom_bufsiz = n as u32;
                        }
                    }
                }
                match (midi, is_input) {
                    (true, true) => PortKind::MidiIn,
                    (true, false) => PortKind::MidiOut,
                    (false, true) => PortKind::AtomIn,
                    (false, false) => PortKind::AtomOut,
                }
            } else {
                return Err(ResolveError::BadPort(index as u32));
            };

            if !is_input && !is_output {
                return Err(ResolveError::BadPort(index as u32));
            }

            if kind == PortKind::ControlOut && port.has_property(&self.reports_latency) {
                desc.latency_ctrl_port = Some(index as u32);
            }

            let is_ctrl_in = kind == PortKind::ControlIn;
            let p = Port {
                kind,
                name: port
                    .name()
                    .and_then(|n| n.as_str().map(String::from))
                    .unwrap_or_default(),
                symbol: port
                    .symbol()
                    .and_then(|n| n.as_str().map(String::from))
                    .unwrap_or_default(),
                doc: port
                    .get(&self.rdfs_comment)
                    .and_then(|n| n.as_str().map(String::from))
                    .unwrap_or_default(),
                default: ranges[index].default,
                min: ranges[index].min,
                max: ranges[index].max,
                steps: port
                    .get(&self.range_steps)
                    .and_then(|n| n.as_float())
                    .unwrap_or(100.0),
                toggled: port.has_property(&self.toggled),
                integer_step: port.has_property(&self.integer),
                logarithmic: port.has_property(&self.logarithmic),
                sr_dependent: port.has_property(&self.sample_rate),
                enumeration: port.has_property(&self.enumeration),
                not_on_gui: is_ctrl_in && port.has_property(&self.not_on_gui),
                not_automatic: is_ctrl_in
                    && (port.has_property(&self.expensive)
                        || port.has_property(&self.causes_artifacts)
                        || port.has_property(&self.not_automatic)),
            };

            match p.kind {
                PortKind::ControlIn => desc.counts.ctrl_in += 1,
                PortKind::ControlOut => desc.counts.ctrl_out += 1,
                PortKind::AudioIn => desc.counts.audio_in += 1,
                PortKind::AudioOut => desc.counts.audio_out += 1,
                PortKind::MidiIn => desc.counts.midi_in += 1,
                PortKind::MidiOut => desc.counts.midi_out += 1,
                PortKind::AtomIn => desc.counts.atom_in += 1,
                PortKind::AtomOut => desc.counts.atom_out += 1,
            }
            desc.ports.push(p);
        }

        desc.counts.total = num_ports as u32;
        Ok(())
    }
}

/// Filter out plugin shapes the bridge cannot host.
pub(crate) fn verify_support(desc: &PluginDescriptor) -> Result<(), ResolveError> {
    if desc.counts.total == 0 {
        return Err(ResolveError::Unsupported("no ports"));
    }
    if desc.name.is_empty() {
        return Err(ResolveError::Unsupported("no plugin name"));
    }
    if desc.counts.event_in() > 1 || desc.counts.event_out() > 1 {
        return Err(ResolveError::Unsupported("more than one event port per direction"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_matches_the_reference_check_value() {
        // CRC-32/ISO-HDLC check value.
        assert_eq!(crc32("123456789"), 0xcbf43926);
        assert_eq!(crc32(""), 0);
    }

    #[test]
    fn unique_id_clears_the_top_bit_of_every_byte() {
        assert_eq!(uri_to_id("123456789"), 0x4b743926);
        let id = uri_to_id("urn:test:amp");
        assert_eq!(id, crc32("urn:test:amp") & 0x7f7f7f7f);
        for shift in [0, 8, 16, 24] {
            assert_eq!((id >> shift) & 0x80, 0);
        }
    }

    #[test]
    fn file_uri_strips_the_scheme() {
        assert_eq!(
            file_uri_to_path("file:///usr/lib/lv2/amp.lv2/amp.so"),
            PathBuf::from("/usr/lib/lv2/amp.lv2/amp.so")
        );
        assert_eq!(file_uri_to_path("/plain/path"), PathBuf::from("/plain/path"));
    }

    fn linear_port() -> Port {
        Port {
            min: -10.0,
            max: 10.0,
            ..Port::default()
        }
    }

    #[test]
    fn linear_transform_round_trips() {
        let p = linear_port();
        assert_eq!(p.to_vst(-10.0), 0.0);
        assert_eq!(p.to_vst(10.0), 1.0);
        assert!((p.to_vst(0.0) - 0.5).abs() < 1e-6);
        for v in [0.0f32, 0.25, 0.5, 0.75, 1.0] {
            let rt = p.to_vst(p.to_lv2(v));
            assert!((rt - v).abs() <= 1.0 / p.steps, "{} -> {}", v, rt);
        }
    }

    #[test]
    fn logarithmic_transform_round_trips_within_one_step() {
        let p = Port {
            min: 20.0,
            max: 20000.0,
            logarithmic: true,
            steps: 100.0,
            ..Port::default()
        };
        let lv2 = p.to_lv2(0.5);
        assert!((lv2 - (20.0f32 * 1000.0f32.powf(0.5))).abs() < 1.0);
        let rt = p.to_vst(lv2);
        assert!((rt - 0.5).abs() <= 1.0 / 100.0);
    }

    #[test]
    fn toggled_ports_snap_to_bool() {
        let p = Port {
            toggled: true,
            ..Port::default()
        };
        assert_eq!(p.to_vst(0.7), 1.0);
        assert_eq!(p.to_vst(-1.0), 0.0);
        assert_eq!(p.to_lv2(0.49), 0.0);
        assert_eq!(p.to_lv2(0.51), 1.0);
    }

    #[test]
    fn integer_ports_round() {
        let p = Port {
            min: 0.0,
            max: 10.0,
            integer_step: true,
            ..Port::default()
        };
        assert_eq!(p.to_lv2(0.42), 4.0);
        assert_eq!(p.to_vst(3.4), 0.3);
    }

    fn minimal_desc() -> PluginDescriptor {
        let mut desc = PluginDescriptor {
            name: "Test Amp".to_string(),
            min_atom_bufsiz: 8192,
            ..PluginDescriptor::default()
        };
        desc.ports.push(Port::default());
        desc.counts.total = 1;
        desc.counts.ctrl_in = 1;
        desc
    }

    #[test]
    fn verify_rejects_portless_and_nameless_plugins() {
        let mut desc = minimal_desc();
        assert!(verify_support(&desc).is_ok());

        desc.counts.total = 0;
        assert!(matches!(
            verify_support(&desc),
            Err(ResolveError::Unsupported("no ports"))
        ));

        let mut desc = minimal_desc();
        desc.name.clear();
        assert!(verify_support(&desc).is_err());
    }

    #[test]
    fn verify_rejects_multiple_event_ports_per_direction() {
        let mut desc = minimal_desc();
        desc.counts.midi_in = 1;
        desc.counts.atom_in = 1;
        assert!(verify_support(&desc).is_err());

        let mut desc = minimal_desc();
        desc.counts.midi_in = 1;
        desc.counts.atom_out = 1;
        assert!(verify_support(&desc).is_ok());
    }
}
