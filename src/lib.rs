#![allow(clippy::mut_from_ref)]
#![deny(missing_docs, unused_imports)]

//! An LV2 plugin host that presents itself to VST 2.4 hosts as a VST plugin.
//!
//! The crate builds a `cdylib` exporting `VSTPluginMain`. At load time the
//! bridge scans the LV2 world (or the bundles listed in a `.bundle` file next
//! to the binary), resolves a plugin description from its Turtle manifest and
//! maps it onto the `AEffect` contract: LV2 control ports become VST
//! parameters, MIDI/atom ports are fed from the host's event queue and the
//! host transport, and the plugin state interface round-trips through VST
//! chunks. When more than one plugin is visible, the binary acts as a VST
//! *shell* and enumerates one sub-plugin per LV2 plugin URI.
//!
//! The VST API is multi-threaded. A host calls into a plugin from two
//! threads - the *processing* thread and the *UI* thread - and an LV2 plugin
//! with a worker extension adds a third. The organization of this crate
//! reflects that structure:
//!
//! * the processing thread runs the [`bridge::Bridge`] process cycle and
//!   may not allocate, lock or log;
//! * the UI thread drives the dispatcher and the LV2 UI idle callback;
//! * the worker thread (see [`worker`]) sleeps on a condition variable and
//!   serves the plugin's `work()` calls.
//!
//! Data crosses between threads exclusively through the single-producer
//! single-consumer rings in [`ring`].

#[macro_use]
extern crate bitflags;

pub mod api;
pub mod atom;
pub mod bridge;
pub mod descriptor;
pub mod host;
pub mod init;
pub mod lv2;
pub mod plugin;
pub mod ring;
pub mod shell;
pub mod state;
pub mod ui;
pub mod uri_map;
pub mod worker;

mod interfaces;
