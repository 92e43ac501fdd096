//! Function interfaces for the VST 2.4 API.

#![doc(hidden)]

use std::convert::TryFrom;
use std::os::raw::{c_char, c_void};

use log::{debug, trace};

use crate::api::consts::*;
use crate::api::{self, AEffect};
use crate::plugin::OpCode;

/// Deprecated accumulating process function.
pub extern "C" fn process_deprecated(
    _effect: *mut AEffect,
    _raw_inputs: *const *const f32,
    _raw_outputs: *mut *mut f32,
    _samples: i32,
) {
}

/// VST2.4 replacing process function.
pub extern "C" fn process_replacing(
    effect: *mut AEffect,
    raw_inputs: *const *const f32,
    raw_outputs: *mut *mut f32,
    samples: i32,
) {
    let object = unsafe { (*effect).get_effect() };
    object.process(raw_inputs, raw_outputs, samples);
}

/// The bridge processes in 32 bit only; this stub satisfies hosts probing
/// the f64 entry.
pub extern "C" fn process_replacing_f64(
    _effect: *mut AEffect,
    _raw_inputs: *const *const f64,
    _raw_outputs: *mut *mut f64,
    _samples: i32,
) {
}

/// VST2.4 set parameter function.
pub extern "C" fn set_parameter(effect: *mut AEffect, index: i32, value: f32) {
    unsafe { (*effect).get_effect() }.set_parameter(index, value);
}

/// VST2.4 get parameter function.
pub extern "C" fn get_parameter(effect: *mut AEffect, index: i32) -> f32 {
    unsafe { (*effect).get_effect() }.get_parameter(index)
}

/// Copy a string into a host-provided buffer, cut at `max` characters.
fn copy_string(dst: *mut c_void, src: &str, max: usize) -> isize {
    unsafe {
        use libc::{memcpy, memset};
        use std::cmp::min;

        memset(dst, 0, max);
        memcpy(
            dst,
            src.as_ptr() as *const c_void,
            min(max - 1, src.len()),
        );
    }

    1 // Success
}

// Read a string from the `ptr` buffer
fn read_string(ptr: *mut c_void) -> String {
    use std::ffi::CStr;

    String::from_utf8_lossy(unsafe { CStr::from_ptr(ptr as *mut c_char).to_bytes() }).into_owned()
}

/// VST2.4 dispatch function. Handles dispatching all opcodes to the effect.
pub extern "C" fn dispatch(
    effect: *mut AEffect,
    opcode: i32,
    index: i32,
    value: isize,
    ptr: *mut c_void,
    opt: f32,
) -> isize {
    let opcode = match OpCode::try_from(opcode) {
        Ok(opcode) => opcode,
        Err(_) => {
            trace!("unknown opcode {}", opcode);
            return 0;
        }
    };
    let object = unsafe { (*effect).get_effect() };

    match opcode {
        OpCode::Initialize => object.open(),
        OpCode::Shutdown => unsafe {
            object.close();
            (*effect).drop_effect();
            drop(Box::from_raw(effect));
            return 1;
        },

        OpCode::GetParameterLabel => {
            return copy_string(ptr, &object.parameter_label(index), MAX_PARAM_STR_LEN)
        }
        OpCode::GetParameterDisplay => {
            return copy_string(ptr, &object.parameter_display(index), MAX_PARAM_STR_LEN)
        }
        OpCode::GetParameterName => {
            return copy_string(ptr, &object.parameter_name(index), MAX_PARAM_STR_LEN)
        }

        OpCode::SetSampleRate => object.set_sample_rate(opt),
        OpCode::SetBlockSize => object.set_block_size(value as i64),
        OpCode::StateChanged => {
            if value == 1 {
                object.resume();
            } else {
                object.suspend();
            }
        }

        OpCode::EditorGetRect => {
            if let Some(rect) = object.edit_rect() {
                unsafe {
                    *(ptr as *mut *mut api::Rect) = rect;
                }
                return 1;
            }
        }
        OpCode::EditorOpen => return object.edit_open(ptr) as isize,
        OpCode::EditorClose => object.edit_close(),
        OpCode::EditorIdle => object.edit_idle(),

        OpCode::GetData => {
            let chunk = object.get_chunk(index != 0);
            let len = chunk.len() as isize;
            unsafe {
                *(ptr as *mut *const c_void) = chunk.as_ptr() as *const c_void;
            }
            return len;
        }
        OpCode::SetData => {
            let chunk = unsafe { std::slice::from_raw_parts(ptr as *const u8, value as usize) };
            return object.set_chunk(chunk, index != 0);
        }

        OpCode::ProcessEvents => {
            return object.process_events(unsafe { &*(ptr as *const api::Events) });
        }
        OpCode::CanBeAutomated => return object.can_be_automated(index) as isize,

        OpCode::GetCategory => return object.category() as isize,
        OpCode::SoftBypass => return object.bypass(value != 0),

        OpCode::GetEffectName => {
            return copy_string(ptr, &object.effect_name(), MAX_EFFECT_NAME_LEN)
        }
        OpCode::GetVendorName => {
            return copy_string(ptr, &object.vendor_string(), MAX_VENDOR_STR_LEN)
        }
        OpCode::GetProductName => {
            return copy_string(ptr, &object.product_string(), MAX_PRODUCT_STR_LEN)
        }
        OpCode::GetVendorVersion => return object.vendor_version(),
        OpCode::VendorSpecific => {
            // Reaper/Cockos HiDPI scale announcement: 'PreS' / 'AeCs'
            if index == 0x50726553 && value == 0x41654373 {
                object.set_ui_scale(opt);
            }
        }
        OpCode::CanDo => return object.can_do(&read_string(ptr)),

        OpCode::GetParamInfo => {
            let props = unsafe { &mut *(ptr as *mut api::ParameterProperties) };
            return object.parameter_properties(index, props) as isize;
        }

        OpCode::GetApiVersion => return 2400,

        OpCode::ShellGetNextPlugin => {
            if let Some((id, name)) = object.shell_next_plugin() {
                copy_string(ptr, &name, MAX_SHELL_NAME_LEN);
                return id as isize;
            }
            return 0;
        }

        unhandled => {
            debug!("unhandled opcode {:?}", unhandled);
            trace!(
                "arguments; index: {}, value: {}, ptr: {:?}, opt: {}",
                index,
                value,
                ptr,
                opt
            );
        }
    }

    0
}
