//! The VST shell effect: one binary enumerating every LV2 plugin in the
//! world as a sub-plugin.
//!
//! Hosts that support the shell category instantiate this effect first, walk
//! `effShellGetNextPlugin` to collect `(unique id, name)` pairs, then reload
//! the binary with `audioMasterCurrentId` answering the chosen id.

use std::path::PathBuf;

use log::debug;

use crate::descriptor::{uri_to_id, Resolver};
use crate::plugin::{Category, Effect};

/// Effect implementation for the enumeration pass. It produces no audio and
/// has no parameters; it only answers category and shell opcodes.
pub struct Shell {
    resolver: Resolver,
    plugins: Vec<(String, String)>,
    pos: usize,
    whitelist: Vec<String>,
    blacklist: Vec<String>,
}

impl Shell {
    /// Snapshot the world described by `bundles` (system-wide when empty)
    /// and prepare the filtered walk.
    pub fn new(bundles: &[PathBuf], whitelist: Vec<String>, blacklist: Vec<String>) -> Shell {
        let resolver = Resolver::new(bundles);
        let plugins = resolver.plugin_list();
        debug!(
            "shell: {} plugins, {} whitelisted prefixes, {} blacklisted",
            plugins.len(),
            whitelist.len(),
            blacklist.len()
        );
        Shell {
            resolver,
            plugins,
            pos: 0,
            whitelist,
            blacklist,
        }
    }

    fn passes_filters(&self, uri: &str) -> bool {
        let whitelisted = self.whitelist.is_empty()
            || self
                .whitelist
                .iter()
                .any(|w| !w.is_empty() && uri.starts_with(w.as_str()));
        if !whitelisted {
            return false;
        }
        !self
            .blacklist
            .iter()
            .any(|b| !b.is_empty() && uri.starts_with(b.as_str()))
    }
}

impl Effect for Shell {
    fn shell_next_plugin(&mut self) -> Option<(i32, String)> {
        while self.pos < self.plugins.len() {
            let (uri, name) = self.plugins[self.pos].clone();
            self.pos += 1;

            if !self.passes_filters(&uri) {
                continue;
            }
            // only announce sub-plugins that will actually resolve later
            if self.resolver.resolve_by_uri(&uri).is_err() {
                continue;
            }

            let id = uri_to_id(&uri);
            debug!("shell: {:08x} -- {}", id, name);
            return Some((id as i32, name));
        }
        None
    }

    fn category(&self) -> Category {
        Category::Shell
    }

    fn effect_name(&self) -> String {
        "LV2 Shell".to_string()
    }

    fn vendor_string(&self) -> String {
        "lv2vst".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell_with_filters(whitelist: Vec<String>, blacklist: Vec<String>) -> Shell {
        Shell {
            resolver: Resolver::new(&[PathBuf::from("/nonexistent/bundle.lv2")]),
            plugins: Vec::new(),
            pos: 0,
            whitelist,
            blacklist,
        }
    }

    #[test]
    fn empty_whitelist_admits_everything() {
        let shell = shell_with_filters(Vec::new(), Vec::new());
        assert!(shell.passes_filters("urn:test:a"));
        assert!(shell.passes_filters("http://example.org/plugin"));
    }

    #[test]
    fn whitelist_is_a_prefix_match() {
        let shell = shell_with_filters(
            vec!["urn:test:a".to_string(), "urn:test:b".to_string()],
            Vec::new(),
        );
        assert!(shell.passes_filters("urn:test:a"));
        assert!(shell.passes_filters("urn:test:a.variant"));
        assert!(shell.passes_filters("urn:test:b"));
        assert!(!shell.passes_filters("urn:test:c"));
    }

    #[test]
    fn blacklist_overrides_the_whitelist() {
        let shell = shell_with_filters(
            vec!["urn:test:a".to_string(), "urn:test:b".to_string()],
            vec!["urn:test:a.broken".to_string()],
        );
        assert!(shell.passes_filters("urn:test:a"));
        assert!(!shell.passes_filters("urn:test:a.broken"));
        assert!(!shell.passes_filters("urn:test:a.broken.worse"));
        assert!(shell.passes_filters("urn:test:b"));
    }

    #[test]
    fn empty_filter_lines_are_inert() {
        let shell = shell_with_filters(vec![String::new()], vec![String::new()]);
        // an empty whitelist entry must not match every URI
        assert!(!shell.passes_filters("urn:test:a"));
    }
}
