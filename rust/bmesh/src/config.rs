// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Store and encoder configuration.

/// What `add_edge` does when the vertex pair is already connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateEdgePolicy {
    /// Fail with [`Error::DuplicateEdge`](crate::Error::DuplicateEdge).
    #[default]
    Reject,
    /// Return the existing edge key.
    ReuseExisting,
}

/// Mesh store configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreConfig {
    pub duplicate_edges: DuplicateEdgePolicy,
}

/// Smallest accepted vertex count for switching to the buffer-view form.
pub const MIN_BUFFER_THRESHOLD: usize = 100;

/// Encoder configuration.
#[derive(Debug, Clone, Copy)]
pub struct EncodingConfig {
    /// Emit the explicit topology layer next to the implicit triangles.
    pub enabled: bool,
    /// Allow the buffer-view form for large meshes.
    pub use_buffer_format: bool,
    /// Vertex count at which buffer views replace inline element lists.
    pub buffer_threshold: usize,
    /// Classify edges; when off every edge encodes as unknown.
    pub preserve_manifold_info: bool,
}

impl EncodingConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env_flag("BMESH_ENCODING_ENABLED").unwrap_or(defaults.enabled),
            use_buffer_format: env_flag("BMESH_USE_BUFFER_FORMAT")
                .unwrap_or(defaults.use_buffer_format),
            buffer_threshold: std::env::var("BMESH_BUFFER_THRESHOLD")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.buffer_threshold)
                .max(MIN_BUFFER_THRESHOLD),
            preserve_manifold_info: env_flag("BMESH_PRESERVE_MANIFOLD")
                .unwrap_or(defaults.preserve_manifold_info),
        }
    }

    /// Returns `true` if a mesh with `vertex_count` vertices should use buffer views.
    pub fn wants_buffers(&self, vertex_count: usize) -> bool {
        self.use_buffer_format && vertex_count >= self.buffer_threshold.max(MIN_BUFFER_THRESHOLD)
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            use_buffer_format: true,
            buffer_threshold: 1000,
            preserve_manifold_info: true,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    parse_flag(&std::env::var(name).ok()?)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_exporter_settings() {
        let config = EncodingConfig::default();
        assert!(config.enabled);
        assert!(config.use_buffer_format);
        assert_eq!(config.buffer_threshold, 1000);
        assert!(config.preserve_manifold_info);
        assert_eq!(StoreConfig::default().duplicate_edges, DuplicateEdgePolicy::Reject);
    }

    #[test]
    fn threshold_is_clamped() {
        let config = EncodingConfig {
            buffer_threshold: 3,
            ..EncodingConfig::default()
        };
        assert!(!config.wants_buffers(50));
        assert!(config.wants_buffers(100));
    }

    #[test]
    fn buffers_disabled() {
        let config = EncodingConfig {
            use_buffer_format: false,
            ..EncodingConfig::default()
        };
        assert!(!config.wants_buffers(1_000_000));
    }

    // The only test touching BMESH_* variables, so it cannot race another.
    #[test]
    fn from_env_overrides_falls_back_and_clamps() {
        const VARS: [&str; 4] = [
            "BMESH_ENCODING_ENABLED",
            "BMESH_USE_BUFFER_FORMAT",
            "BMESH_BUFFER_THRESHOLD",
            "BMESH_PRESERVE_MANIFOLD",
        ];
        for name in VARS {
            std::env::remove_var(name);
        }
        let unset = EncodingConfig::from_env();
        assert!(unset.enabled);
        assert!(unset.use_buffer_format);
        assert_eq!(unset.buffer_threshold, 1000);
        assert!(unset.preserve_manifold_info);

        std::env::set_var("BMESH_ENCODING_ENABLED", "off");
        std::env::set_var("BMESH_USE_BUFFER_FORMAT", "perhaps");
        std::env::set_var("BMESH_BUFFER_THRESHOLD", " 5000 ");
        std::env::set_var("BMESH_PRESERVE_MANIFOLD", "0");
        let set = EncodingConfig::from_env();
        assert!(!set.enabled);
        // Unparseable flags keep the default.
        assert!(set.use_buffer_format);
        assert_eq!(set.buffer_threshold, 5000);
        assert!(!set.preserve_manifold_info);

        std::env::set_var("BMESH_BUFFER_THRESHOLD", "7");
        assert_eq!(EncodingConfig::from_env().buffer_threshold, MIN_BUFFER_THRESHOLD);
        std::env::set_var("BMESH_BUFFER_THRESHOLD", "lots");
        assert_eq!(EncodingConfig::from_env().buffer_threshold, 1000);

        for name in VARS {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn flag_parsing() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
