//! Source identity

use sha2::{Digest, Sha256};

/// Identifies one camera stream (typically the discovered server address)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(String);

impl SourceId {
    /// Create a new source id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as given
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A form safe to use as a single directory name
    ///
    /// Alphanumerics, `_`, `-` and `.` are kept; anything else becomes `_`.
    /// Names made only of dots are replaced entirely. Whenever the name had to
    /// change, a short hash of the original id is appended so that distinct
    /// sources such as `cam/a` and `cam_a` never share a directory.
    pub fn dir_name(&self) -> String {
        let safe: String = self
            .0
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        let base = if safe.is_empty() || safe.chars().all(|c| c == '.') {
            "_".repeat(safe.len().max(1))
        } else {
            safe
        };

        if base == self.0 {
            return base;
        }

        let digest = Sha256::digest(self.0.as_bytes());
        let suffix: String = digest.iter().take(4).map(|b| format!("{:02x}", b)).collect();
        format!("{}-{}", base, suffix)
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_name_keeps_ip() {
        assert_eq!(SourceId::new("192.168.0.12").dir_name(), "192.168.0.12");
    }

    #[test]
    fn test_dir_name_replaces_separators() {
        let name = SourceId::new("cam/a:b c").dir_name();
        assert!(name.starts_with("cam_a_b_c-"), "{}", name);
        assert_eq!(name.len(), "cam_a_b_c-".len() + 8);
        assert!(name[10..].chars().all(|c| c.is_ascii_hexdigit()));

        assert!(SourceId::new("..").dir_name().starts_with("__-"));
        assert!(SourceId::new("").dir_name().starts_with("_-"));
    }

    #[test]
    fn test_dir_name_distinct_for_colliding_sources() {
        let slash = SourceId::new("cam/a");
        let underscore = SourceId::new("cam_a");

        assert_eq!(underscore.dir_name(), "cam_a");
        assert_ne!(slash.dir_name(), underscore.dir_name());
        assert_ne!(SourceId::new("cam:a").dir_name(), slash.dir_name());
        // Stable across calls
        assert_eq!(slash.dir_name(), SourceId::new("cam/a").dir_name());
    }
}
