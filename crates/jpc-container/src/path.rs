//! Relative paths embedded in containers.
//!
//! Separators are configuration, not host inference: paths written on one
//! OS are restored with the other OS's separator rewritten.

use std::path::{Component, Path, PathBuf};

use jpc_core::config::PathsConfig;
use jpc_core::{JpcError, JpcResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathCodec {
    native: char,
    foreign: char,
}

impl Default for PathCodec {
    fn default() -> Self {
        Self::from_config(&PathsConfig::default())
    }
}

impl PathCodec {
    pub fn new(native: char, foreign: char) -> Self {
        Self { native, foreign }
    }

    pub fn from_config(config: &PathsConfig) -> Self {
        Self::new(config.native_separator, config.foreign_separator)
    }

    pub fn native(&self) -> char {
        self.native
    }

    fn is_separator(&self, c: char) -> bool {
        c == self.native || c == self.foreign
    }

    /// The tail of `source` starting at the last path segment named
    /// `base_dir_name` that is followed by a separator.
    ///
    /// `"/home/me/in/a/b.txt"` with base `"in"` gives `"in/a/b.txt"`.
    pub fn relative_path(&self, source: &str, base_dir_name: &str) -> JpcResult<String> {
        let not_under_base = || JpcError::PathNotUnderBase {
            path: source.to_string(),
            base: base_dir_name.to_string(),
        };
        if base_dir_name.is_empty() {
            return Err(not_under_base());
        }

        source
            .rmatch_indices(base_dir_name)
            .map(|(idx, _)| idx)
            .find(|&idx| {
                let before = source[..idx].chars().next_back();
                let after = source[idx + base_dir_name.len()..].chars().next();
                before.map_or(true, |c| self.is_separator(c))
                    && after.is_some_and(|c| self.is_separator(c))
            })
            .map(|idx| source[idx..].to_string())
            .ok_or_else(not_under_base)
    }

    /// Rewrite foreign separators to the native one.
    pub fn normalize(&self, path: &str) -> String {
        path.chars()
            .map(|c| if c == self.foreign { self.native } else { c })
            .collect()
    }

    /// Join a recovered relative path under `output_root`.
    ///
    /// Absolute paths and `..` segments are refused so a container cannot
    /// write outside the output tree.
    pub fn restore_path(&self, output_root: &Path, relative: &[u8]) -> JpcResult<PathBuf> {
        let text = std::str::from_utf8(relative)
            .map_err(|_| JpcError::CorruptContainer("embedded path is not UTF-8".into()))?;
        let normalized = self.normalize(text);

        if normalized.starts_with(self.native) {
            return Err(JpcError::UnsafePath(normalized));
        }

        let mut restored = output_root.to_path_buf();
        let mut pushed = 0usize;
        for segment in normalized.split(self.native) {
            if segment.is_empty() || segment == "." {
                continue;
            }
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(_)), None) => {}
                _ => return Err(JpcError::UnsafePath(normalized)),
            }
            restored.push(segment);
            pushed += 1;
        }

        if pushed == 0 {
            return Err(JpcError::UnsafePath(normalized));
        }
        Ok(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unix() -> PathCodec {
        PathCodec::new('/', '\\')
    }

    fn windows() -> PathCodec {
        PathCodec::new('\\', '/')
    }

    #[test]
    fn test_relative_path_keeps_base_segment() {
        let codec = unix();
        assert_eq!(
            codec.relative_path("project/sub/image.txt", "project").unwrap(),
            "project/sub/image.txt"
        );
        assert_eq!(
            codec.relative_path("/home/me/in/a/b.txt", "in").unwrap(),
            "in/a/b.txt"
        );
    }

    #[test]
    fn test_relative_path_uses_last_occurrence() {
        assert_eq!(
            unix().relative_path("/a/in/b/in/c.txt", "in").unwrap(),
            "in/c.txt"
        );
    }

    #[test]
    fn test_relative_path_matches_whole_segments() {
        // "remain/" ends in "in/" but is not the base directory
        assert_eq!(
            unix().relative_path("/data/in/remain/x.txt", "in").unwrap(),
            "in/remain/x.txt"
        );
    }

    #[test]
    fn test_relative_path_windows_separators() {
        assert_eq!(
            windows()
                .relative_path("C:\\Users\\me\\in\\a\\b.txt", "in")
                .unwrap(),
            "in\\a\\b.txt"
        );
    }

    #[test]
    fn test_relative_path_not_under_base() {
        let err = unix().relative_path("/srv/other/file.txt", "in").unwrap_err();
        assert!(matches!(err, JpcError::PathNotUnderBase { .. }));

        // base as the final component has no separator after it
        assert!(unix().relative_path("/srv/in", "in").is_err());
        assert!(unix().relative_path("/srv/in/x", "").is_err());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(unix().normalize("in\\a\\b.txt"), "in/a/b.txt");
        assert_eq!(windows().normalize("in/a/b.txt"), "in\\a\\b.txt");
        assert_eq!(unix().normalize("in/a/b.txt"), "in/a/b.txt");
    }

    #[test]
    fn test_restore_foreign_path() {
        let restored = unix()
            .restore_path(Path::new("out"), b"in\\a\\b.txt")
            .unwrap();
        assert_eq!(restored, Path::new("out").join("in").join("a").join("b.txt"));
    }

    #[test]
    fn test_restore_native_path() {
        let restored = unix()
            .restore_path(Path::new("/tmp/out"), b"project/sub/image.txt")
            .unwrap();
        assert_eq!(restored, PathBuf::from("/tmp/out/project/sub/image.txt"));
    }

    #[test]
    fn test_restore_rejects_traversal() {
        let err = unix()
            .restore_path(Path::new("out"), b"in/../../etc/passwd")
            .unwrap_err();
        assert!(matches!(err, JpcError::UnsafePath(_)));
    }

    #[test]
    fn test_restore_rejects_absolute() {
        assert!(matches!(
            unix().restore_path(Path::new("out"), b"/etc/passwd"),
            Err(JpcError::UnsafePath(_))
        ));
        assert!(matches!(
            unix().restore_path(Path::new("out"), b""),
            Err(JpcError::UnsafePath(_))
        ));
    }

    #[test]
    fn test_restore_rejects_non_utf8() {
        assert!(matches!(
            unix().restore_path(Path::new("out"), &[0x69, 0x6E, 0xFF, 0xFE]),
            Err(JpcError::CorruptContainer(_))
        ));
    }
}
