//! Content-addressable on-disk snapshot cache.
//!
//! Files live at `{base}/{cache_name}/{device}/{category}/{scenario}.{ext}`
//! where every segment is normalized with [`normalize`]. The device segment
//! folds in the scale and appearance so that all parts of a [`CacheKey`]
//! address distinct files.
//!
//! Keys carry no fingerprint of the rendering environment, so entries
//! written before a toolchain or font change stay valid until cleared.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::Result;
use crate::format::SnapshotFormat;
use crate::platform::{Appearance, DeviceProfile};

/// Replace every character that is unsafe in a path segment with `_`.
///
/// Replaced: `.`, `:`, `/`, whitespace, control characters and Unicode
/// non-characters. Names that differ only in such characters map to the
/// same segment.
pub fn normalize(segment: &str) -> String {
    segment
        .chars()
        .map(|c| if is_normalized_away(c) { '_' } else { c })
        .collect()
}

fn is_normalized_away(c: char) -> bool {
    matches!(c, '.' | ':' | '/')
        || c.is_whitespace()
        || c.is_control()
        || is_noncharacter(c)
}

fn is_noncharacter(c: char) -> bool {
    let v = c as u32;
    (0xFDD0..=0xFDEF).contains(&v) || (v & 0xFFFE) == 0xFFFE
}

/// Composite identity of a cached snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheKey {
    pub category: String,
    pub scenario: String,
    pub device: String,
    pub scale: f64,
    pub appearance: Appearance,
}

impl CacheKey {
    pub fn new(category: &str, scenario: &str, device: &DeviceProfile, scale: f64) -> Self {
        Self {
            category: category.to_string(),
            scenario: scenario.to_string(),
            device: device.name.clone(),
            scale,
            appearance: device.appearance,
        }
    }

    fn device_segment(&self) -> String {
        normalize(&format!("{}@{}x-{}", self.device, self.scale, self.appearance.tag()))
    }
}

/// What [`DiskCache::clear`] removes.
#[derive(Debug, Clone, Copy)]
pub enum ClearScope<'a> {
    /// The whole cache directory.
    All,
    /// Every entry sharing the key's device segment.
    Device(&'a CacheKey),
    /// Every entry sharing the key's device and category.
    Category(&'a CacheKey),
}

#[derive(Debug, Clone)]
pub struct DiskCache {
    directory: PathBuf,
    format: SnapshotFormat,
}

impl DiskCache {
    pub fn new(base_dir: impl AsRef<Path>, cache_name: &str, format: SnapshotFormat) -> Self {
        Self { directory: base_dir.as_ref().join(normalize(cache_name)), format }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn format(&self) -> SnapshotFormat {
        self.format
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.category_dir(key)
            .join(format!("{}.{}", normalize(&key.scenario), self.format.file_extension()))
    }

    /// Write `bytes` for `key`, replacing any previous entry.
    pub fn store(&self, bytes: &[u8], key: &CacheKey) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        debug!("cached {} bytes at {}", bytes.len(), path.display());
        Ok(())
    }

    /// Cached bytes for `key`. A missing file is a miss; an unreadable one
    /// is removed and reported as a miss.
    pub fn load(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("failed to read cache entry {}: {}", path.display(), e);
                remove_path(&path);
                None
            }
        }
    }

    /// Drop one entry, e.g. after its bytes failed to decode.
    pub fn remove(&self, key: &CacheKey) {
        remove_path(&self.path_for(key));
    }

    /// Not synchronized with concurrent `store` calls into the same scope.
    pub fn clear(&self, scope: ClearScope<'_>) {
        let target = match scope {
            ClearScope::All => self.directory.clone(),
            ClearScope::Device(key) => self.directory.join(key.device_segment()),
            ClearScope::Category(key) => self.category_dir(key),
        };
        remove_path(&target);
    }

    fn category_dir(&self, key: &CacheKey) -> PathBuf {
        self.directory.join(key.device_segment()).join(normalize(&key.category))
    }
}

fn remove_path(path: &Path) {
    let result = if path.is_dir() { fs::remove_dir_all(path) } else { fs::remove_file(path) };
    match result {
        Ok(()) => debug!("removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("failed to remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Orientation, Size};

    fn key(category: &str, scenario: &str) -> CacheKey {
        CacheKey::new(category, scenario, &DeviceProfile::new("Catalog", Size::new(100.0, 100.0)), 2.0)
    }

    #[test]
    fn normalize_replaces_unsafe_characters() {
        assert_eq!(normalize("a.b:c/d e\tf\ng"), "a_b_c_d_e_f_g");
        assert_eq!(normalize("x\u{0}y\u{FFFF}z"), "x_y_z");
        assert_eq!(normalize("Café-1 (dark)"), "Café-1_(dark)");
    }

    #[test]
    fn path_layout_is_hierarchical() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), "thumbnails", SnapshotFormat::Png);
        let device = DeviceProfile::iphone_x(Orientation::Portrait).with_appearance(Appearance::Dark);
        let k = CacheKey::new("Home Screen", "Feed: empty", &device, 3.0);
        let rel = cache.path_for(&k).strip_prefix(dir.path()).unwrap().to_path_buf();
        assert_eq!(
            rel,
            PathBuf::from("thumbnails/iPhone_X_portrait_(dark)@3x-dark/Home_Screen/Feed__empty.png")
        );
    }

    #[test]
    fn scale_and_appearance_address_distinct_entries() {
        let device = DeviceProfile::new("Catalog", Size::new(100.0, 100.0));
        let a = CacheKey::new("c", "s", &device, 1.0);
        let b = CacheKey::new("c", "s", &device, 2.0);
        let c = CacheKey::new("c", "s", &device.clone().with_appearance(Appearance::Light), 1.0);
        let cache = DiskCache::new("/tmp", "x", SnapshotFormat::Png);
        assert_ne!(cache.path_for(&a), cache.path_for(&b));
        assert_ne!(cache.path_for(&a), cache.path_for(&c));
    }

    #[test]
    fn clear_category_keeps_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), "c", SnapshotFormat::Png);
        cache.store(b"1", &key("A", "one")).unwrap();
        cache.store(b"2", &key("B", "two")).unwrap();
        cache.clear(ClearScope::Category(&key("A", "one")));
        assert!(cache.load(&key("A", "one")).is_none());
        assert_eq!(cache.load(&key("B", "two")).as_deref(), Some(&b"2"[..]));
    }

    #[test]
    fn unreadable_entry_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), "c", SnapshotFormat::Png);
        let k = key("A", "dir");
        // a directory where the file should be cannot be read as bytes
        fs::create_dir_all(cache.path_for(&k)).unwrap();
        assert!(cache.load(&k).is_none());
        assert!(!cache.path_for(&k).exists());
    }
}
