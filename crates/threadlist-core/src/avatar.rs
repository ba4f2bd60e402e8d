use std::collections::{HashMap, HashSet};

/// Cached avatar slot for one image URL.
///
/// The engine only manages slot lifetime; the surrounding application fills
/// in the loaded bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvatarEntry {
    bytes: Option<Vec<u8>>,
}

impl AvatarEntry {
    /// Loaded image bytes, when the application has filled the slot.
    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    /// Store loaded image bytes.
    pub fn set_bytes(&mut self, bytes: Vec<u8>) {
        self.bytes = Some(bytes);
    }
}

/// Secondary cache keyed by image URL.
///
/// Entries are created lazily on first request and pruned by mark-and-sweep
/// against the URLs currently referenced by any conversation. There is no
/// size- or time-based eviction.
#[derive(Debug, Clone, Default)]
pub struct AvatarCache {
    entries: HashMap<String, AvatarEntry>,
}

impl AvatarCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached slots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Existing slot for a URL.
    pub fn get(&self, url: &str) -> Option<&AvatarEntry> {
        self.entries.get(url)
    }

    /// Slot for a URL, created on first request.
    pub fn get_or_create(&mut self, url: &str) -> &mut AvatarEntry {
        self.entries.entry(url.to_owned()).or_default()
    }

    /// Drop every slot whose URL is no longer referenced.
    pub fn prune_unreferenced<'a>(&mut self, referenced: impl IntoIterator<Item = &'a str>) {
        let keep: HashSet<&str> = referenced.into_iter().collect();
        self.entries.retain(|url, _| keep.contains(url.as_str()));
    }
}
