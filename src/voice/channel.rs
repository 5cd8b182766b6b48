//! Channel tree collected during the handshake, with path resolution.
//!
//! The server announces every channel as `ChannelState` messages before
//! `ServerSync`. Channel 0 is always the root. A target like
//! `Games/Quake` is resolved by walking name-matched children from the
//! root; a leading segment naming the root channel itself is accepted, so
//! the default `Root` resolves on a stock murmur install.

use std::collections::HashMap;

pub const ROOT_CHANNEL: u32 = 0;

#[derive(Debug, Clone)]
pub struct ChannelEntry {
    pub name: String,
    pub parent: Option<u32>,
}

#[derive(Debug, Default)]
pub struct ChannelTree {
    channels: HashMap<u32, ChannelEntry>,
}

impl ChannelTree {
    pub fn insert(&mut self, id: u32, name: String, parent: Option<u32>) {
        self.channels.insert(id, ChannelEntry { name, parent });
    }

    pub fn remove(&mut self, id: u32) {
        self.channels.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn name_of(&self, id: u32) -> Option<&str> {
        self.channels.get(&id).map(|c| c.name.as_str())
    }

    /// Resolve a `/`-separated path starting at the root channel.
    ///
    /// Empty segments are ignored. Returns `None` as soon as a segment has
    /// no matching child; the caller treats that as fatal.
    pub fn resolve_path(&self, path: &str) -> Option<u32> {
        let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();

        // Accept "Root/..." style paths that spell out the root channel.
        if let Some(first) = segments.peek() {
            let root_name = self.name_of(ROOT_CHANNEL);
            if root_name == Some(*first) {
                segments.next();
            }
        }

        let mut current = ROOT_CHANNEL;
        for segment in segments {
            current = self.child_named(current, segment)?;
        }
        Some(current)
    }

    fn child_named(&self, parent: u32, name: &str) -> Option<u32> {
        self.channels
            .iter()
            .find(|(_, c)| c.parent == Some(parent) && c.name == name)
            .map(|(id, _)| *id)
    }
}
