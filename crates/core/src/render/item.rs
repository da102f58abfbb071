//! Items that can be drawn as cached list rows

use sha2::{Digest, Sha256};

use crate::types::{Contact, Conversation};

/// A row in a cached list
pub trait ListItem {
    /// Stable identity of the row
    fn key(&self) -> &str;

    /// Feed everything the row displays into the content hash
    ///
    /// Defaults to the key alone.
    fn digest(&self, hasher: &mut Sha256) {
        hasher.update(self.key().as_bytes());
    }
}

impl ListItem for Conversation {
    fn key(&self) -> &str {
        &self.id
    }

    fn digest(&self, hasher: &mut Sha256) {
        hasher.update(self.id.as_bytes());
        hasher.update([0]);
        hasher.update(self.title.as_bytes());
        hasher.update([0]);
        hasher.update(self.unread.to_be_bytes());
        hasher.update(self.last_message_at.unwrap_or(0).to_be_bytes());
        if let Some(preview) = &self.last_message_preview {
            hasher.update(preview.as_bytes());
        }
    }
}

impl ListItem for Contact {
    fn key(&self) -> &str {
        &self.user_id
    }

    fn digest(&self, hasher: &mut Sha256) {
        hasher.update(self.user_id.as_bytes());
        hasher.update([0]);
        hasher.update(self.display_name.as_bytes());
    }
}

/// SHA-256 (lowercase hex) over the ordered items
pub fn content_hash<I: ListItem>(items: &[I]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((items.len() as u64).to_be_bytes());
    for item in items {
        item.digest(&mut hasher);
        hasher.update([0xff]);
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
