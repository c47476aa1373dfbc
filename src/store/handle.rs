//! Short-lived handle over decrypted document bytes.

/// Decrypted document contents, scoped to the current use. The buffer is
/// wiped when the handle drops, so release happens on every exit path,
/// including display failures and cancelled retrievals.
pub struct DocumentHandle {
    content_address: String,
    bytes: Vec<u8>,
}

impl DocumentHandle {
    pub(crate) fn new(content_address: String, bytes: Vec<u8>) -> Self {
        Self {
            content_address,
            bytes,
        }
    }

    pub fn content_address(&self) -> &str {
        &self.content_address
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Explicit release; equivalent to dropping the handle.
    pub fn release(self) {}
}

impl Drop for DocumentHandle {
    fn drop(&mut self) {
        self.bytes.fill(0);
        self.bytes.clear();
    }
}

impl std::fmt::Debug for DocumentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentHandle")
            .field("content_address", &self.content_address)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_exposes_bytes() {
        let handle = DocumentHandle::new("addr-1".to_string(), vec![1, 2, 3]);
        assert_eq!(handle.bytes(), &[1, 2, 3]);
        assert_eq!(handle.len(), 3);
        assert_eq!(handle.content_address(), "addr-1");
        handle.release();
    }

    #[test]
    fn test_debug_hides_contents() {
        let handle = DocumentHandle::new("addr-1".to_string(), vec![9; 16]);
        let debug = format!("{:?}", handle);
        assert!(debug.contains("addr-1"));
        assert!(!debug.contains('9'));
    }
}
