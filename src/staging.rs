use crate::model::{MessageKind, is_image_type};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Opaque handle to an allocated preview resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreviewId(u64);

/// Allocator for revocable preview resources backing staged image files.
/// In a browser host this is an object-URL pool; here the contract is just
/// allocate-once / release-exactly-once per staged image.
pub trait PreviewStore: Send + Sync {
    fn allocate(&self, file: &StagedFile) -> PreviewId;
    fn release(&self, id: PreviewId);
}

/// A locally picked file, not yet confirmed committed by the backend.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub name: String,
    pub media_type: String,
    pub size: u64,
    pub data: Vec<u8>,
}

impl StagedFile {
    pub fn is_image(&self) -> bool {
        is_image_type(&self.media_type)
    }
}

/// One staged entry: the file plus its preview handle (images only).
#[derive(Debug)]
pub struct StagedAttachment {
    pub file: StagedFile,
    preview: Option<PreviewId>,
}

impl StagedAttachment {
    pub fn preview(&self) -> Option<PreviewId> {
        self.preview
    }
}

/// Manages locally picked files before send. Entries and their previews
/// stay 1:1 index-aligned; every add/remove is a definite membership change
/// the caller can reconcile against the preview list.
pub struct AttachmentStaging {
    previews: Arc<dyn PreviewStore>,
    entries: Vec<StagedAttachment>,
}

impl AttachmentStaging {
    pub fn new(previews: Arc<dyn PreviewStore>) -> Self {
        Self {
            previews,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[StagedAttachment] {
        &self.entries
    }

    /// Clones of the staged files, in staging order, for the upload call.
    pub fn files(&self) -> Vec<StagedFile> {
        self.entries.iter().map(|e| e.file.clone()).collect()
    }

    /// Append each file as staged. Displayable images get an eagerly
    /// allocated preview handle; everything else stages without one.
    pub fn add(&mut self, files: Vec<StagedFile>) {
        for file in files {
            let preview = if file.is_image() {
                Some(self.previews.allocate(&file))
            } else {
                None
            };
            debug!("staged {} ({}), preview={:?}", file.name, file.media_type, preview);
            self.entries.push(StagedAttachment { file, preview });
        }
    }

    /// Remove one staged entry, releasing its preview handle if it owned
    /// one. Returns the removed file, or None when the index is out of
    /// range.
    pub fn remove_at(&mut self, index: usize) -> Option<StagedFile> {
        if index >= self.entries.len() {
            return None;
        }
        let mut entry = self.entries.remove(index);
        if let Some(id) = entry.preview.take() {
            self.previews.release(id);
        }
        Some(entry.file)
    }

    /// Remove and release everything, each preview handle exactly once.
    pub fn clear(&mut self) {
        for mut entry in self.entries.drain(..) {
            if let Some(id) = entry.preview.take() {
                self.previews.release(id);
            }
        }
    }

    /// Aggregate kind of the message about to be sent, computed from the
    /// staged set at send time: `image` only when every staged file is a
    /// displayable image, `file` otherwise, `text` with no attachments.
    pub fn classify(&self, _text: &str) -> MessageKind {
        if self.entries.is_empty() {
            MessageKind::Text
        } else if self.entries.iter().all(|e| e.file.is_image()) {
            MessageKind::Image
        } else {
            MessageKind::File
        }
    }
}

/// Reference `PreviewStore`: a live-handle set with allocation/release
/// counters. Used by tests and non-browser hosts.
#[derive(Default)]
pub struct InMemoryPreviews {
    next: AtomicU64,
    released: AtomicU64,
    live: Mutex<HashSet<u64>>,
}

impl InMemoryPreviews {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles allocated and not yet released.
    pub fn live(&self) -> usize {
        self.live.lock().expect("previews lock poisoned").len()
    }

    pub fn allocated(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }
}

impl PreviewStore for InMemoryPreviews {
    fn allocate(&self, _file: &StagedFile) -> PreviewId {
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        self.live.lock().expect("previews lock poisoned").insert(id);
        PreviewId(id)
    }

    fn release(&self, id: PreviewId) {
        let removed = self
            .live
            .lock()
            .expect("previews lock poisoned")
            .remove(&id.0);
        if removed {
            self.released.fetch_add(1, Ordering::SeqCst);
        } else {
            warn!("release of unknown preview handle {:?}", id);
        }
    }
}
