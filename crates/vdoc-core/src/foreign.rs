//! Foreign document registry.
//!
//! Every virtual document owns the foreign documents opened for the embedded code of its
//! fragments. The registry tracks them per language, keeps the pool of standalone documents
//! that may be recycled, and expires documents left unreferenced for too many composition
//! passes.
//!
//! Allocation decisions are delegated to a [`ForeignDocumentSelector`]; the default
//! [`SharedOrPooledSelector`] shares one document per language for non-standalone extractors
//! and recycles pooled documents (LIFO) for standalone ones.

use crate::document::VirtualDocument;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

/// Number of consecutive unreferenced passes a foreign document survives by default.
pub const DEFAULT_FOREIGN_DOCUMENT_LIFETIME: u32 = 6;

/// Identifier of a foreign document inside its parent's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ForeignDocumentId(u64);

impl ForeignDocumentId {
    /// Get the underlying numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ForeignDocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A nested virtual document and its allocation metadata.
#[derive(Debug)]
pub struct ForeignDocumentHandle {
    id: ForeignDocumentId,
    language: String,
    standalone: bool,
    file_extension: String,
    virtual_id: String,
    remaining_lifetime: u32,
    document: VirtualDocument,
}

impl ForeignDocumentHandle {
    /// Registry id.
    pub fn id(&self) -> ForeignDocumentId {
        self.id
    }

    /// Embedded language id.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Whether this document is dedicated to a single occurrence.
    pub fn standalone(&self) -> bool {
        self.standalone
    }

    /// File extension hint.
    pub fn file_extension(&self) -> &str {
        &self.file_extension
    }

    /// Identifier the document is registered under: the language, or `N(language)` for
    /// standalone documents.
    pub fn virtual_id(&self) -> &str {
        &self.virtual_id
    }

    /// Passes left before the document expires if it stays unreferenced.
    pub fn remaining_lifetime(&self) -> u32 {
        self.remaining_lifetime
    }

    /// The nested document.
    pub fn document(&self) -> &VirtualDocument {
        &self.document
    }

    /// The nested document, mutably.
    pub fn document_mut(&mut self) -> &mut VirtualDocument {
        &mut self.document
    }

    /// Consume the handle, returning the nested document.
    pub fn into_document(self) -> VirtualDocument {
        self.document
    }
}

/// What an extractor asks for when it finds foreign code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignDocumentRequest<'a> {
    /// Embedded language id.
    pub language: &'a str,
    /// Whether the extractor wants a dedicated document.
    pub standalone: bool,
    /// File extension hint.
    pub file_extension: &'a str,
}

/// Outcome of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignSelection {
    /// Append to this existing document.
    Reuse(ForeignDocumentId),
    /// Open a new document.
    Open,
}

/// Policy deciding which foreign document receives an excerpt.
pub trait ForeignDocumentSelector: fmt::Debug + Send + Sync {
    /// Pick a document for `request`. May take documents out of the standalone pool.
    fn select(
        &self,
        registry: &mut ForeignDocumentRegistry,
        request: &ForeignDocumentRequest<'_>,
    ) -> ForeignSelection;
}

/// Default policy: one shared document per language, pooled reuse for standalone requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SharedOrPooledSelector;

impl ForeignDocumentSelector for SharedOrPooledSelector {
    fn select(
        &self,
        registry: &mut ForeignDocumentRegistry,
        request: &ForeignDocumentRequest<'_>,
    ) -> ForeignSelection {
        if !request.standalone {
            if let Some(id) = registry.shared(request.language) {
                return ForeignSelection::Reuse(id);
            }
        } else if let Some(id) = registry.take_unused_standalone(request.language) {
            return ForeignSelection::Reuse(id);
        }
        ForeignSelection::Open
    }
}

/// Foreign documents owned by one virtual document.
#[derive(Debug)]
pub struct ForeignDocumentRegistry {
    lifetime: u32,
    next_id: u64,
    documents: BTreeMap<ForeignDocumentId, ForeignDocumentHandle>,
    virtual_ids: HashMap<String, ForeignDocumentId>,
    unused: BTreeSet<ForeignDocumentId>,
    unused_standalone: HashMap<String, Vec<ForeignDocumentId>>,
}

impl Default for ForeignDocumentRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_FOREIGN_DOCUMENT_LIFETIME)
    }
}

impl ForeignDocumentRegistry {
    /// Create an empty registry whose documents survive `lifetime` unreferenced passes.
    pub fn new(lifetime: u32) -> Self {
        Self {
            lifetime,
            next_id: 0,
            documents: BTreeMap::new(),
            virtual_ids: HashMap::new(),
            unused: BTreeSet::new(),
            unused_standalone: HashMap::new(),
        }
    }

    /// Configured lifetime.
    pub fn lifetime(&self) -> u32 {
        self.lifetime
    }

    /// Number of live documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns `true` if no document is live.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Returns `true` if `id` is live.
    pub fn contains(&self, id: ForeignDocumentId) -> bool {
        self.documents.contains_key(&id)
    }

    /// Live document `id`.
    pub fn get(&self, id: ForeignDocumentId) -> Option<&ForeignDocumentHandle> {
        self.documents.get(&id)
    }

    /// Live document `id`, mutably.
    pub fn get_mut(&mut self, id: ForeignDocumentId) -> Option<&mut ForeignDocumentHandle> {
        self.documents.get_mut(&id)
    }

    /// Document registered under `virtual_id`.
    pub fn by_virtual_id(&self, virtual_id: &str) -> Option<ForeignDocumentId> {
        self.virtual_ids.get(virtual_id).copied()
    }

    /// The shared (non-standalone) document of `language`.
    pub fn shared(&self, language: &str) -> Option<ForeignDocumentId> {
        self.by_virtual_id(language)
    }

    /// Pop the most recently pooled standalone document of `language`.
    pub fn take_unused_standalone(&mut self, language: &str) -> Option<ForeignDocumentId> {
        let id = self.unused_standalone.get_mut(language)?.pop()?;
        self.unused.remove(&id);
        Some(id)
    }

    /// Standalone documents of `language` currently available for reuse.
    pub fn unused_standalone(&self, language: &str) -> &[ForeignDocumentId] {
        self.unused_standalone
            .get(language)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns `true` if `id` has not been chosen since the current pass began.
    pub fn is_unused(&self, id: ForeignDocumentId) -> bool {
        self.unused.contains(&id)
    }

    /// Live documents in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &ForeignDocumentHandle> {
        self.documents.values()
    }

    /// Live documents in creation order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ForeignDocumentHandle> {
        self.documents.values_mut()
    }

    /// Register a new document built by `build` from its virtual id.
    pub fn open<F>(
        &mut self,
        language: &str,
        standalone: bool,
        file_extension: &str,
        build: F,
    ) -> ForeignDocumentId
    where
        F: FnOnce(&str) -> VirtualDocument,
    {
        let id = ForeignDocumentId(self.next_id);
        self.next_id += 1;
        let virtual_id = if standalone {
            format!("{id}({language})")
        } else {
            language.to_string()
        };
        let document = build(&virtual_id);
        self.virtual_ids.insert(virtual_id.clone(), id);
        self.documents.insert(
            id,
            ForeignDocumentHandle {
                id,
                language: language.to_string(),
                standalone,
                file_extension: file_extension.to_string(),
                virtual_id,
                remaining_lifetime: self.lifetime,
                document,
            },
        );
        id
    }

    /// Mark `id` as chosen in this pass and restore its full lifetime.
    pub fn touch(&mut self, id: ForeignDocumentId) {
        if let Some(handle) = self.documents.get_mut(&id) {
            handle.remaining_lifetime = self.lifetime;
        }
        self.unused.remove(&id);
        for pool in self.unused_standalone.values_mut() {
            pool.retain(|pooled| *pooled != id);
        }
    }

    /// Start a composition pass: every document becomes unused and every standalone document
    /// returns to the pool of its language.
    pub fn begin_pass(&mut self) {
        self.unused = self.documents.keys().copied().collect();
        self.unused_standalone.clear();
        for handle in self.documents.values().filter(|handle| handle.standalone) {
            self.unused_standalone
                .entry(handle.language.clone())
                .or_default()
                .push(handle.id);
        }
    }

    /// Age every document not in `used` by one pass and remove those whose lifetime ran out.
    ///
    /// Removed handles are returned so the caller can dispose them.
    pub fn expire(&mut self, used: &HashSet<ForeignDocumentId>) -> Vec<ForeignDocumentHandle> {
        let mut expired = Vec::new();
        for handle in self.documents.values_mut() {
            if used.contains(&handle.id) {
                continue;
            }
            handle.remaining_lifetime = handle.remaining_lifetime.saturating_sub(1);
            if handle.remaining_lifetime == 0 {
                expired.push(handle.id);
            }
        }
        expired
            .into_iter()
            .filter_map(|id| self.remove(id))
            .collect()
    }

    /// Remove `id` and every identifier it was registered under.
    pub fn remove(&mut self, id: ForeignDocumentId) -> Option<ForeignDocumentHandle> {
        let handle = self.documents.remove(&id)?;
        self.virtual_ids.retain(|_, registered| *registered != id);
        self.unused.remove(&id);
        for pool in self.unused_standalone.values_mut() {
            pool.retain(|pooled| *pooled != id);
        }
        Some(handle)
    }

    /// Remove every document.
    pub fn drain(&mut self) -> Vec<ForeignDocumentHandle> {
        self.virtual_ids.clear();
        self.unused.clear();
        self.unused_standalone.clear();
        std::mem::take(&mut self.documents).into_values().collect()
    }
}
