//! PDF Merge algorithm
//!
//! Accumulates selected pages from PDFs and rendered image pages into one
//! output document, preserving append order.

use crate::error::PdfMergeError;
use crate::ranges::PageSelection;
use crate::render::{decode_image, render_image_page};
use crate::task::Orientation;
use lopdf::{dictionary, Document, Object, ObjectId};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Upper bound on page tree depth when walking `Parent` links.
const MAX_TREE_DEPTH: usize = 64;

/// Load PDF bytes, decrypting with `password` if the document is encrypted.
pub fn load_pdf(bytes: &[u8], password: &str) -> Result<Document, PdfMergeError> {
    let mut doc = Document::load_mem(bytes)
        .map_err(|e| PdfMergeError::UnreadableDocument(format!("Failed to parse PDF: {}", e)))?;

    if doc.is_encrypted() {
        doc.decrypt(password).map_err(|e| {
            PdfMergeError::UnreadableDocument(format!("Failed to decrypt PDF: {}", e))
        })?;
        doc.trailer.remove(b"Encrypt");
    }

    Ok(doc)
}

/// Builds the merged output one source at a time.
///
/// The algorithm per source document:
/// 1. Resolve the page selection against the source's real page list
/// 2. Import all source objects with IDs offset past the destination's
/// 3. Copy inherited attributes onto each selected page and re-parent it
/// 4. Append the selected pages in ascending order
///
/// Objects only reachable from unselected pages are pruned in [`finish`].
///
/// [`finish`]: MergeBuilder::finish
pub struct MergeBuilder {
    doc: Document,
    pages_id: ObjectId,
    page_refs: Vec<ObjectId>,
}

impl MergeBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => Vec::<Object>::new(),
                "Count" => 0i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        Self {
            doc,
            pages_id,
            page_refs: Vec::new(),
        }
    }

    /// Number of pages appended so far.
    pub fn page_count(&self) -> usize {
        self.page_refs.len()
    }

    /// Append the selected pages of a PDF. Returns the number of pages added.
    pub fn append_pdf(
        &mut self,
        bytes: &[u8],
        selection: &PageSelection,
        password: &str,
    ) -> Result<usize, PdfMergeError> {
        let source = load_pdf(bytes, password)?;
        self.append_document(source, selection)
    }

    /// Render an image onto its own page and append it.
    pub fn append_image(
        &mut self,
        bytes: &[u8],
        orientation: Orientation,
    ) -> Result<usize, PdfMergeError> {
        let image = decode_image(bytes)?;
        let page = render_image_page(&image, orientation)?;
        self.append_document(page, &PageSelection::All)
    }

    /// Append the selected pages of an already loaded document.
    pub fn append_document(
        &mut self,
        source: Document,
        selection: &PageSelection,
    ) -> Result<usize, PdfMergeError> {
        let source_pages = get_page_references(&source);
        let selected: Vec<ObjectId> = selection
            .resolve(source_pages.len())
            .into_iter()
            .map(|index| source_pages[index])
            .collect();

        if selected.is_empty() {
            return Ok(0);
        }

        // Offset source IDs past everything already in the destination
        let id_offset = self.doc.max_id;
        let source_max_id = source.max_id;

        for (old_id, object) in source.objects.into_iter() {
            let new_id = (old_id.0 + id_offset, old_id.1);
            self.doc
                .objects
                .insert(new_id, remap_object_refs(object, id_offset));
        }
        self.doc.max_id = (source_max_id + id_offset).max(self.doc.max_id);

        for old_page_ref in selected.iter() {
            let page_ref = (old_page_ref.0 + id_offset, old_page_ref.1);
            inherit_page_attributes(&mut self.doc, page_ref);
            set_parent(&mut self.doc, page_ref, self.pages_id)?;
            self.page_refs.push(page_ref);
        }

        Ok(selected.len())
    }

    /// Write the page tree, drop unreachable objects, compress and serialize.
    pub fn finish(mut self) -> Result<Vec<u8>, PdfMergeError> {
        update_page_tree(&mut self.doc, self.pages_id, &self.page_refs)?;

        self.doc.prune_objects();
        self.doc.compress();

        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer).map_err(|e| {
            PdfMergeError::OperationError(format!("Failed to save merged PDF: {}", e))
        })?;

        Ok(buffer)
    }
}

impl Default for MergeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Get all page object references from a document, in page order
fn get_page_references(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().values().copied().collect()
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Copy attributes the page inherits from its ancestors onto the page itself.
///
/// Required before re-parenting, since the old ancestors no longer apply.
fn inherit_page_attributes(doc: &mut Document, page_id: ObjectId) {
    let mut inherited: Vec<(&[u8], Object)> = Vec::new();

    if let Ok(page) = doc.get_object(page_id).and_then(Object::as_dict) {
        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        let mut depth = 0;

        while let Some(parent_id) = parent {
            if depth >= MAX_TREE_DEPTH {
                break;
            }
            let Ok(node) = doc.get_object(parent_id).and_then(Object::as_dict) else {
                break;
            };

            for key in INHERITABLE_KEYS {
                let already_set =
                    page.get(key).is_ok() || inherited.iter().any(|(k, _)| *k == key);
                if !already_set {
                    if let Ok(value) = node.get(key) {
                        inherited.push((key, value.clone()));
                    }
                }
            }

            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
            depth += 1;
        }
    }

    if inherited.is_empty() {
        return;
    }
    if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
        for (key, value) in inherited {
            page.set(key, value);
        }
    }
}

fn set_parent(doc: &mut Document, page_id: ObjectId, pages_id: ObjectId) -> Result<(), PdfMergeError> {
    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|_| PdfMergeError::UnreadableDocument("Invalid page object".into()))?;
    page.set("Parent", Object::Reference(pages_id));
    Ok(())
}

/// Update the page tree in the destination document with new page references
fn update_page_tree(
    doc: &mut Document,
    pages_id: ObjectId,
    page_refs: &[ObjectId],
) -> Result<(), PdfMergeError> {
    if let Some(Object::Dictionary(ref mut pages_dict)) = doc.objects.get_mut(&pages_id) {
        let kids = page_refs
            .iter()
            .map(|&id| Object::Reference(id))
            .collect::<Vec<_>>();
        pages_dict.set("Kids", Object::Array(kids));
        pages_dict.set("Count", Object::Integer(page_refs.len() as i64));
    } else {
        return Err(PdfMergeError::OperationError(
            "Invalid pages dictionary".into(),
        ));
    }

    Ok(())
}
