//! Binary Merge Utility: concatenates PDF documents page by page.
//!
//! Pages are copied in input order, and within each input in original page
//! order. Attributes a page inherits from its page tree (resources, media box,
//! crop box, rotation) are copied onto the page, since the source tree is
//! replaced by a single flat one. Any unreadable input aborts the whole merge.

use bytes::Bytes;
use lopdf::{Dictionary, Document, Object, ObjectId};
use thiserror::Error;
use tracing::info;

const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];
const MAX_TREE_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub struct BinaryDocument {
    pub name: String,
    pub bytes: Bytes,
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("select at least 2 documents to merge (got {count})")]
    TooFewDocuments { count: usize },

    #[error("'{name}' could not be read as a PDF: {reason}")]
    Unreadable { name: String, reason: String },

    #[error("could not write the merged document: {0}")]
    Write(String),

    #[error("merge task failed: {0}")]
    Task(String),
}

/// Merges on the blocking pool; PDF parsing is CPU-bound.
pub async fn merge_documents_blocking(
    documents: Vec<BinaryDocument>,
) -> Result<(Bytes, usize), MergeError> {
    tokio::task::spawn_blocking(move || merge_documents(&documents))
        .await
        .map_err(|e| MergeError::Task(e.to_string()))?
}

/// Returns the merged PDF and its page count.
pub fn merge_documents(documents: &[BinaryDocument]) -> Result<(Bytes, usize), MergeError> {
    if documents.len() < 2 {
        return Err(MergeError::TooFewDocuments {
            count: documents.len(),
        });
    }

    let mut merged = Document::with_version("1.5");
    let mut max_id = 1;
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();

    for input in documents {
        let unreadable = |reason: String| MergeError::Unreadable {
            name: input.name.clone(),
            reason,
        };

        let mut doc = Document::load_mem(&input.bytes).map_err(|e| unreadable(e.to_string()))?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(unreadable("document has no pages".to_string()));
        }
        for page_id in page_ids {
            let page = flatten_page(&doc, page_id).map_err(|e| unreadable(e.to_string()))?;
            pages.push((page_id, page));
        }

        merged.objects.extend(doc.objects);
    }

    merged.max_id = max_id;
    let pages_id = merged.new_object_id();

    let mut kids = Vec::with_capacity(pages.len());
    for (page_id, mut page) in pages {
        page.set("Parent", Object::Reference(pages_id));
        merged.objects.insert(page_id, Object::Dictionary(page));
        kids.push(Object::Reference(page_id));
    }
    let page_count = kids.len();

    let mut tree = Dictionary::new();
    tree.set("Type", Object::Name(b"Pages".to_vec()));
    tree.set("Count", Object::Integer(page_count as i64));
    tree.set("Kids", Object::Array(kids));
    merged.objects.insert(pages_id, Object::Dictionary(tree));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = merged.add_object(Object::Dictionary(catalog));
    merged.trailer.set("Root", Object::Reference(catalog_id));

    // The source catalogs and page trees are now unreachable.
    merged.prune_objects();
    merged.renumber_objects();
    merged.compress();

    let mut buffer = Vec::new();
    merged
        .save_to(&mut buffer)
        .map_err(|e| MergeError::Write(e.to_string()))?;

    info!(
        "Merged {} documents into {} pages ({} bytes)",
        documents.len(),
        page_count,
        buffer.len()
    );
    Ok((Bytes::from(buffer), page_count))
}

/// Copy of a page dictionary with inherited attributes resolved and no parent.
fn flatten_page(doc: &Document, page_id: ObjectId) -> lopdf::Result<Dictionary> {
    let mut page = doc.get_dictionary(page_id)?.clone();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    let mut depth = 0;
    while let Some(parent_id) = parent {
        depth += 1;
        if depth > MAX_TREE_DEPTH {
            break;
        }
        let node = match doc.get_dictionary(parent_id) {
            Ok(node) => node,
            Err(_) => break,
        };
        for key in INHERITABLE_KEYS {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    page.remove(b"Parent");
    Ok(page)
}
