use crate::error::{Error, Result};
use crate::models::document::{MergedDocument, SourceDocument};
use crate::utils::natural_sort::natural_cmp;
use bytes::Bytes;
use lopdf::{Document, Object, ObjectId};
use reqwest::Client;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Validated source bytes keyed by catalog URL, so repeated merges within a
/// session do not re-download the same chapters. Bounded, oldest-first
/// eviction; a last-write-wins race between two requests for the same key is
/// benign since both store identical bytes.
#[derive(Debug, Default)]
struct SourceCache {
    capacity: usize,
    entries: HashMap<String, Bytes>,
    order: VecDeque<String>,
}

impl SourceCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, key: &str) -> Option<Bytes> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: String, bytes: Bytes) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key, bytes);
            return;
        }
        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, bytes);
    }
}

#[derive(Clone)]
pub struct AssemblerService {
    client: Client,
    max_merged_bytes: usize,
    cache: Arc<Mutex<SourceCache>>,
}

impl AssemblerService {
    pub fn new(client: Client, max_merged_bytes: usize, cache_capacity: usize) -> Self {
        Self {
            client,
            max_merged_bytes,
            cache: Arc::new(Mutex::new(SourceCache::new(cache_capacity))),
        }
    }

    /// Downloads one catalog PDF, validating before caching so corrupt
    /// upstream files are never served from cache later.
    pub async fn fetch_source(&self, url: &str) -> Result<SourceDocument> {
        let name = display_name(url);

        if let Some(bytes) = self
            .cache
            .lock()
            .expect("source cache mutex poisoned")
            .get(url)
        {
            tracing::debug!(url, "source cache hit");
            return Ok(SourceDocument::new(name, bytes));
        }

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::BadRequest(format!(
                "Could not fetch source document {}: HTTP {}",
                name,
                response.status()
            )));
        }
        let bytes = response.bytes().await?;

        let source = SourceDocument::new(name.clone(), bytes.clone());
        validate_source(&source)?;

        self.cache
            .lock()
            .expect("source cache mutex poisoned")
            .put(url.to_string(), bytes);

        Ok(source)
    }

    /// Concatenates the pages of every source into one document. Inputs are
    /// sorted by display name first, so the output does not depend on
    /// selection order. Any invalid source aborts the whole merge before a
    /// single page is copied.
    pub fn merge(&self, mut sources: Vec<SourceDocument>) -> Result<MergedDocument> {
        sources.sort_by(|a, b| natural_cmp(&a.name, &b.name));

        let mut loaded = Vec::with_capacity(sources.len());
        let mut expected_pages = 0usize;
        for source in &sources {
            let doc = validate_source(source)?;
            expected_pages += doc.get_pages().len();
            loaded.push(doc);
        }

        if expected_pages == 0 {
            return Err(Error::EmptyMergeResult);
        }

        let (mut document, page_count) = concat_documents(loaded)?;
        debug_assert_eq!(page_count, expected_pages);

        let mut bytes = Vec::new();
        document.save_to(&mut bytes)?;
        if bytes.len() > self.max_merged_bytes {
            return Err(Error::OversizedResult {
                size: bytes.len(),
                limit: self.max_merged_bytes,
            });
        }

        let filename = crate::utils::time::merged_filename(crate::utils::time::now());
        tracing::info!(pages = page_count, size = bytes.len(), %filename, "merged sources");

        Ok(MergedDocument {
            bytes,
            page_count,
            filename,
        })
    }
}

fn display_name(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.last().map(|s| s.to_string()))
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| url.to_string())
}

/// Magic-header plus parse check. Returns the parsed document so the merge
/// does not load the bytes twice.
fn validate_source(source: &SourceDocument) -> Result<Document> {
    if source.bytes.is_empty() || !source.has_pdf_magic() {
        return Err(Error::InvalidDocument(source.name.clone()));
    }
    Document::load_mem(&source.bytes).map_err(|e| {
        tracing::warn!(name = %source.name, error = %e, "rejecting unparseable source");
        Error::InvalidDocument(source.name.clone())
    })
}

/// Renumber-and-collect merge: every input is renumbered into one id space,
/// page objects are re-parented under a single page tree, and one catalog
/// points at it. Page order is the concatenation of each document's own page
/// order.
fn concat_documents(documents: Vec<Document>) -> Result<(Document, usize)> {
    let mut max_id = 1;
    let mut ordered_page_ids: Vec<ObjectId> = Vec::new();
    let mut page_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut collected_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for mut doc in documents {
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for (_, page_id) in doc.get_pages() {
            let object = doc.get_object(page_id)?.clone();
            ordered_page_ids.push(page_id);
            page_objects.insert(page_id, object);
        }
        collected_objects.extend(doc.objects.clone());
    }

    let mut document = Document::with_version("1.5");
    let mut catalog_object: Option<(ObjectId, Object)> = None;
    let mut pages_object: Option<(ObjectId, Object)> = None;

    for (object_id, object) in collected_objects.iter() {
        match object.type_name().unwrap_or("") {
            "Catalog" => {
                catalog_object = Some((
                    if let Some((id, _)) = catalog_object {
                        id
                    } else {
                        *object_id
                    },
                    object.clone(),
                ));
            }
            "Pages" => {
                if let Ok(dictionary) = object.as_dict() {
                    let mut dictionary = dictionary.clone();
                    if let Some((_, ref existing)) = pages_object {
                        if let Ok(existing_dict) = existing.as_dict() {
                            dictionary.extend(existing_dict);
                        }
                    }
                    pages_object = Some((
                        if let Some((id, _)) = pages_object {
                            id
                        } else {
                            *object_id
                        },
                        Object::Dictionary(dictionary),
                    ));
                }
            }
            "Page" => {}
            "Outlines" | "Outline" => {}
            _ => {
                document.objects.insert(*object_id, object.clone());
            }
        }
    }

    let (pages_id, pages_dict_object) = pages_object
        .ok_or_else(|| Error::Internal("merged inputs contain no page tree".to_string()))?;
    let (catalog_id, catalog_dict_object) = catalog_object
        .ok_or_else(|| Error::Internal("merged inputs contain no catalog".to_string()))?;

    for page_id in &ordered_page_ids {
        if let Some(object) = page_objects.get(page_id) {
            if let Ok(dictionary) = object.as_dict() {
                let mut dictionary = dictionary.clone();
                dictionary.set("Parent", pages_id);
                document
                    .objects
                    .insert(*page_id, Object::Dictionary(dictionary));
            }
        }
    }

    if let Ok(dictionary) = pages_dict_object.as_dict() {
        let mut dictionary = dictionary.clone();
        dictionary.set("Count", ordered_page_ids.len() as i64);
        dictionary.set(
            "Kids",
            ordered_page_ids
                .iter()
                .map(|id| Object::Reference(*id))
                .collect::<Vec<_>>(),
        );
        document.objects.insert(pages_id, Object::Dictionary(dictionary));
    }

    if let Ok(dictionary) = catalog_dict_object.as_dict() {
        let mut dictionary = dictionary.clone();
        dictionary.set("Pages", pages_id);
        dictionary.remove(b"Outlines");
        document
            .objects
            .insert(catalog_id, Object::Dictionary(dictionary));
    }

    document.trailer.set("Root", catalog_id);
    document.max_id = document.objects.len() as u32;
    document.renumber_objects();
    document.compress();

    Ok((document, ordered_page_ids.len()))
}
