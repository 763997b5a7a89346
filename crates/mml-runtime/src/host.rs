use std::collections::BTreeMap;
use std::sync::Mutex;

use mml_core::MmlError;
use mml_xml::{parse_xml_document, write_document, XmlDocument};

// `Ok(None)` means the script does not exist; unreadable sources are errors.
pub trait SourceResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Result<Option<String>, MmlError>;
}

pub trait DocumentStore: Send + Sync {
    fn load(&self, path: &str) -> Result<Option<XmlDocument>, MmlError>;
    fn persist(&self, path: &str, document: &XmlDocument) -> Result<(), MmlError>;
}

#[derive(Debug, Default, Clone)]
pub struct MapSourceResolver {
    sources: BTreeMap<String, String>,
}

impl MapSourceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, name: &str, source: &str) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&mut self, name: &str, source: &str) {
        self.sources.insert(name.to_string(), source.to_string());
    }
}

impl SourceResolver for MapSourceResolver {
    fn resolve(&self, name: &str) -> Result<Option<String>, MmlError> {
        Ok(self.sources.get(name).cloned())
    }
}

// Keeps documents as XML text so every load parses and every persist serialises.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<BTreeMap<String, String>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, path: &str, xml: &str) -> Self {
        if let Ok(mut documents) = self.documents.lock() {
            documents.insert(path.to_string(), xml.to_string());
        }
        self
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.documents
            .lock()
            .ok()
            .and_then(|documents| documents.get(path).cloned())
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn load(&self, path: &str) -> Result<Option<XmlDocument>, MmlError> {
        let documents = self.documents.lock().map_err(|_| {
            MmlError::new("STORE_READ", format!("Document store lock poisoned reading '{}'.", path))
        })?;
        documents
            .get(path)
            .map(|xml| parse_xml_document(xml))
            .transpose()
    }

    fn persist(&self, path: &str, document: &XmlDocument) -> Result<(), MmlError> {
        let mut documents = self.documents.lock().map_err(|_| {
            MmlError::new("STORE_WRITE", format!("Document store lock poisoned writing '{}'.", path))
        })?;
        documents.insert(path.to_string(), write_document(document));
        Ok(())
    }
}

#[cfg(test)]
mod host_tests {
    use super::*;

    #[test]
    fn map_resolver_returns_registered_sources() {
        let resolver = MapSourceResolver::new().with_source("main", "const a = 1");
        assert_eq!(
            resolver.resolve("main").expect("resolve").as_deref(),
            Some("const a = 1")
        );
        assert_eq!(resolver.resolve("missing").expect("resolve"), None);
    }

    #[test]
    fn memory_store_round_trips_documents() {
        let store = MemoryDocumentStore::new().with_document("units/truck", "<Truck a=\"1\"/>");
        let mut document = store
            .load("units/truck")
            .expect("load should succeed")
            .expect("document exists");
        let root = document.root_element();
        document.set_attribute(root, "b", "2").expect("set attribute");
        store.persist("units/truck", &document).expect("persist");
        assert_eq!(
            store.get("units/truck").as_deref(),
            Some("<Truck a=\"1\" b=\"2\" />")
        );
        assert!(store.load("units/none").expect("load").is_none());
    }

    #[test]
    fn memory_store_keeps_namespace_prefixes() {
        let xml = "<root xmlns:x=\"urn:x\"><x:item x:a=\"1\" xml:lang=\"en\" /></root>";
        let store = MemoryDocumentStore::new().with_document("ns", xml);
        let document = store
            .load("ns")
            .expect("load should succeed")
            .expect("document exists");
        store.persist("ns", &document).expect("persist");
        assert_eq!(
            store.get("ns").as_deref(),
            Some("<root xmlns:x=\"urn:x\">\n  <x:item x:a=\"1\" xml:lang=\"en\" />\n</root>")
        );
    }

    #[test]
    fn memory_store_reports_malformed_xml() {
        let store = MemoryDocumentStore::new().with_document("bad", "<a>");
        let error = store.load("bad").expect_err("malformed xml should fail");
        assert_eq!(error.code, "XML_PARSE_ERROR");
    }
}
