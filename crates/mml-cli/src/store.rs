use std::fs;
use std::path::{Path, PathBuf};

use mml_core::MmlError;
use mml_runtime::DocumentStore;
use mml_xml::{parse_xml_document, write_node, XmlDocument};
use tracing::debug;

use crate::{map_store_read, map_store_write};

const REGION_PREFIX: &str = "region:";
const REGION_ESCAPED: &str = "region_";

// Game files may hold several top-level elements, so each load wraps the body in a synthetic root.
#[derive(Debug, Clone)]
pub(crate) struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub(crate) fn new(files_dir: &str, media_dir: &str) -> Self {
        Self {
            root: Path::new(files_dir).join(media_dir),
        }
    }

    pub(crate) fn document_path(&self, path: &str) -> PathBuf {
        self.root.join(format!("{}.xml", path).replace("..", "."))
    }
}

fn strip_declaration(content: &str) -> &str {
    let trimmed = content.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with("<?xml") {
        if let Some(end) = trimmed.find("?>") {
            return &trimmed[end + 2..];
        }
    }
    trimmed
}

impl DocumentStore for FsDocumentStore {
    fn load(&self, path: &str) -> Result<Option<XmlDocument>, MmlError> {
        let file = self.document_path(path);
        if !file.is_file() {
            return Ok(None);
        }
        debug!(file = %file.display(), "load document");
        let content = fs::read_to_string(&file).map_err(map_store_read)?;
        let body = strip_declaration(&content).replace(REGION_PREFIX, REGION_ESCAPED);
        parse_xml_document(&format!("<root>{}</root>", body)).map(Some)
    }

    fn persist(&self, path: &str, document: &XmlDocument) -> Result<(), MmlError> {
        let file = self.document_path(path);
        let root = document.root_element();
        let body = document
            .children(root)
            .iter()
            .map(|child| write_node(document, *child))
            .collect::<Vec<_>>()
            .join("\n")
            .replace(REGION_ESCAPED, REGION_PREFIX);

        debug!(file = %file.display(), "persist document");
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).map_err(map_store_write)?;
        }
        fs::write(&file, body).map_err(map_store_write)
    }
}
