pub mod bioc;
pub mod reader;

pub use bioc::{Cell, Collection, DataSection, Document, Infons, Passage, TableElement};
pub use reader::FileReader;

use anyhow::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Generate a stable document ID from file path
pub fn generate_doc_id(path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

/// Load one BioC file, filling in missing document ids from the path.
pub async fn ingest_file(file_path: &Path) -> Result<Collection> {
    let mut collection = FileReader::read_collection(file_path).await?;
    let path_str = file_path.to_string_lossy().to_string();

    for (i, doc) in collection.documents.iter_mut().enumerate() {
        if doc.id.is_empty() {
            doc.id = generate_doc_id(&format!("{}#{}", path_str, i));
        }
    }

    tracing::debug!(path = %path_str, documents = collection.documents.len(), "Loaded collection");
    Ok(collection)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_id_is_stable() {
        let a = generate_doc_id("data/PMC1.json");
        assert_eq!(a, generate_doc_id("data/PMC1.json"));
        assert_ne!(a, generate_doc_id("data/PMC2.json"));
        assert_eq!(a.len(), 32);
    }

    #[tokio::test]
    async fn test_ingest_file_fills_missing_ids() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        std::fs::write(
            &good,
            r#"{"source": "PMC", "documents": [{"id": "", "passages": []}, {"id": "PMC9", "passages": []}]}"#,
        )
        .unwrap();
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "not json").unwrap();

        let collection = ingest_file(&good).await.unwrap();
        assert_eq!(collection.documents[0].id.len(), 32);
        assert_eq!(collection.documents[1].id, "PMC9");
        assert!(ingest_file(&bad).await.is_err());
    }
}
