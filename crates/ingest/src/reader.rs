use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

use crate::bioc::Collection;

pub struct FileReader;

impl FileReader {
    pub async fn read_collection(path: &Path) -> Result<Collection> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        match extension {
            "json" => {
                let content = fs::read_to_string(path)
                    .await
                    .context(format!("Failed to read file: {:?}", path))?;
                let collection = serde_json::from_str(&content)
                    .context(format!("Failed to parse BioC JSON: {:?}", path))?;
                Ok(collection)
            }
            _ => anyhow::bail!("Unsupported file format: {}", extension),
        }
    }

    /// BioC JSON files under `dir`, recursively, in path order.
    ///
    /// Previously written `*.annotated.json` outputs are skipped.
    pub fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.context(format!("Failed to walk directory: {:?}", dir))?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            if path.to_string_lossy().ends_with(".annotated.json") {
                continue;
            }
            files.push(path.to_path_buf());
        }

        files.sort();
        Ok(files)
    }

    pub async fn write_collection(collection: &Collection, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context(format!("Failed to create directory: {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(collection).context("Failed to serialize collection")?;
        fs::write(path, json)
            .await
            .context(format!("Failed to write file: {:?}", path))?;
        Ok(())
    }

    /// `<output_dir>/<input stem>.annotated.json`
    pub fn output_path(input: &Path, output_dir: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "collection".to_string());
        output_dir.join(format!("{}.annotated.json", stem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("c.json");
        let collection = Collection {
            source: "PMC".to_string(),
            ..Default::default()
        };

        FileReader::write_collection(&collection, &path).await.unwrap();
        let back = FileReader::read_collection(&path).await.unwrap();
        assert_eq!(back.source, "PMC");
    }

    #[tokio::test]
    async fn test_rejects_other_formats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        assert!(FileReader::read_collection(&path).await.is_err());
    }

    #[test]
    fn test_discover_is_recursive_and_skips_outputs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("nested").join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("b.annotated.json"), "{}").unwrap();
        std::fs::write(dir.path().join("readme.md"), "").unwrap();

        let files = FileReader::discover(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["b.json".to_string(), format!("nested{}a.json", std::path::MAIN_SEPARATOR)]);
    }

    #[test]
    fn test_output_path() {
        let out = FileReader::output_path(Path::new("/data/PMC1.json"), Path::new("/out"));
        assert_eq!(out, Path::new("/out/PMC1.annotated.json"));
    }
}
