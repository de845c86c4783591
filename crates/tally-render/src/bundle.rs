use std::path::Path;

use tally_workbook::Document;
use tracing::info;

use crate::atomic::write_all_atomic;
use crate::error::Result;
use crate::manifest::manifest_bytes;
use crate::xlsx::workbook_bytes;

/// Writes the workbook and, when `manifest` is given, its manifest.
///
/// Both files land together or not at all: a failure on either leaves
/// neither behind.
pub fn write_document(
    document: &Document,
    catalogue_version: &str,
    workbook: &Path,
    manifest: Option<&Path>,
) -> Result<()> {
    let xlsx = workbook_bytes(document)?;
    let json = match manifest {
        Some(_) => Some(manifest_bytes(document, catalogue_version)?),
        None => None,
    };

    let mut files: Vec<(&Path, &[u8])> = vec![(workbook, xlsx.as_slice())];
    if let (Some(path), Some(bytes)) = (manifest, json.as_deref()) {
        files.push((path, bytes));
    }
    write_all_atomic(&files)?;

    info!(
        document = %document.id(),
        path = %workbook.display(),
        manifest = manifest.is_some(),
        "document written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tally_core::{DocumentId, ModelKind, Registry};
    use tally_workbook::{Assembler, LayoutOptions};

    fn generate(registry: &Registry) -> Document {
        Assembler::new(registry, LayoutOptions::default())
            .generate(DocumentId::Standalone(ModelKind::Host))
            .unwrap()
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn writes_workbook_and_manifest() {
        let registry = Registry::canonical().unwrap();
        let doc = generate(&registry);
        let dir = tempfile::tempdir().unwrap();
        let xlsx = dir.path().join("host.xlsx");
        let json = dir.path().join("host.manifest.json");

        write_document(&doc, registry.version(), &xlsx, Some(&json)).unwrap();
        assert_eq!(names(dir.path()), vec!["host.manifest.json", "host.xlsx"]);
        assert_eq!(std::fs::read(&xlsx).unwrap(), workbook_bytes(&doc).unwrap());
    }

    #[test]
    fn manifest_failure_drops_the_workbook() {
        let registry = Registry::canonical().unwrap();
        let doc = generate(&registry);
        let dir = tempfile::tempdir().unwrap();
        let xlsx = dir.path().join("host.xlsx");
        let json = dir.path().join("host.manifest.json");
        std::fs::create_dir_all(json.join("child")).unwrap();

        assert!(write_document(&doc, registry.version(), &xlsx, Some(&json)).is_err());
        assert_eq!(names(dir.path()), vec!["host.manifest.json"]);
        assert!(json.is_dir());
    }
}
