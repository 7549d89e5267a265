use crate::extractor::{join_pages, LopdfExtractor, PdfExtractor};
use crate::models::{Document, LoadReport, SkippedPdf};
use crate::IngestError;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Lists the `.pdf` files directly inside `folder`, sorted by file name.
///
/// Failing to read `folder` itself is an error; an unreadable entry inside it is logged
/// and left out.
pub fn discover_pdf_files(folder: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let mut files = Vec::new();

    for item in WalkDir::new(folder).min_depth(1).max_depth(1) {
        let entry = match item {
            Ok(entry) => entry,
            Err(error) if error.depth() == 0 => return Err(IngestError::Io(error.into())),
            Err(error) => {
                warn!(folder = %folder.display(), %error, "skipping unreadable directory entry");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        // Compared as bytes so non-UTF-8 names reach the loader and get reported.
        let is_pdf = entry.file_name().as_encoded_bytes().ends_with(b".pdf");

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    Ok(files)
}

pub fn load_path(folder: &Path) -> Result<LoadReport, IngestError> {
    load_path_with(folder, &LopdfExtractor)
}

pub fn load_path_with<X>(folder: &Path, extractor: &X) -> Result<LoadReport, IngestError>
where
    X: PdfExtractor + ?Sized,
{
    if !folder.exists() {
        return Err(IngestError::NotFound(folder.display().to_string()));
    }

    if !folder.is_dir() {
        return Err(IngestError::InvalidArgument(format!(
            "not a directory: {}",
            folder.display()
        )));
    }

    let mut report = LoadReport::default();

    for path in discover_pdf_files(folder)? {
        match load_document(&path, extractor) {
            Ok(document) => report.documents.push(document),
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping unreadable pdf");
                report.skipped_files.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    info!(
        folder = %folder.display(),
        documents = report.documents.len(),
        skipped = report.skipped_files.len(),
        "loaded pdf folder"
    );

    Ok(report)
}

fn load_document<X>(path: &Path, extractor: &X) -> Result<Document, IngestError>
where
    X: PdfExtractor + ?Sized,
{
    let file_name = path
        .file_name()
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?
        .to_str()
        .ok_or_else(|| {
            IngestError::InvalidArgument(format!(
                "file name is not valid UTF-8: {}",
                path.display()
            ))
        })?;

    let pages = extractor.extract_pages(path)?;

    Ok(Document {
        file_name: file_name.to_string(),
        text: join_pages(&pages),
    })
}
