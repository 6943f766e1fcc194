//! Staging of uploaded bytes on local temporary storage.

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// An uploaded PDF written to a temporary file.
///
/// The file is deleted when the value is dropped, so the processor drops it as soon as the
/// parse step returns, whatever its outcome.
pub struct StagedUpload {
    file: NamedTempFile,
    file_name: String,
    size_bytes: u64,
}

impl StagedUpload {
    /// Write `bytes` to a fresh `.pdf` temporary file.
    pub fn stage(file_name: impl Into<String>, bytes: &[u8]) -> std::io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("docchat-")
            .suffix(".pdf")
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;
        let file_name = file_name.into();
        tracing::debug!(
            file = %file_name,
            path = %file.path().display(),
            bytes = bytes.len(),
            "Upload staged"
        );
        Ok(Self {
            file,
            file_name,
            size_bytes: bytes.len() as u64,
        })
    }

    /// Location of the staged file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Name of the file as uploaded by the user.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Size of the upload in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// Whether an upload looks like a PDF, judged by name, declared content type and magic bytes.
pub fn is_pdf(file_name: &str, content_type: Option<&str>, bytes: &[u8]) -> bool {
    let named_pdf = file_name.to_lowercase().ends_with(".pdf");
    let typed_pdf = content_type
        .map(|value| value.eq_ignore_ascii_case("application/pdf"))
        .unwrap_or(false);
    (named_pdf || typed_pdf) && bytes.starts_with(b"%PDF")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_file_is_removed_on_drop() {
        let upload = StagedUpload::stage("report.pdf", b"%PDF-1.7").expect("stage");
        let path = upload.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(upload.size_bytes(), 8);
        assert!(path.extension().is_some_and(|ext| ext == "pdf"));

        drop(upload);
        assert!(!path.exists());
    }

    #[test]
    fn is_pdf_requires_magic_bytes_and_a_pdf_hint() {
        assert!(is_pdf("Report.PDF", None, b"%PDF-1.4"));
        assert!(is_pdf("upload", Some("application/pdf"), b"%PDF-1.4"));
        assert!(!is_pdf("notes.txt", Some("text/plain"), b"%PDF-1.4"));
        assert!(!is_pdf("fake.pdf", None, b"hello"));
    }
}
