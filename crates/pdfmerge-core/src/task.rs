use std::path::Path;

use crate::error::PdfMergeError;
use crate::ranges::{parse_optional_ranges, PageSelection};

/// How an uploaded file is merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Image,
    /// Neither a PDF nor a supported raster image; skipped during merge.
    Unsupported,
}

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

impl FileKind {
    /// Detect the kind from the uploaded filename, falling back to the
    /// declared content type when the extension is not recognized.
    pub fn detect(file_name: &str, content_type: Option<&str>) -> Self {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("pdf") => return FileKind::Pdf,
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => return FileKind::Image,
            _ => {}
        }

        match content_type.map(|c| c.trim().to_ascii_lowercase()) {
            Some(c) if c == "application/pdf" => FileKind::Pdf,
            Some(c) if c == "image/png" || c == "image/jpeg" || c == "image/jpg" => {
                FileKind::Image
            }
            _ => FileKind::Unsupported,
        }
    }
}

/// Page orientation for image pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    /// Lenient form-field parsing: anything other than "landscape" is portrait.
    pub fn from_form_value(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "landscape" => Orientation::Landscape,
            _ => Orientation::Portrait,
        }
    }
}

/// Per-file options supplied alongside an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileOptions {
    pub orientation: Orientation,
    /// Raw page selection, e.g. "1-3,5". Parsed when the file is merged so
    /// that a malformed value fails the job rather than the submission.
    pub pages: Option<String>,
    pub password: Option<String>,
}

impl FileOptions {
    pub fn page_selection(&self) -> Result<PageSelection, PdfMergeError> {
        parse_optional_ranges(self.pages.as_deref())
    }

    /// Password to try on encrypted PDFs; empty when none was supplied.
    pub fn password_or_empty(&self) -> &str {
        self.password.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(FileKind::detect("report.pdf", None), FileKind::Pdf);
        assert_eq!(FileKind::detect("REPORT.PDF", None), FileKind::Pdf);
        assert_eq!(FileKind::detect("photo.JPG", None), FileKind::Image);
        assert_eq!(FileKind::detect("scan.jpeg", None), FileKind::Image);
        assert_eq!(FileKind::detect("diagram.png", None), FileKind::Image);
    }

    #[test]
    fn test_detect_falls_back_to_content_type() {
        assert_eq!(
            FileKind::detect("upload", Some("application/pdf")),
            FileKind::Pdf
        );
        assert_eq!(FileKind::detect("blob", Some("image/png")), FileKind::Image);
    }

    #[test]
    fn test_detect_unsupported() {
        assert_eq!(
            FileKind::detect("notes.txt", Some("text/plain")),
            FileKind::Unsupported
        );
        assert_eq!(FileKind::detect("archive.zip", None), FileKind::Unsupported);
        // Only PNG and JPEG are decodable
        assert_eq!(
            FileKind::detect("blob", Some("image/gif")),
            FileKind::Unsupported
        );
    }

    #[test]
    fn test_orientation_from_form_value() {
        assert_eq!(
            Orientation::from_form_value(Some("landscape")),
            Orientation::Landscape
        );
        assert_eq!(
            Orientation::from_form_value(Some(" Landscape ")),
            Orientation::Landscape
        );
        assert_eq!(
            Orientation::from_form_value(Some("sideways")),
            Orientation::Portrait
        );
        assert_eq!(Orientation::from_form_value(None), Orientation::Portrait);
    }

    #[test]
    fn test_options_defaults() {
        let options = FileOptions::default();
        assert_eq!(options.page_selection().unwrap(), PageSelection::All);
        assert_eq!(options.password_or_empty(), "");
        assert_eq!(options.orientation, Orientation::Portrait);
    }

    #[test]
    fn test_options_invalid_pages() {
        let options = FileOptions {
            pages: Some("x-y".into()),
            ..Default::default()
        };
        assert!(options.page_selection().is_err());
    }
}
