//! Document parsing: validate PDF bytes and read per-page geometry via lopdf.
//!
//! Parsing never needs pdfium. Page count and page sizes come straight from
//! the page tree, so a host without a pdfium library can still load, lay out
//! and place a signature. Rejected inputs map to
//! [`SignError::UnsupportedFormat`] and never touch session state.

use crate::error::SignError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// US Letter, used when a page carries no readable MediaBox.
const FALLBACK_PAGE: PageSize = PageSize {
    width_pt: 612.0,
    height_pt: 792.0,
};

/// Page size in PDF points, rotation already applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width_pt: f64,
    pub height_pt: f64,
}

impl PageSize {
    /// On-screen height of this page when laid out `display_width` wide.
    pub fn display_height(&self, display_width: f64) -> f64 {
        if self.width_pt <= 0.0 {
            return display_width;
        }
        display_width * self.height_pt / self.width_pt
    }
}

/// Geometry of a successfully parsed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub pages: Vec<PageSize>,
}

impl ParsedDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Check the `%PDF` magic bytes without parsing anything else.
pub fn has_pdf_magic(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && &bytes[..4] == b"%PDF"
}

/// Parse PDF bytes into page geometry.
pub fn parse_document(bytes: &[u8]) -> Result<ParsedDocument, SignError> {
    if !has_pdf_magic(bytes) {
        let magic: Vec<u8> = bytes.iter().take(4).copied().collect();
        return Err(SignError::unsupported(format!(
            "not a PDF (first bytes: {magic:?})"
        )));
    }

    let doc = Document::load_mem(bytes)
        .map_err(|e| SignError::unsupported(format!("PDF is corrupt: {e}")))?;

    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(SignError::unsupported("encrypted PDFs are not supported"));
    }

    let pages: Vec<PageSize> = doc
        .get_pages()
        .into_values()
        .map(|page_id| page_size(&doc, page_id))
        .collect();

    if pages.is_empty() {
        return Err(SignError::unsupported("document has no pages"));
    }

    info!("PDF parsed: {} pages", pages.len());
    Ok(ParsedDocument { pages })
}

/// Resolve MediaBox and Rotate for a page, following inherited attributes
/// up the page tree.
fn page_size(doc: &Document, page_id: ObjectId) -> PageSize {
    let mut media_box = None;
    let mut rotate = None;
    let mut current = Some(page_id);
    let mut depth = 0;

    while let Some(id) = current {
        // Guard against cyclic Parent links in malformed files.
        if depth > 32 {
            break;
        }
        depth += 1;

        let Ok(dict) = doc.get_dictionary(id) else {
            break;
        };
        if media_box.is_none() {
            media_box = extract_media_box(doc, dict);
        }
        if rotate.is_none() {
            rotate = dict.get(b"Rotate").ok().and_then(obj_to_f64);
        }
        if media_box.is_some() && rotate.is_some() {
            break;
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }

    let size = media_box.unwrap_or(FALLBACK_PAGE);
    let quarter_turns = (rotate.unwrap_or(0.0) / 90.0).round() as i64;
    let size = if quarter_turns.rem_euclid(2) == 1 {
        PageSize {
            width_pt: size.height_pt,
            height_pt: size.width_pt,
        }
    } else {
        size
    };
    debug!(
        "page {:?}: {}x{} pt",
        page_id, size.width_pt, size.height_pt
    );
    size
}

fn extract_media_box(doc: &Document, dict: &Dictionary) -> Option<PageSize> {
    let raw = dict.get(b"MediaBox").ok()?;
    let resolved = match raw {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let arr = resolved.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let llx = obj_to_f64(&arr[0])?;
    let lly = obj_to_f64(&arr[1])?;
    let urx = obj_to_f64(&arr[2])?;
    let ury = obj_to_f64(&arr[3])?;
    let size = PageSize {
        width_pt: (urx - llx).abs(),
        height_pt: (ury - lly).abs(),
    };
    (size.width_pt > 0.0 && size.height_pt > 0.0).then_some(size)
}

fn obj_to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some((*f).into()),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    /// Build a minimal PDF with one page per `(width, height)` entry.
    pub(crate) fn pdf_with_pages(sizes: &[(i64, i64)]) -> Vec<u8> {
        build_pdf(sizes, |_| {})
    }

    /// Like [`pdf_with_pages`], letting `customize` touch the document
    /// before it is written.
    fn build_pdf(sizes: &[(i64, i64)], customize: impl FnOnce(&mut Document)) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();
        for &(w, h) in sizes {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), w.into(), h.into()],
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        customize(&mut doc);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("save test pdf");
        buf
    }

    #[test]
    fn parses_page_count_and_sizes() {
        let bytes = pdf_with_pages(&[(612, 792), (842, 595)]);
        let parsed = parse_document(&bytes).expect("parse");
        assert_eq!(parsed.page_count(), 2);
        assert_eq!(parsed.pages[0].width_pt, 612.0);
        assert_eq!(parsed.pages[1].height_pt, 595.0);
    }

    #[test]
    fn rejects_non_pdf_bytes() {
        let err = parse_document(b"hello, world").unwrap_err();
        assert!(matches!(err, SignError::UnsupportedFormat { .. }));
    }

    #[test]
    fn rejects_truncated_pdf() {
        let err = parse_document(b"%PDF-1.4\n%%garbage").unwrap_err();
        assert!(matches!(err, SignError::UnsupportedFormat { .. }));
    }

    #[test]
    fn rejects_encrypted_pdf() {
        let bytes = build_pdf(&[(612, 792)], |doc| {
            let encrypt_id = doc.add_object(dictionary! {
                "Filter" => "Standard",
                "V" => 1,
                "R" => 2,
                "P" => -4,
            });
            doc.trailer.set("Encrypt", encrypt_id);
        });
        let err = parse_document(&bytes).unwrap_err();
        assert!(err.to_string().contains("encrypted"), "got: {err}");
    }

    #[test]
    fn encrypt_mentioned_in_content_is_not_encryption() {
        let bytes = build_pdf(&[(612, 792)], |doc| {
            let info_id = doc.add_object(dictionary! {
                "Title" => Object::string_literal("How /Encrypt works"),
                "EncryptedNote" => true,
            });
            doc.trailer.set("Info", info_id);
        });
        assert!(bytes.windows(8).any(|w| w == b"/Encrypt"));
        let parsed = parse_document(&bytes).expect("unencrypted PDF loads");
        assert_eq!(parsed.page_count(), 1);
    }

    #[test]
    fn rejects_empty_input() {
        assert!(parse_document(&[]).is_err());
    }

    #[test]
    fn display_height_follows_aspect_ratio() {
        let letter = PageSize {
            width_pt: 612.0,
            height_pt: 792.0,
        };
        let h = letter.display_height(600.0);
        assert!((h - 776.470588).abs() < 1e-5, "got {h}");
    }
}
