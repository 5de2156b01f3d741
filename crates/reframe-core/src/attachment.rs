use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::transform::TransformSpec;

/// Extensions (lowercase, without the dot) treated as processable images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp"];

/// MIME type of every file the pipeline produces, whatever the source format.
pub const OUTPUT_MIME_TYPE: &str = "image/jpeg";

/// A file attached to one cell of the host table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub token: String,
    pub name: String,
}

impl AttachmentRef {
    pub fn new(token: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            name: name.into(),
        }
    }

    /// Last extension segment of the display name, lowercased.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name).map(|ext| ext.to_ascii_lowercase())
    }

    pub fn is_image(&self) -> bool {
        self.extension()
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
    }

    /// MIME type guessed from the display name.
    pub fn mime_hint(&self) -> &'static str {
        match self.extension().as_deref() {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("webp") => "image/webp",
            Some("gif") => "image/gif",
            Some("bmp") => "image/bmp",
            Some("pdf") => "application/pdf",
            Some("txt") => "text/plain",
            _ => "application/octet-stream",
        }
    }

    /// Display name with its last extension segment removed.
    pub fn basename(&self) -> &str {
        match self.name.rfind('.') {
            Some(idx) if idx > 0 => &self.name[..idx],
            _ => &self.name,
        }
    }

    /// Name of the normalized file produced from this attachment:
    /// `<basename>_<W>x<H>.jpg`.
    pub fn output_name(&self, spec: &TransformSpec) -> String {
        format!(
            "{}_{}x{}.jpg",
            self.basename(),
            spec.target_width(),
            spec.target_height()
        )
    }
}

fn extension_of(name: &str) -> Option<&str> {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => Some(&name[idx + 1..]),
        _ => None,
    }
}

/// An attachment-typed column of the host table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentField {
    pub field_id: String,
    pub display_name: String,
}

/// A re-encoded image ready to be written to the destination field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFile {
    pub name: String,
    pub bytes: Bytes,
    pub mime_type: &'static str,
}

impl ProcessedFile {
    pub fn jpeg(name: String, bytes: impl Into<Bytes>) -> Self {
        Self {
            name,
            bytes: bytes.into(),
            mime_type: OUTPUT_MIME_TYPE,
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(w: u32, h: u32) -> TransformSpec {
        TransformSpec::new(w, h).unwrap()
    }

    #[test]
    fn image_extensions_match_case_insensitively() {
        for name in ["a.jpg", "a.JPEG", "b.Png", "c.webp", "d.GIF", "e.bmp"] {
            assert!(AttachmentRef::new("t", name).is_image(), "{name}");
        }
    }

    #[test]
    fn non_images_are_rejected() {
        for name in ["doc.pdf", "notes.txt", "archive.tar.gz", "jpg", "noext", "photo.jpg.bak"] {
            assert!(!AttachmentRef::new("t", name).is_image(), "{name}");
        }
    }

    #[test]
    fn basename_strips_only_last_segment() {
        assert_eq!(AttachmentRef::new("t", "photo.jpg").basename(), "photo");
        assert_eq!(AttachmentRef::new("t", "my.holiday.png").basename(), "my.holiday");
        assert_eq!(AttachmentRef::new("t", "README").basename(), "README");
    }

    #[test]
    fn basename_keeps_dotfile_names() {
        assert_eq!(AttachmentRef::new("t", ".hidden").basename(), ".hidden");
    }

    #[test]
    fn output_name_uses_target_dimensions() {
        let att = AttachmentRef::new("t", "cat.PNG");
        assert_eq!(att.output_name(&spec(100, 100)), "cat_100x100.jpg");
        assert_eq!(att.output_name(&spec(1920, 1080)), "cat_1920x1080.jpg");
    }

    #[test]
    fn output_name_is_stable() {
        let att = AttachmentRef::new("t", "portrait.webp");
        let s = spec(300, 400);
        assert_eq!(att.output_name(&s), att.output_name(&s));
    }

    #[test]
    fn output_name_without_extension_uses_whole_name() {
        let att = AttachmentRef::new("t", "scan");
        assert_eq!(att.output_name(&spec(64, 32)), "scan_64x32.jpg");
    }

    #[test]
    fn mime_hint_follows_extension() {
        assert_eq!(AttachmentRef::new("t", "a.JPG").mime_hint(), "image/jpeg");
        assert_eq!(AttachmentRef::new("t", "a.png").mime_hint(), "image/png");
        assert_eq!(AttachmentRef::new("t", "a.pdf").mime_hint(), "application/pdf");
        assert_eq!(
            AttachmentRef::new("t", "a.xyz").mime_hint(),
            "application/octet-stream"
        );
    }

    #[test]
    fn processed_file_is_always_jpeg() {
        let f = ProcessedFile::jpeg("x_1x1.jpg".into(), vec![1u8, 2, 3]);
        assert_eq!(f.mime_type, "image/jpeg");
        assert_eq!(f.size_bytes(), 3);
    }

    #[test]
    fn attachment_ref_deserializes_from_json() {
        let att: AttachmentRef =
            serde_json::from_str(r#"{"token":"tok-1","name":"a.png"}"#).unwrap();
        assert_eq!(att, AttachmentRef::new("tok-1", "a.png"));
    }
}
