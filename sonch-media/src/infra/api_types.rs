use crate::domains::media::compressor::CompressedImage;

/// One file for the multipart `POST /upload` request.
#[derive(Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl UploadFile {
    pub fn from_compressed(file_name: &str, image: CompressedImage) -> Self {
        Self {
            file_name: jpeg_file_name(file_name),
            content_type: image.content_type.to_string(),
            bytes: image.bytes,
        }
    }
}

/// The compressor always emits JPEG; keep the stem, swap the extension.
fn jpeg_file_name(original: &str) -> String {
    let stem = std::path::Path::new(original)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("image");
    format!("{stem}.jpg")
}

#[cfg(test)]
mod tests {
    use super::jpeg_file_name;

    #[test]
    fn upload_names_end_in_jpg() {
        assert_eq!(jpeg_file_name("banner.png"), "banner.jpg");
        assert_eq!(jpeg_file_name("dir/photo.HEIC"), "photo.jpg");
        assert_eq!(jpeg_file_name(""), "image.jpg");
    }
}
