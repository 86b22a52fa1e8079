use crate::ids::ImageId;

/// An image that the backend has accepted and assigned an identifier to.
///
/// Posts reference stored images by id, either as a banner or inline in their
/// content. The client keeps no reference counts; deleting an image is an
/// explicit, best-effort request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoredImage {
    pub id: ImageId,
    /// Size of the payload that was uploaded, after compression.
    pub uploaded_bytes: usize,
}

/// Response body of `POST /upload`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct UploadResponse {
    pub file_id: ImageId,
}
