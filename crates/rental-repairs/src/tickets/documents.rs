use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Reference to an uploaded file held by the document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub storage_key: String,
    pub file_name: String,
    #[serde(default)]
    pub tag: Option<String>,
}

impl ImageRef {
    pub fn tagged(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }
}

/// Descriptor handed to clients and embedded in tickets, offers and defects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub storage_key: String,
    pub file_name: String,
    pub mime_type: String,
    pub url: String,
    pub tag: Option<String>,
}

impl ImageDescriptor {
    pub fn is_image(&self) -> bool {
        self.mime_type
            .parse::<mime::Mime>()
            .map(|parsed| parsed.type_() == mime::IMAGE)
            .unwrap_or(false)
    }
}

/// Storage boundary. The lifecycle core only ever asks for descriptors.
pub trait DocumentStore: Send + Sync {
    fn describe(&self, image: &ImageRef, base_url: &str, encode: bool) -> ImageDescriptor;
}

/// Document store that serves files from `{base_url}/documents/{key}`.
#[derive(Debug, Default, Clone)]
pub struct LinkedDocumentStore;

impl DocumentStore for LinkedDocumentStore {
    fn describe(&self, image: &ImageRef, base_url: &str, encode: bool) -> ImageDescriptor {
        let mime_type = mime_guess::from_path(&image.file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        let key = if encode {
            URL_SAFE_NO_PAD.encode(image.storage_key.as_bytes())
        } else {
            image.storage_key.trim_start_matches('/').to_string()
        };

        ImageDescriptor {
            storage_key: image.storage_key.clone(),
            file_name: image.file_name.clone(),
            mime_type,
            url: format!("{}/documents/{}", base_url.trim_end_matches('/'), key),
            tag: image.tag.clone(),
        }
    }
}

pub(crate) fn describe_all(
    store: &dyn DocumentStore,
    images: &[ImageRef],
    base_url: &str,
    tag: Option<&str>,
) -> Vec<ImageDescriptor> {
    images
        .iter()
        .cloned()
        .map(|image| match tag {
            Some(tag) => image.tagged(tag),
            None => image,
        })
        .map(|image| store.describe(&image, base_url, false))
        .collect()
}
