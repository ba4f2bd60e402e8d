use serde::Deserialize;

/// Shape of the opaque conversation metadata blob, decoded lazily.
#[derive(Debug, Clone, Deserialize)]
struct ConversationMetadata {
    image: Option<MetadataImage>,
}

#[derive(Debug, Clone, Deserialize)]
struct MetadataImage {
    link: Option<String>,
}

/// Resolve the avatar image URL embedded in a metadata blob.
///
/// Malformed or unrelated blobs yield `None`; decoding never fails loudly.
pub fn decode_image_link(metadata: &str) -> Option<String> {
    let decoded: ConversationMetadata = serde_json::from_str(metadata).ok()?;
    decoded
        .image
        .and_then(|image| image.link)
        .filter(|link| !link.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_image_link_from_blob() {
        let blob = r#"{"image":{"link":"https://cdn.example.org/a.png"},"extra":1}"#;
        assert_eq!(
            decode_image_link(blob).as_deref(),
            Some("https://cdn.example.org/a.png")
        );
    }

    #[test]
    fn tolerates_malformed_blobs() {
        assert_eq!(decode_image_link("not json"), None);
        assert_eq!(decode_image_link("{}"), None);
        assert_eq!(decode_image_link(r#"{"image":{}}"#), None);
        assert_eq!(decode_image_link(r#"{"image":{"link":"  "}}"#), None);
    }
}
