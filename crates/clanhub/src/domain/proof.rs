use serde::{Deserialize, Serialize};

use super::Error;

/// Image formats accepted as proof
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageType {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageType {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime: mime::Mime = content_type.trim().parse().ok()?;
        if mime.type_() != mime::IMAGE {
            return None;
        }
        let subtype = mime.subtype();
        if subtype == mime::PNG {
            Some(Self::Png)
        } else if subtype == mime::JPEG || subtype == "jpg" {
            Some(Self::Jpeg)
        } else if subtype == mime::GIF {
            Some(Self::Gif)
        } else if subtype == "webp" {
            Some(Self::Webp)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }
}

/// An uploaded proof image that already passed type and size checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofImage {
    pub image_type: ImageType,
    pub bytes: Vec<u8>,
}

impl ProofImage {
    pub fn new(content_type: &str, bytes: Vec<u8>, max_bytes: usize) -> Result<Self, Error> {
        let image_type = ImageType::from_content_type(content_type).ok_or_else(|| {
            Error::BadRequest(format!(
                "unsupported proof type {}, expected png, jpeg, gif or webp",
                content_type
            ))
        })?;
        if bytes.is_empty() {
            return Err(Error::BadRequest(String::from("proof image is empty")));
        }
        if bytes.len() > max_bytes {
            return Err(Error::BadRequest(format!(
                "proof image is {} bytes, limit is {}",
                bytes.len(),
                max_bytes
            )));
        }
        Ok(Self { image_type, bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(ImageType::from_content_type("image/PNG"), Some(ImageType::Png));
        assert_eq!(
            ImageType::from_content_type("image/jpeg; charset=binary"),
            Some(ImageType::Jpeg)
        );
        assert_eq!(ImageType::from_content_type("image/webp"), Some(ImageType::Webp));
        assert_eq!(ImageType::from_content_type("application/pdf"), None);
        assert_eq!(ImageType::from_content_type("application/png"), None);
        assert_eq!(ImageType::from_content_type("not a mime"), None);
    }

    #[test]
    fn test_proof_limits() {
        assert!(ProofImage::new("image/png", vec![1; 10], 10).is_ok());
        assert!(matches!(
            ProofImage::new("image/png", vec![1; 11], 10),
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            ProofImage::new("image/png", vec![], 10),
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            ProofImage::new("text/plain", vec![1], 10),
            Err(Error::BadRequest(_))
        ));
    }
}
