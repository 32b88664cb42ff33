use axum::extract::Multipart;
use log::debug;
use std::{collections::HashMap, fmt::Display, str::FromStr};

use crate::domain::{Error, ProofImage};

/// Multipart form field carrying the proof image
pub const PROOF_FIELD: &str = "proof";

/// A multipart body split into its text fields and the checked proof image
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    proof: Option<ProofImage>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart, max_bytes: usize) -> Result<Self, Error> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| Error::BadRequest(format!("invalid multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == PROOF_FIELD {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| Error::BadRequest(format!("failed to read proof: {}", e)))?;
                debug!("received {} byte proof ({})", bytes.len(), content_type);
                form.proof = Some(ProofImage::new(&content_type, bytes.to_vec(), max_bytes)?);
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| Error::BadRequest(format!("invalid field {}: {}", name, e)))?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// Trimmed field value, blank values count as missing
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    pub fn required(&self, name: &str) -> Result<String, Error> {
        self.text(name)
            .ok_or_else(|| Error::BadRequest(format!("{} is required", name)))
    }

    pub fn parse<T>(&self, name: &str) -> Result<Option<T>, Error>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.text(name)
            .map(|value| {
                value
                    .parse::<T>()
                    .map_err(|e| Error::BadRequest(format!("invalid {}: {}", name, e)))
            })
            .transpose()
    }

    pub fn parse_required<T>(&self, name: &str) -> Result<T, Error>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.parse(name)?
            .ok_or_else(|| Error::BadRequest(format!("{} is required", name)))
    }

    pub fn take_proof(&mut self) -> Result<ProofImage, Error> {
        self.proof
            .take()
            .ok_or_else(|| Error::BadRequest(String::from("proof image is required")))
    }
}
