use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::domain::errors::DomainError;

/// Product images on local disk under `<root>/items`, published at
/// `<public_base>/library/items/<file>`.
#[derive(Debug, Clone)]
pub struct ImageStore {
    items_dir: PathBuf,
    public_base: String,
}

impl ImageStore {
    pub fn new(library_dir: impl AsRef<Path>, public_base: &str) -> Self {
        Self {
            items_dir: library_dir.as_ref().join("items"),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    /// Writes the bytes under a fresh name keeping the original extension and
    /// returns the public URL.
    pub fn save(
        &self,
        content_type: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<String, DomainError> {
        if !content_type.starts_with("image/") {
            return Err(DomainError::InvalidInput(
                "Only image files are allowed".to_string(),
            ));
        }
        if bytes.is_empty() {
            return Err(DomainError::InvalidInput("No file uploaded".to_string()));
        }

        let file_name = format!("{}{}", Uuid::new_v4(), extension_of(original_name));
        fs::create_dir_all(&self.items_dir)
            .map_err(|e| DomainError::Internal(format!("create image dir: {e}")))?;
        fs::write(self.items_dir.join(&file_name), bytes)
            .map_err(|e| DomainError::Internal(format!("write image: {e}")))?;

        log::info!("Stored product image {file_name}");
        Ok(self.public_url(&file_name))
    }

    pub fn public_url(&self, file_name: &str) -> String {
        format!("{}/library/items/{}", self.public_base, file_name)
    }

    /// Removes a stored image. Returns whether it existed.
    pub fn delete(&self, file_name: &str) -> Result<bool, DomainError> {
        let path = self.path_of(file_name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DomainError::Internal(format!("delete image: {e}"))),
        }
    }

    pub fn read(&self, file_name: &str) -> Result<Vec<u8>, DomainError> {
        let path = self.path_of(file_name)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(DomainError::NotFound("Image")),
            Err(e) => Err(DomainError::Internal(format!("read image: {e}"))),
        }
    }

    fn path_of(&self, file_name: &str) -> Result<PathBuf, DomainError> {
        if !is_plain_file_name(file_name) {
            return Err(DomainError::InvalidInput(format!(
                "Invalid image name '{file_name}'"
            )));
        }
        Ok(self.items_dir.join(file_name))
    }
}

/// The last path segment of an image URL, if it points into the item
/// library.
pub fn filename_from_url(url: &str) -> Option<&str> {
    let (_, file) = url.rsplit_once("/library/items/")?;
    let file = file.split(['?', '#']).next()?;
    is_plain_file_name(file).then_some(file)
}

pub fn content_type_for(file_name: &str) -> &'static str {
    match extension_of(file_name).to_ascii_lowercase().as_str() {
        ".png" => "image/png",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".gif" => "image/gif",
        ".webp" => "image/webp",
        ".svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

fn extension_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 && is_plain_file_name(&name[idx..]) => &name[idx..],
        _ => "",
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}
