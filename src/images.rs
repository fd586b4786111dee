// Copyright 2023 Remi Bernotavicius

use crate::error::ValidationErrors;
use crate::{Error, Result};
use base64::Engine as _;
use std::path::PathBuf;

/// Somewhere to keep uploaded recipe images.
pub trait ImageStore: Send + Sync {
    /// Stores an uploaded `data:` URI and returns the reference to save on the recipe.
    fn store(&self, encoded: &str) -> Result<String>;

    /// Drops something `store` returned whose recipe was never saved. Failures are only logged.
    fn discard(&self, stored: &str);
}

fn invalid(message: impl Into<String>) -> Error {
    Error::Validation(ValidationErrors::single("image", message))
}

/// Splits `data:image/<type>;base64,<payload>` into its payload.
fn payload(encoded: &str) -> Result<&str> {
    let rest = encoded
        .strip_prefix("data:")
        .ok_or_else(|| invalid("expected a data: URI"))?;
    let (media_type, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| invalid("expected base64 image data"))?;
    if !media_type.starts_with("image/") {
        return Err(invalid(format!("{media_type} is not an image")));
    }
    Ok(payload)
}

/// Writes images as files under `dir/recipes` and hands back URLs under `url_prefix`.
#[derive(Debug, Clone)]
pub struct FsImageStore {
    dir: PathBuf,
    url_prefix: String,
}

impl FsImageStore {
    pub fn new(dir: impl Into<PathBuf>, url_prefix: &str) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: url_prefix.trim_end_matches('/').into(),
        }
    }
}

impl ImageStore for FsImageStore {
    fn store(&self, encoded: &str) -> Result<String> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload(encoded)?.trim())
            .map_err(|e| invalid(format!("invalid base64: {e}")))?;
        let format =
            image::guess_format(&bytes).map_err(|_| invalid("unrecognized image format"))?;
        let extension = format.extensions_str().first().copied().unwrap_or("img");

        let recipes_dir = self.dir.join("recipes");
        std::fs::create_dir_all(&recipes_dir)?;
        let file_name = format!("{}.{extension}", uuid::Uuid::new_v4());
        std::fs::write(recipes_dir.join(&file_name), &bytes)?;
        log::info!("stored {} byte {format:?} image as {file_name}", bytes.len());

        Ok(format!("{}/recipes/{file_name}", self.url_prefix))
    }

    fn discard(&self, stored: &str) {
        let Some(file_name) = stored
            .strip_prefix(&self.url_prefix)
            .and_then(|rest| rest.strip_prefix("/recipes/"))
            .filter(|name| !name.is_empty() && !name.contains(['/', '\\']) && *name != "..")
        else {
            log::warn!("not discarding {stored:?}, it is not one of ours");
            return;
        };
        match std::fs::remove_file(self.dir.join("recipes").join(file_name)) {
            Ok(()) => log::info!("discarded unused image {file_name}"),
            Err(e) => log::warn!("failed to discard image {file_name}: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn data_uri(media_type: &str, bytes: &[u8]) -> String {
        format!(
            "data:{media_type};base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    }

    fn image_error(result: Result<String>) -> String {
        match result {
            Err(Error::Validation(e)) => e.get("image").unwrap().join(", "),
            other => panic!("expected an image validation error, got {other:?}"),
        }
    }

    #[test]
    fn png_is_written_under_media() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsImageStore::new(dir.path(), "/media/");

        let url = store.store(&data_uri("image/png", PNG_SIGNATURE)).unwrap();
        let file_name = url.strip_prefix("/media/recipes/").unwrap();
        assert!(file_name.ends_with(".png"), "{url}");
        assert_eq!(
            std::fs::read(dir.path().join("recipes").join(file_name)).unwrap(),
            PNG_SIGNATURE
        );

        let other = store.store(&data_uri("image/png", PNG_SIGNATURE)).unwrap();
        assert_ne!(url, other);
    }

    #[test]
    fn rejects_what_is_not_an_image() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsImageStore::new(dir.path(), "/media");

        image_error(store.store("https://example.com/cake.png"));
        image_error(store.store("data:image/png,rawbytes"));
        image_error(store.store(&data_uri("text/plain", PNG_SIGNATURE)));
        image_error(store.store("data:image/png;base64,@@@"));
        let message = image_error(store.store(&data_uri("image/png", b"plain text")));
        assert!(message.contains("unrecognized"), "{message}");

        assert!(!dir.path().join("recipes").exists());
    }

    #[test]
    fn discard_removes_only_our_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsImageStore::new(dir.path(), "/media");
        let kept = store.store(&data_uri("image/png", PNG_SIGNATURE)).unwrap();
        let dropped = store.store(&data_uri("image/png", PNG_SIGNATURE)).unwrap();

        store.discard(&dropped);
        store.discard("/media/recipes/../recipes");
        store.discard("https://example.com/media/recipes/x.png");

        let left: Vec<_> = std::fs::read_dir(dir.path().join("recipes"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(left, [kept.strip_prefix("/media/recipes/").unwrap()]);
    }
}
