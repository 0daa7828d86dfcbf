use std::path::Path;

use crate::{
    data_structures::texture::TexelBuffer,
    error::{Error, Result},
};

/// Reads and decodes an image file into floating point texels.
pub fn load_image(path: impl AsRef<Path>) -> Result<TexelBuffer> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| Error::file_open(path, e))?;
    let img = image::load_from_memory(&data).map_err(|source| Error::Image {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("decoded {} ({}x{})", path.display(), img.width(), img.height());
    Ok(TexelBuffer::from_image(&img))
}
