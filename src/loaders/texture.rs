use std::borrow::Cow;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to decode image {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image {path:?} has no pixels")]
    Empty { path: PathBuf },
}

/// Decoded pixels in their native channel count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

impl ImageData {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, channels: u8) -> Self {
        Self {
            pixels,
            width,
            height,
            channels,
        }
    }

    /// 1x1 opaque white, used where a draw has no texture
    pub fn white() -> Self {
        Self::new(vec![255; 4], 1, 1, 4)
    }

    /// Pixels expanded to RGBA8
    pub fn to_rgba8(&self) -> Cow<'_, [u8]> {
        match self.channels {
            4 => Cow::Borrowed(&self.pixels),
            3 => Cow::Owned(
                self.pixels
                    .chunks_exact(3)
                    .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
                    .collect(),
            ),
            2 => Cow::Owned(
                self.pixels
                    .chunks_exact(2)
                    .flat_map(|la| [la[0], la[0], la[0], la[1]])
                    .collect(),
            ),
            _ => Cow::Owned(self.pixels.iter().flat_map(|&l| [l, l, l, 255]).collect()),
        }
    }
}

/// Decode an image file, optionally flipping rows so the first row is the bottom
pub fn load_image(path: impl AsRef<Path>, flip_vertically: bool) -> Result<ImageData, AssetError> {
    let path = path.as_ref();
    let mut decoded = image::open(path).map_err(|source| AssetError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(AssetError::Empty {
            path: path.to_path_buf(),
        });
    }

    if flip_vertically {
        decoded = decoded.flipv();
    }

    let (width, height) = (decoded.width(), decoded.height());
    let channels = decoded.color().channel_count();
    let pixels = match channels {
        1 => decoded.into_luma8().into_raw(),
        2 => decoded.into_luma_alpha8().into_raw(),
        3 => decoded.into_rgb8().into_raw(),
        _ => decoded.into_rgba8().into_raw(),
    };

    log::debug!("Loaded image {:?}: {}x{} ({} channels)", path, width, height, channels);
    Ok(ImageData::new(pixels, width, height, channels.min(4)))
}
