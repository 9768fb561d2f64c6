pub mod model;
pub mod texture;

pub use self::model::{load_model, MeshData, Model};
pub use self::texture::{load_image, AssetError, ImageData};
