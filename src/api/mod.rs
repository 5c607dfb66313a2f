//! REST backend access: the HTTP client, its error taxonomy and photo
//! upload preparation.

mod client;
mod error;
mod upload;

pub use client::{ApiClient, USER_IMAGE_PATH};
pub use error::ApiError;
pub use upload::UploadFile;
