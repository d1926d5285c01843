//! Moving an uploaded temporary file into the user's home directory.

use log::{info, warn};

use crate::{
    error::{IndexerError, IndexerResult},
    workspace::{FileSystem, join_path},
};

pub fn home_directory(user: &str) -> String {
    format!("/user/{user}")
}

/// Rename `tmp_path` to `/user/<user>/<file_name>` and return the new path.
///
/// A failed rename is reported as a conflict when the destination turns out
/// to exist; if that check fails too, the generic copy failure is reported.
pub fn save_upload(
    fs: &dyn FileSystem,
    user: &str,
    tmp_path: &str,
    file_name: &str,
) -> IndexerResult<String> {
    let file_name = file_name.trim();
    if file_name.is_empty() || file_name.contains('/') || file_name == "." || file_name == ".." {
        return Err(IndexerError::InvalidForm(format!(
            "invalid upload file name {file_name:?}"
        )));
    }
    let destination = join_path(&home_directory(user), file_name);

    match fs.rename(user, tmp_path, &destination) {
        Ok(()) => {
            info!("Saved upload {tmp_path} to {destination}");
            Ok(destination)
        }
        Err(err) => {
            let already_exists = fs.exists(user, &destination).unwrap_or_else(|check_err| {
                warn!("Could not check {destination} after failed upload: {check_err}");
                false
            });
            if already_exists {
                Err(IndexerError::UploadConflict { path: destination })
            } else {
                Err(IndexerError::UploadIo {
                    path: destination,
                    cause: err.to_string(),
                })
            }
        }
    }
}
