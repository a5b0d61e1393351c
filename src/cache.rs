//! Discovery cache: the address map stored as one flat JSON object.

use std::path::Path;

use tokio::fs;

use crate::error::{Error, Result};
use crate::types::AddressMap;

/// Load the cached map.  Returns `None` when the file is missing or empty,
/// i.e. when discovery has to run.
pub async fn load(path: &Path) -> Result<Option<AddressMap>> {
    let contents = match fs::read(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(Error::Cache {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if contents.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(&contents)?))
}

pub async fn store(path: &Path, ips: &AddressMap) -> Result<()> {
    let contents = serde_json::to_vec(ips)?;
    fs::write(path, contents).await.map_err(|source| Error::Cache {
        path: path.to_path_buf(),
        source,
    })
}
