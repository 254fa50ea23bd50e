//! Download and unpack PMC Open Access packages
//!
//! Every package lives in its own `TempDir`, which is removed when the
//! download returns, on success or failure.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tempfile::TempDir;
use tokio::{fs as tokio_fs, task};
use tracing::{debug, instrument};

use crate::error::{Result, RetrievalError};
use crate::transport::Transport;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

fn is_xml_member(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("nxml") || ext.eq_ignore_ascii_case("xml"))
        .unwrap_or(false)
}

/// Open `archive_path` as a tar stream, gunzipping when the gzip magic is present
fn open_archive(archive_path: &Path) -> Result<Archive<Box<dyn Read>>> {
    let mut magic = [0u8; 2];
    let is_gzip = {
        let mut probe = File::open(archive_path)?;
        probe.read_exact(&mut magic).is_ok() && magic == GZIP_MAGIC
    };

    let file = BufReader::new(File::open(archive_path)?);
    let reader: Box<dyn Read> = if is_gzip {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Archive::new(reader))
}

/// Unpack the XML members of an archive into `output_dir`
///
/// Returns the unpacked paths in archive order.
pub(crate) fn extract_xml_members(archive_path: &Path, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut archive = open_archive(archive_path)?;
    let mut extracted = Vec::new();

    let entries = archive
        .entries()
        .map_err(|e| RetrievalError::ArchiveError(format!("Failed to read tar entries: {e}")))?;

    for entry in entries {
        let mut entry = entry
            .map_err(|e| RetrievalError::ArchiveError(format!("Failed to read tar entry: {e}")))?;
        let path = entry
            .path()
            .map_err(|e| RetrievalError::ArchiveError(format!("Failed to get entry path: {e}")))?
            .into_owned();

        if !entry.header().entry_type().is_file() || !is_xml_member(&path) {
            continue;
        }

        let unpacked = entry
            .unpack_in(output_dir)
            .map_err(|e| RetrievalError::ArchiveError(format!("Failed to extract entry: {e}")))?;
        if unpacked {
            let output_path = output_dir.join(&path);
            debug!("Extracted: {}", output_path.display());
            extracted.push(output_path);
        }
    }

    Ok(extracted)
}

/// Download the package at `url` and return the text of its first XML member
#[instrument(skip(transport))]
pub(crate) async fn fetch_article_xml(transport: &dyn Transport, url: &str) -> Result<String> {
    let temp_dir = TempDir::new()?;
    let archive_path = temp_dir.path().join("package.tar.gz");

    let bytes = transport.download_to(url, &archive_path).await?;
    debug!(bytes, "Downloaded package");

    let output_dir = temp_dir.path().join("extracted");
    tokio_fs::create_dir_all(&output_dir).await?;

    let members = task::spawn_blocking({
        let archive_path = archive_path.clone();
        let output_dir = output_dir.clone();
        move || extract_xml_members(&archive_path, &output_dir)
    })
    .await
    .map_err(|e| RetrievalError::TaskFailed(e.to_string()))??;

    let first = members.first().ok_or_else(|| {
        RetrievalError::ArchiveError(format!("No XML member in package from {url}"))
    })?;

    let xml = tokio_fs::read_to_string(first)
        .await
        .map_err(|e| RetrievalError::IoError {
            message: format!("Failed to read {}: {}", first.display(), e),
        })?;

    Ok(xml)
}
