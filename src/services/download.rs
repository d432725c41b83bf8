use crate::error::AppError;
use futures::{Stream, StreamExt};
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Streams `url` into `dest`. The body is written to `<dest>.part` and renamed
/// once complete, so an interrupted download never leaves a truncated file
/// behind under the final name.
pub async fn download_file(client: &reqwest::Client, url: &str, dest: &Path) -> Result<(), AppError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    info!("Downloading {} -> {}", url, dest.display());
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(AppError::Download(format!(
            "Failed to download {}: HTTP {}",
            url,
            response.status()
        )));
    }

    let total_size = response.content_length().unwrap_or(0);

    let part_path = dest.with_extension("part");
    let mut file = tokio::fs::File::create(&part_path).await.map_err(|e| {
        AppError::Download(format!("Failed to create file {}: {}", part_path.display(), e))
    })?;

    let written = write_stream(response.bytes_stream(), &mut file, total_size, dest).await;
    drop(file);
    let downloaded = finish_part(written, &part_path, dest).await?;
    info!("Downloaded {} ({} bytes)", dest.display(), downloaded);

    Ok(())
}

/// Copies every chunk of `stream` into `writer` and flushes it. Returns the
/// number of bytes written.
async fn write_stream<S, B, E, W>(
    mut stream: S,
    writer: &mut W,
    total_size: u64,
    dest: &Path,
) -> Result<u64, AppError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<AppError>,
    W: AsyncWrite + Unpin,
{
    let mut downloaded: u64 = 0;
    let mut last_logged = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => return Err(e.into()),
        };
        let bytes = chunk.as_ref();
        writer
            .write_all(bytes)
            .await
            .map_err(|e| AppError::Download(format!("Failed to write to file: {}", e)))?;
        downloaded += bytes.len() as u64;

        if total_size > 0 {
            let progress = (downloaded * 100) / total_size;
            if progress >= last_logged + 10 {
                debug!("{}: {}%", dest.display(), progress);
                last_logged = progress;
            }
        }
    }

    writer
        .flush()
        .await
        .map_err(|e| AppError::Download(format!("Failed to write to file: {}", e)))?;
    Ok(downloaded)
}

/// Moves a complete `.part` file into place, or removes it when the transfer
/// failed.
async fn finish_part(written: Result<u64, AppError>, part_path: &Path, dest: &Path) -> Result<u64, AppError> {
    match written {
        Ok(downloaded) => {
            tokio::fs::rename(part_path, dest).await?;
            Ok(downloaded)
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(part_path).await;
            Err(e)
        }
    }
}
