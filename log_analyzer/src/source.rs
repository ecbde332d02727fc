use std::{
    fs::File,
    io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write},
};

use aws_sdk_s3::{primitives::ByteStream, Client as S3Client};
use flate2::read::MultiGzDecoder;
use tracing::info;

use crate::discovery::{select_latest_key, Compression, LogFile, LogLocation, LogNamePattern};
use crate::error::AnalyzerError;

/// Parse an S3 URI like s3://bucket/prefix into (bucket, prefix).
/// The prefix may be empty.
pub fn parse_s3_uri(uri: &str) -> Option<(String, String)> {
    let stripped = uri.strip_prefix("s3://")?;
    let (bucket, prefix) = stripped.split_once('/').unwrap_or((stripped, ""));
    if bucket.is_empty() {
        return None;
    }
    Some((bucket.to_string(), prefix.to_string()))
}

fn s3_error(name: String, err: impl std::error::Error + Send + Sync + 'static) -> AnalyzerError {
    AnalyzerError::source_unavailable(name, io::Error::other(err))
}

/// List every key under `prefix` and return the most recent rotated log.
pub async fn find_latest_s3(
    client: &S3Client,
    bucket: &str,
    prefix: &str,
    names: &LogNamePattern,
) -> Result<Option<LogFile>, AnalyzerError> {
    let mut keys: Vec<String> = Vec::new();
    let mut continuation: Option<String> = None;

    loop {
        let resp = client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .set_continuation_token(continuation.take())
            .send()
            .await
            .map_err(|e| s3_error(format!("s3://{bucket}/{prefix}"), e))?;

        keys.extend(
            resp.contents()
                .iter()
                .filter_map(|obj| obj.key())
                .map(str::to_string),
        );

        match resp.next_continuation_token() {
            Some(token) => continuation = Some(token.to_string()),
            None => break,
        }
    }

    info!(bucket, prefix, keys = keys.len(), "listed S3 log keys");
    Ok(select_latest_key(bucket, keys.iter().map(String::as_str), names))
}

/// Spool an object body into an anonymous temp file chunk by chunk and
/// rewind it for reading. Only one chunk is held in memory at a time.
async fn spool(mut body: ByteStream, name: &str) -> Result<File, AnalyzerError> {
    let io_err = |e: io::Error| AnalyzerError::source_unavailable(name.to_string(), e);

    let mut file = tempfile::tempfile().map_err(io_err)?;
    let mut written: u64 = 0;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| s3_error(name.to_string(), e))?;
        file.write_all(&chunk).map_err(io_err)?;
        written += chunk.len() as u64;
    }
    file.seek(SeekFrom::Start(0)).map_err(io_err)?;

    info!(object = name, bytes = written, "spooled S3 object");
    Ok(file)
}

/// Download an object from S3 into a temp file
async fn download_from_s3(
    client: &S3Client,
    bucket: &str,
    key: &str,
) -> Result<File, AnalyzerError> {
    let name = format!("s3://{bucket}/{key}");
    let resp = client
        .get_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| s3_error(name.clone(), e))?;

    spool(resp.body, &name).await
}

fn decoded(reader: impl Read + 'static, compression: Compression) -> Box<dyn BufRead> {
    match compression {
        Compression::Plain => Box::new(BufReader::new(reader)),
        Compression::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(reader))),
    }
}

/// Open the selected log as a line reader, decompressing `.gz` on the fly.
/// A local file is read in place; an S3 object is spooled to a temp file
/// first, so neither path holds the raw log in memory.
pub async fn open_log(
    log: &LogFile,
    s3: Option<&S3Client>,
) -> Result<Box<dyn BufRead>, AnalyzerError> {
    match &log.location {
        LogLocation::Local(path) => {
            let file = File::open(path)
                .map_err(|e| AnalyzerError::source_unavailable(path.display().to_string(), e))?;
            Ok(decoded(file, log.compression))
        }
        LogLocation::S3 { bucket, key } => {
            let client = s3.ok_or_else(|| {
                AnalyzerError::source_unavailable(
                    log.location.to_string(),
                    io::Error::new(io::ErrorKind::NotConnected, "no S3 client configured"),
                )
            })?;
            let file = download_from_s3(client, bucket, key).await?;
            Ok(decoded(file, log.compression))
        }
    }
}
