//! Bulk file import
//!
//! Retrieves a set of files through the fetch bridge ahead of time so that a
//! host can register them as preloaded files before running any script.

use std::thread;

use tracing::info;
use wrenlink_sdk::PreloadManifest;

use crate::error::FetchError;
use crate::fetch::BlockingFetch;

/// Retrieve every path concurrently and collect them into a manifest.
///
/// All or nothing: if any retrieval fails, the first failure in `paths`
/// order is returned and no manifest is produced.
pub fn import_files(fetch: &BlockingFetch, paths: &[&str]) -> Result<PreloadManifest, FetchError> {
    let results: Vec<Result<Vec<u8>, FetchError>> = thread::scope(|scope| {
        let workers: Vec<_> = paths
            .iter()
            .map(|path| scope.spawn(move || fetch.fetch_bytes(path)))
            .collect();
        workers
            .into_iter()
            .zip(paths)
            .map(|(worker, path)| {
                worker.join().unwrap_or_else(|_| {
                    Err(FetchError::Abandoned {
                        path: path.to_string(),
                    })
                })
            })
            .collect()
    });

    let mut manifest = PreloadManifest::new();
    for (path, result) in paths.iter().zip(results) {
        manifest.insert(*path, result?);
    }
    info!(files = manifest.len(), "imported files");
    Ok(manifest)
}

/// Retrieve a single file into a manifest
pub fn import_file(fetch: &BlockingFetch, path: &str) -> Result<PreloadManifest, FetchError> {
    import_files(fetch, &[path])
}
