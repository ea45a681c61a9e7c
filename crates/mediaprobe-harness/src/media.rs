//! Helpers to locate test media files and test output files.

use crate::config::{Properties, Protocol};

/// Full URL for a test media file reachable through `protocol`.
///
/// The file root comes from the configured path for that protocol, so the
/// same relative media path works against local disk, an HTTP file server,
/// an S3 bucket or GridFS depending on the scenario.
pub fn media_url(props: &Properties, protocol: Protocol, path: &str) -> String {
    let root = match protocol {
        Protocol::File => props.files_disk_path(),
        Protocol::Http | Protocol::Https => props.files_http_path(),
        Protocol::S3 => props.files_s3_path(),
        Protocol::Mongodb => props.files_mongo_path(),
    };
    let root = root.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{}://{}/{}", protocol.scheme(), root, path)
}

/// Path under the test workspace for a file the test writes, such as a
/// recorder target.
pub fn default_output_file(props: &Properties, file_name: &str) -> String {
    let workspace = props.workspace();
    let workspace = workspace.trim_end_matches('/');
    let file_name = file_name.trim_start_matches('/');
    format!("{workspace}/{file_name}")
}
