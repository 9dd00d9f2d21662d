use xxhash_rust::xxh3::xxh3_64;

/// Content hash used to decide whether a file needs re-analysis
pub fn compute_content_hash(content: &[u8]) -> String {
    format!("{:016x}", xxh3_64(content))
}
