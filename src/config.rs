use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ShedConfig {
    /// Root directory holding the database, the published-path registry
    /// and the hashed repository tree.
    pub data_dir: PathBuf,
    /// Public base URL of this shed (e.g., "https://shed.example.org").
    /// Clone and sharable links are derived from it.
    pub base_url: String,
}

impl ShedConfig {
    pub fn new(data_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            base_url: base_url.into(),
        }
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("toolshed.db")
    }

    #[must_use]
    pub fn paths_file(&self) -> PathBuf {
        self.data_dir.join("published_paths.toml")
    }

    #[must_use]
    pub fn repositories_root(&self) -> PathBuf {
        self.data_dir.join("repos")
    }

    /// On-disk location for a repository, derived from its numeric id.
    ///
    /// Ids are spread across nested three-digit directories so no single
    /// directory accumulates more than a thousand entries; the repository
    /// itself lives in a `repo_<id>` leaf.
    #[must_use]
    pub fn repository_path(&self, repository_id: i64) -> PathBuf {
        let mut path = self.repositories_root();
        for segment in directory_hash(repository_id) {
            path.push(segment);
        }
        path.push(format!("repo_{repository_id}"));
        path
    }
}

impl Default for ShedConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            base_url: "http://localhost:9009".to_string(),
        }
    }
}

/// Spread a numeric id across nested three-digit directory segments.
///
/// Ids below 1000 all land under `000`. Larger ids are zero-padded to a
/// multiple of three digits, the trailing three digits are dropped and the
/// remainder is split into three-digit segments.
fn directory_hash(id: i64) -> Vec<String> {
    let digits = id.to_string();
    if digits.len() < 4 {
        return vec!["000".to_string()];
    }
    let mut padded = "0".repeat(3 - digits.len() % 3);
    padded.push_str(&digits);
    padded.truncate(padded.len() - 3);
    padded
        .as_bytes()
        .chunks(3)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_ids_share_the_zero_bucket() {
        assert_eq!(directory_hash(1), vec!["000"]);
        assert_eq!(directory_hash(999), vec!["000"]);
    }

    #[test]
    fn large_ids_are_split_into_segments() {
        assert_eq!(directory_hash(1000), vec!["001"]);
        assert_eq!(directory_hash(12345), vec!["012"]);
        assert_eq!(directory_hash(123456), vec!["000", "123"]);
        assert_eq!(directory_hash(1234567), vec!["001", "234"]);
    }

    #[test]
    fn repository_path_nests_under_the_hash() {
        let config = ShedConfig::new(PathBuf::from("/srv/shed"), "http://localhost:9009");
        assert_eq!(
            config.repository_path(7),
            PathBuf::from("/srv/shed/repos/000/repo_7")
        );
        assert_eq!(
            config.repository_path(1000),
            PathBuf::from("/srv/shed/repos/001/repo_1000")
        );
    }
}
