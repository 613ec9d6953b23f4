/// Which backend handles a request
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Local,
    RemoteSsh,
    ObjectStore,
}

impl BackendKind {
    /// Short tag reported in [`StorageMetrics`] and in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::RemoteSsh => "ssh",
            BackendKind::ObjectStore => "s3",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size and item count of a storage location.
///
/// Produced fresh by every `analyze` call and never modified afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageMetrics {
    item_count: u64,
    total_bytes: u64,
    storage_type: BackendKind,
    location: String,
}

impl StorageMetrics {
    pub fn new(
        item_count: u64,
        total_bytes: u64,
        storage_type: BackendKind,
        location: impl Into<String>,
    ) -> Self {
        Self {
            item_count,
            total_bytes,
            storage_type,
            location: location.into(),
        }
    }

    pub fn item_count(&self) -> u64 {
        self.item_count
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn storage_type(&self) -> BackendKind {
        self.storage_type
    }

    /// The location string exactly as the caller supplied it
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn human_size(&self) -> String {
        human_size(self.total_bytes)
    }
}

impl std::fmt::Display for StorageMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Storage: {}\n\
            Type: {}\n\
            Items: {}\n\
            Total size: {} bytes\n\
            Human readable: {}",
            self.location,
            self.storage_type,
            self.item_count,
            self.total_bytes,
            self.human_size()
        )
    }
}

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

/// Formats a byte count using KB/MB/GB thresholds at powers of 1024.
pub fn human_size(bytes: u64) -> String {
    if bytes >= GIB {
        format!("{:.2} GB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.2} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.2} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} bytes")
    }
}
