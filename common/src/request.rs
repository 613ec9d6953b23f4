//! Request parameters shared by the operations facade and the backend adapters

use crate::error::Error;

/// Operation whose permission `verify-access` checks
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AccessOperation {
    Read,
    Write,
    List,
}

impl AccessOperation {
    pub const ALL: [AccessOperation; 3] = [
        AccessOperation::List,
        AccessOperation::Read,
        AccessOperation::Write,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessOperation::Read => "read",
            AccessOperation::Write => "write",
            AccessOperation::List => "list",
        }
    }
}

impl std::fmt::Display for AccessOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccessOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "read" => Ok(AccessOperation::Read),
            "write" => Ok(AccessOperation::Write),
            "list" => Ok(AccessOperation::List),
            _ => Err(Error::validation(format!("Unknown operation: {s}"))),
        }
    }
}

/// What a listing returns
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// Immediate child directories, or common prefixes in an object store
    Subdirectories,
    /// Files, or object keys in an object store
    Files,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Subdirectories => "subdirectories",
            ContentType::Files => "files",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "subdirectories" => Ok(ContentType::Subdirectories),
            "files" => Ok(ContentType::Files),
            _ => Err(Error::validation(format!(
                "content_type must be 'subdirectories' or 'files', got: {s}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_operation() {
        assert_eq!("read".parse::<AccessOperation>(), Ok(AccessOperation::Read));
        assert_eq!("WRITE".parse::<AccessOperation>(), Ok(AccessOperation::Write));
        assert_eq!("List".parse::<AccessOperation>(), Ok(AccessOperation::List));
        let error = "bogus".parse::<AccessOperation>().unwrap_err();
        assert_eq!(error, Error::validation("Unknown operation: bogus"));
    }

    #[test]
    fn parse_content_type() {
        assert_eq!(
            "subdirectories".parse::<ContentType>(),
            Ok(ContentType::Subdirectories)
        );
        assert_eq!("Files".parse::<ContentType>(), Ok(ContentType::Files));
        let error = "dirs".parse::<ContentType>().unwrap_err();
        assert!(error.is_validation());
        assert!(error.to_string().contains("got: dirs"));
    }
}
