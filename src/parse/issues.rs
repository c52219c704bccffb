use std::fmt;

/// Something the parser tolerated instead of failing: a skipped node entry,
/// a dropped tag range, an option it could not read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadIssue {
    /// Where it happened, e.g. `node 4f2c…` or `node 4f2c… read_doc tag BOLD`
    pub location: String,
    pub message: String,
}

impl LoadIssue {
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        LoadIssue {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for LoadIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Collects issues with a location prefix so nested parsers don't have to
/// thread context strings around.
#[derive(Debug, Default)]
pub struct IssueSink {
    issues: Vec<LoadIssue>,
}

impl IssueSink {
    pub fn new() -> Self {
        IssueSink::default()
    }

    pub fn push(&mut self, location: impl Into<String>, message: impl Into<String>) {
        self.issues.push(LoadIssue::new(location, message));
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn into_vec(self) -> Vec<LoadIssue> {
        self.issues
    }
}
