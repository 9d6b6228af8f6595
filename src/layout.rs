//! Run-scoped storage layout: `{flow}/{run}/{file}`.

/// Identifies the storage area of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPath {
    pub flow_name: String,
    pub run_id: String,
}

impl RunPath {
    pub fn new(flow_name: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            flow_name: flow_name.into(),
            run_id: run_id.into(),
        }
    }

    /// Key of a file stored directly under the run.
    ///
    /// ```
    /// use artifact_sync::RunPath;
    ///
    /// let run = RunPath::new("CodeAutocompletionFlow", "107");
    /// assert_eq!(run.file_key("model.bin"), "CodeAutocompletionFlow/107/model.bin");
    /// ```
    pub fn file_key(&self, file_name: &str) -> String {
        join_key(&[&self.flow_name, &self.run_id, file_name])
    }

    /// Prefix of a "directory" below the run, without a trailing `/`.
    pub fn directory_prefix(&self, subdir: &str) -> String {
        join_key(&[&self.flow_name, &self.run_id, subdir])
    }
}

/// Joins key parts with single `/` separators, dropping empty segments.
fn join_key(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|part| part.split('/'))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_key() {
        let run = RunPath::new("TrainingFlowBQ", "37");
        assert_eq!(run.file_key("model.bin"), "TrainingFlowBQ/37/model.bin");
    }

    #[test]
    fn test_directory_prefix_normalizes_separators() {
        let run = RunPath::new("CodeAutocompletionFlow", "107");
        assert_eq!(
            run.directory_prefix("trained/checkpoint-2"),
            "CodeAutocompletionFlow/107/trained/checkpoint-2"
        );
        assert_eq!(
            run.directory_prefix("/trained//checkpoint-2/"),
            "CodeAutocompletionFlow/107/trained/checkpoint-2"
        );
        assert_eq!(run.directory_prefix(""), "CodeAutocompletionFlow/107");
    }
}
