//! Builder for extraction tool invocations

/// A URL plus the ordered options to run the extraction tool with
///
/// Options are kept in insertion order and may repeat (`--parse-metadata` is
/// given once per field).
///
/// # Examples
///
/// ```
/// use audio_dl::extractor::ExtractRequest;
///
/// let request = ExtractRequest::new("https://youtu.be/abc")
///     .option("-x")
///     .option_value("--retries", 10);
///
/// assert_eq!(
///     request.to_args(),
///     vec!["-x", "--retries", "10", "https://youtu.be/abc"]
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    url: String,
    options: Vec<(String, Option<String>)>,
}

impl ExtractRequest {
    /// Start a request for `url` with no options
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            options: Vec::new(),
        }
    }

    /// Add a flag without a value
    #[must_use]
    pub fn option(mut self, name: impl Into<String>) -> Self {
        self.options.push((name.into(), None));
        self
    }

    /// Add an option followed by its value
    #[must_use]
    pub fn option_value(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.options.push((name.into(), Some(value.to_string())));
        self
    }

    /// Target URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether `name` was added at least once
    pub fn has_option(&self, name: &str) -> bool {
        self.options.iter().any(|(n, _)| n == name)
    }

    /// Every value given for `name`, in order
    pub fn values_of(&self, name: &str) -> Vec<&str> {
        self.options
            .iter()
            .filter(|(n, _)| n == name)
            .filter_map(|(_, v)| v.as_deref())
            .collect()
    }

    /// Command-line arguments: options in order, then the URL
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.options.len() * 2 + 1);
        for (name, value) in &self.options {
            args.push(name.clone());
            if let Some(value) = value {
                args.push(value.clone());
            }
        }
        args.push(self.url.clone());
        args
    }
}
