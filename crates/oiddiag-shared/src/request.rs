//! Request glue: the only view the core has of an inbound request.

use std::collections::HashMap;

/// Severity of messages sent to the request's log sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Inbound request as seen by routers and test actions
pub trait DiagRequest {
    /// Path below the harness mount point, e.g. `Associate/`
    fn path_info(&self) -> &str;

    /// First value submitted for a field
    fn field(&self, key: &str) -> Option<&str>;

    /// Append rendered output
    fn write(&mut self, bytes: &[u8]);

    /// Report an anomaly the response itself cannot show
    fn log(&mut self, severity: Severity, message: &str);
}

/// In-memory request: fields in, output and log messages collected
#[derive(Debug, Clone, Default)]
pub struct BufferedRequest {
    path_info: String,
    fields: HashMap<String, Vec<String>>,
    output: Vec<u8>,
    log_messages: Vec<(Severity, String)>,
}

impl BufferedRequest {
    pub fn new(path_info: impl Into<String>) -> Self {
        Self {
            path_info: path_info.into(),
            ..Self::default()
        }
    }

    /// Add a field value; repeated keys keep every value in order.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_field(key, value);
        self
    }

    pub fn add_field(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.entry(key.into()).or_default().push(value.into());
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn into_output(self) -> Vec<u8> {
        self.output
    }

    pub fn log_messages(&self) -> &[(Severity, String)] {
        &self.log_messages
    }
}

impl DiagRequest for BufferedRequest {
    fn path_info(&self) -> &str {
        &self.path_info
    }

    fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    fn write(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    fn log(&mut self, severity: Severity, message: &str) {
        self.log_messages.push((severity, message.to_string()));
    }
}
