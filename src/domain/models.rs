/// First column of the first row returned by the health check query.
/// `None` inside means the column was SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstColumn(pub Option<String>);

impl FirstColumn {
    pub fn value(&self) -> Option<&str> {
        self.0.as_deref()
    }
}
