use sentinel_types::ContentId;

/// Public gateway that serves stored objects by content id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gateway {
    base: String,
}

impl Gateway {
    pub const DEFAULT_BASE: &'static str = "http://localhost:8080/ipfs";

    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// `<base>/<content id>`
    pub fn url_for(&self, id: &ContentId) -> String {
        format!("{}/{}", self.base, id)
    }

    pub fn base(&self) -> &str {
        &self.base
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE)
    }
}
