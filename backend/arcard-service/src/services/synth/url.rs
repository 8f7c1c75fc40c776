use crate::models::SCENE_DOCUMENT_NAME;

/// Builds the public URL a session's scene document is reachable at
#[derive(Debug, Clone)]
pub struct PublicUrl {
    base: Option<String>,
    namespace: String,
}

impl PublicUrl {
    /// `base` is a site serving the store contents, e.g. a Pages URL. Without
    /// it, URLs are built from the request's scheme and host.
    pub fn new(base: Option<String>, namespace: impl Into<String>) -> Self {
        Self {
            base: base.map(|b| b.trim_end_matches('/').to_string()),
            namespace: namespace.into().trim_matches('/').to_string(),
        }
    }

    pub fn scene_url(&self, scheme: &str, host: &str, session_id: &str) -> String {
        match &self.base {
            Some(base) if self.namespace.is_empty() => {
                format!("{base}/{session_id}/{SCENE_DOCUMENT_NAME}")
            }
            Some(base) => format!(
                "{base}/{}/{session_id}/{SCENE_DOCUMENT_NAME}",
                self.namespace
            ),
            None => format!("{scheme}://{host}/{session_id}/{SCENE_DOCUMENT_NAME}"),
        }
    }
}

/// Server-relative path of a session artifact, as returned to the uploader
pub fn session_path(session_id: &str, file_name: &str) -> String {
    format!("/{session_id}/{file_name}")
}
