//! Document metadata.

use std::cell::RefCell;

use waypoint_router::Meta;

/// Receives document metadata before each view mount.
pub trait MetaSink {
    /// Apply the metadata (title, description, ...).
    fn update(&self, meta: &Meta);
}

/// Keeps the applied metadata in memory.
#[derive(Debug, Default)]
pub struct MetaBuffer {
    current: RefCell<Meta>,
    history: RefCell<Vec<Meta>>,
}

impl MetaBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently applied metadata.
    pub fn current(&self) -> Meta {
        self.current.borrow().clone()
    }

    /// Every update, oldest first.
    pub fn updates(&self) -> Vec<Meta> {
        self.history.borrow().clone()
    }
}

impl MetaSink for MetaBuffer {
    fn update(&self, meta: &Meta) {
        *self.current.borrow_mut() = meta.clone();
        self.history.borrow_mut().push(meta.clone());
    }
}

/// Render metadata as head tags. `title` becomes a `<title>` element.
pub fn render_meta_tags(meta: &Meta) -> String {
    let mut html = String::new();

    if let Some(title) = meta.get("title") {
        html.push_str(&format!("<title>{}</title>\n", html_escape(title)));
    }

    for (name, content) in meta.iter().filter(|(name, _)| *name != "title") {
        html.push_str(&format!(
            r#"<meta name="{}" content="{}">"#,
            html_escape(name),
            html_escape(content)
        ));
        html.push('\n');
    }

    html
}

pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
