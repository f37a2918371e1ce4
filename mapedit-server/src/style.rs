//! Map style document served to the editor front end.
//!
//! The style on disk points its vector source at a public tile service. The
//! proxy rewrites that source to the locally configured tile URL template on
//! every request, so edits to the file take effect without a restart.

use std::io;

use camino::Utf8PathBuf;
use log::warn;
use serde_json::{Map, Value};
use thiserror::Error;

/// Where the style lives and how its tile source is rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleSettings {
    /// Style document path.
    pub path: Utf8PathBuf,
    /// Name of the entry under `sources` to rewrite.
    pub source: String,
    /// Tile URL template, e.g. `http://localhost:8080/data/v3/{z}/{x}/{y}.pbf`.
    pub tile_url_template: String,
}

/// Errors raised while loading the style.
#[derive(Debug, Error)]
pub enum StyleError {
    /// No style document exists at the configured path.
    #[error("style document not found at {path}")]
    NotFound {
        /// Configured path.
        path: Utf8PathBuf,
    },
    /// The document exists but could not be read.
    #[error("failed to read style document at {path}")]
    Read {
        /// Configured path.
        path: Utf8PathBuf,
        /// Underlying IO failure.
        #[source]
        source: io::Error,
    },
    /// The document is not a JSON object.
    #[error("style document at {path} is not valid JSON: {source}")]
    InvalidFormat {
        /// Configured path.
        path: Utf8PathBuf,
        /// Parser failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Serves the style document with its tile source rewritten.
#[derive(Debug, Clone)]
pub struct StyleProxy {
    settings: StyleSettings,
}

impl StyleProxy {
    /// Proxy for `settings`.
    #[must_use]
    pub const fn new(settings: StyleSettings) -> Self {
        Self { settings }
    }

    /// Load the style and point the configured source at the local tiles.
    ///
    /// The source's `tiles` becomes a one-element array holding the template
    /// and any TileJSON `url` is dropped. A style without the source is
    /// returned unchanged. This call blocks on the filesystem.
    pub fn get_map_style(&self) -> Result<Map<String, Value>, StyleError> {
        let path = &self.settings.path;
        let text = mapedit_fs::read_utf8_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                StyleError::NotFound { path: path.clone() }
            } else {
                StyleError::Read {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        let mut style: Map<String, Value> =
            serde_json::from_str(&text).map_err(|source| StyleError::InvalidFormat {
                path: path.clone(),
                source,
            })?;
        self.rewrite_source(&mut style);
        Ok(style)
    }

    fn rewrite_source(&self, style: &mut Map<String, Value>) {
        let name = self.settings.source.as_str();
        let entry = style
            .get_mut("sources")
            .and_then(|sources| sources.get_mut(name))
            .and_then(Value::as_object_mut);
        let Some(entry) = entry else {
            warn!(
                "style at {} has no source named {name}; serving it unchanged",
                self.settings.path
            );
            return;
        };
        entry.remove("url");
        entry.insert(
            "tiles".to_owned(),
            Value::Array(vec![Value::String(self.settings.tile_url_template.clone())]),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use serde_json::json;
    use tempfile::TempDir;

    const TEMPLATE: &str = "http://localhost:8080/data/v3/{z}/{x}/{y}.pbf";

    struct StyleDir {
        _dir: TempDir,
        path: Utf8PathBuf,
    }

    impl StyleDir {
        fn write(&self, contents: &str) {
            std::fs::write(&self.path, contents).expect("write style");
        }

        fn proxy(&self, source: &str) -> StyleProxy {
            StyleProxy::new(StyleSettings {
                path: self.path.clone(),
                source: source.to_owned(),
                tile_url_template: TEMPLATE.to_owned(),
            })
        }
    }

    #[fixture]
    fn style_dir() -> StyleDir {
        let dir = TempDir::new().expect("tempdir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("style.json")).expect("utf-8 path");
        StyleDir { _dir: dir, path }
    }

    #[rstest]
    fn rewrites_named_source(style_dir: StyleDir) {
        style_dir.write(
            &json!({
                "version": 8,
                "sources": {
                    "openmaptiles": {"type": "vector", "url": "https://example.com/tiles.json"},
                    "hillshade": {"type": "raster", "url": "https://example.com/dem.json"}
                },
                "layers": []
            })
            .to_string(),
        );

        let style = style_dir
            .proxy("openmaptiles")
            .get_map_style()
            .expect("load style");

        assert_eq!(
            style["sources"]["openmaptiles"],
            json!({"type": "vector", "tiles": [TEMPLATE]})
        );
        assert_eq!(
            style["sources"]["hillshade"]["url"],
            "https://example.com/dem.json"
        );
        assert_eq!(style["version"], 8);
    }

    #[rstest]
    fn missing_source_leaves_style_unchanged(style_dir: StyleDir) {
        let original = json!({"version": 8, "sources": {"other": {"type": "vector"}}});
        style_dir.write(&original.to_string());

        let style = style_dir
            .proxy("openmaptiles")
            .get_map_style()
            .expect("load style");

        assert_eq!(Value::Object(style), original);
    }

    #[rstest]
    fn absent_file_is_not_found(style_dir: StyleDir) {
        let err = style_dir
            .proxy("openmaptiles")
            .get_map_style()
            .expect_err("missing file");
        assert!(matches!(err, StyleError::NotFound { .. }));
    }

    #[rstest]
    #[case("{not json")]
    #[case("[1, 2, 3]")]
    fn unparseable_document_is_invalid_format(style_dir: StyleDir, #[case] contents: &str) {
        style_dir.write(contents);
        let err = style_dir
            .proxy("openmaptiles")
            .get_map_style()
            .expect_err("invalid style");
        assert!(matches!(err, StyleError::InvalidFormat { .. }));
    }
}
