//! Route components: isolated sub-applications under the components root.

use std::path::{self, Path, PathBuf};

use crate::error::RouterError;

/// A component a route is served from.
///
/// Components live at `<components_root>/<identifier>/` and carry their own
/// views and resources. The identifier must name a single directory and
/// that directory must exist when the component is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    identifier: String,
    path: PathBuf,
    constraints: Vec<String>,
}

impl Component {
    pub fn new(
        identifier: impl Into<String>,
        components_root: &Path,
        constraints: Vec<String>,
    ) -> Result<Self, RouterError> {
        let identifier = identifier.into();
        let mut parts = Path::new(&identifier).components();
        let single_directory = matches!(
            (parts.next(), parts.next()),
            (Some(path::Component::Normal(_)), None)
        );
        if !single_directory || identifier.contains(['/', '\\']) {
            return Err(RouterError::InvalidRouteTable {
                key: identifier,
                reason: "component identifier must be a single directory name".into(),
            });
        }

        let path = components_root.join(&identifier);
        if !path.is_dir() {
            return Err(RouterError::DirectoryNotFound {
                component: identifier,
                path,
            });
        }
        Ok(Self {
            identifier,
            path,
            constraints,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn views_path(&self) -> PathBuf {
        self.path.join("views")
    }

    /// Constraints every route of this component is validated against.
    pub fn constraints(&self) -> &[String] {
        &self.constraints
    }
}
