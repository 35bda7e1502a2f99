//! Template name resolution.
//!
//! Names are resolved against the view's include path; names in the
//! `layout:` namespace resolve against the layouts directory. The file
//! extension is appended by the loader, so templates refer to each other
//! by bare name (`@render('header')`, `@render('layout:nav')`).

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::cache::CompileCache;
use crate::compiler::{Adapter, Compiler};
use crate::error::RenderError;

/// Namespace prefix for layout templates.
pub const LAYOUT_NAMESPACE: &str = "layout:";

/// Loads and compiles templates by name.
#[derive(Debug, Clone)]
pub struct TemplateLoader {
    include_path: PathBuf,
    layouts_root: PathBuf,
    file_extension: String,
    compiler: Arc<Compiler>,
    cache: Arc<CompileCache>,
}

impl TemplateLoader {
    pub fn new(
        include_path: impl Into<PathBuf>,
        layouts_root: impl Into<PathBuf>,
        adapter: Adapter,
        extension: &str,
        prefix: Option<&str>,
        cache: Arc<CompileCache>,
    ) -> Self {
        Self {
            include_path: include_path.into(),
            layouts_root: layouts_root.into(),
            file_extension: adapter.file_extension(extension, prefix),
            compiler: Arc::new(adapter.compiler()),
            cache,
        }
    }

    pub fn include_path(&self) -> &Path {
        &self.include_path
    }

    /// File path for a template name, or `None` when the name escapes its
    /// root directory.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let (root, name) = match name.strip_prefix(LAYOUT_NAMESPACE) {
            Some(layout) => (&self.layouts_root, layout),
            None => (&self.include_path, name),
        };
        let name = name.trim_matches('/');
        let relative = Path::new(name);
        if name.is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(root.join(format!("{}.{}", name, self.file_extension)))
    }

    /// Compiled source of a template, or `None` when no file exists for it.
    pub fn load(&self, name: &str) -> Result<Option<String>, RenderError> {
        let Some(path) = self.resolve(name) else {
            return Ok(None);
        };
        if !path.is_file() {
            debug!("No template file for {} at {}", name, path.display());
            return Ok(None);
        }
        let compiled = self.cache.load(&path, &self.compiler)?;
        Ok(Some(compiled.to_string()))
    }

    /// Wraps the loader for [`minijinja::Environment::set_loader`].
    pub fn into_minijinja(
        self,
    ) -> impl Fn(&str) -> Result<Option<String>, minijinja::Error> + Send + Sync + 'static {
        move |name| {
            self.load(name).map_err(|err| {
                minijinja::Error::new(
                    minijinja::ErrorKind::InvalidOperation,
                    format!("could not load template {name}: {err}"),
                )
                .with_source(err)
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn loader(root: &Path) -> TemplateLoader {
        TemplateLoader::new(
            root.join("views/account"),
            root.join("layouts"),
            Adapter::Pistachio,
            "html",
            Some("io"),
            Arc::new(CompileCache::new()),
        )
    }

    #[test]
    fn test_resolve_views_and_layouts() {
        let loader = loader(Path::new("/srv/app"));
        assert_eq!(
            loader.resolve("get"),
            Some(PathBuf::from("/srv/app/views/account/get.io.html"))
        );
        assert_eq!(
            loader.resolve("layout:pistachio"),
            Some(PathBuf::from("/srv/app/layouts/pistachio.io.html"))
        );
        assert_eq!(
            loader.resolve("shared/_menu"),
            Some(PathBuf::from("/srv/app/views/account/shared/_menu.io.html"))
        );
    }

    #[test]
    fn test_resolve_rejects_escaping_names() {
        let loader = loader(Path::new("/srv/app"));
        assert_eq!(loader.resolve("../secret"), None);
        assert_eq!(loader.resolve("layout:"), None);
    }

    #[test]
    fn test_load_compiles_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("views/account")).unwrap();
        fs::write(dir.path().join("views/account/get.io.html"), "{{ $id }}").unwrap();

        let loader = loader(dir.path());
        assert_eq!(loader.load("get").unwrap().as_deref(), Some("{{ id }}"));
        assert_eq!(loader.load("post").unwrap(), None);
    }

    #[test]
    fn test_minijinja_loader_surfaces_compile_errors() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("views/account")).unwrap();
        fs::write(dir.path().join("views/account/get.io.html"), "@if((1)").unwrap();

        let load = loader(dir.path()).into_minijinja();
        let err = load("get").unwrap_err();
        assert_eq!(err.kind(), minijinja::ErrorKind::InvalidOperation);
        assert!(err.to_string().contains("@if"));
    }
}
