//! Views, blueprints and layouts.
//!
//! A [`View`] renders named templates from an include path with a set of
//! variables. A [`Blueprint`] describes the page around it: response headers
//! and an optional layout. When a blueprint with a layout is applied, the next
//! render wraps the requested view in that layout (the layout pulls the view
//! in with `@yield`). Layouts apply once per blueprint, so views rendered
//! from inside a controller afterwards come back bare.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use minijinja::{AutoEscape, Environment};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::cache::CompileCache;
use crate::compiler::Adapter;
use crate::error::RenderError;
use crate::functions::register_functions;
use crate::loader::{TemplateLoader, LAYOUT_NAMESPACE};
use crate::pistachio::VIEW_FILE_VAR;

/// Where views live and how their files are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewConfig {
    /// Directory template names resolve against.
    pub include_path: PathBuf,
    /// Directory `layout:` names resolve against.
    pub layouts_root: PathBuf,
    /// Template file extension (`html`).
    pub extension: String,
    /// Extension prefix of Pistachio templates (`io` in `get.io.html`).
    pub extension_prefix: Option<String>,
    pub adapter: Adapter,
    /// Base URL for `asset()`.
    pub assets_url: String,
}

impl ViewConfig {
    pub fn new(include_path: impl Into<PathBuf>, layouts_root: impl Into<PathBuf>) -> Self {
        Self {
            include_path: include_path.into(),
            layouts_root: layouts_root.into(),
            extension: "html".into(),
            extension_prefix: Some("io".into()),
            adapter: Adapter::Pistachio,
            assets_url: "/assets".into(),
        }
    }

    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn extension_prefix(mut self, prefix: Option<String>) -> Self {
        self.extension_prefix = prefix;
        self
    }

    pub fn adapter(mut self, adapter: Adapter) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn assets_url(mut self, url: impl Into<String>) -> Self {
        self.assets_url = url.into();
        self
    }
}

/// Page-level decoration: response headers plus an optional layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blueprint {
    name: String,
    headers: Vec<(String, String)>,
    layout: Option<String>,
}

impl Blueprint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a response header. A repeated name replaces the earlier value.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    pub fn layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn layout_name(&self) -> Option<&str> {
        self.layout.as_deref()
    }
}

/// Layout lifecycle of a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutState {
    NoLayout,
    /// The next render wraps its view in this layout.
    Pending(String),
    /// The layout has been rendered and will not be applied again.
    Applied,
}

/// Renders templates with accumulated variables.
#[derive(Debug)]
pub struct View {
    config: ViewConfig,
    cache: Arc<CompileCache>,
    variables: Map<String, Value>,
    blueprint: Option<Blueprint>,
    layout: LayoutState,
}

impl View {
    pub fn new(config: ViewConfig) -> Self {
        Self::with_cache(config, Arc::new(CompileCache::new()))
    }

    /// Creates a view sharing compiled templates with other views.
    pub fn with_cache(config: ViewConfig, cache: Arc<CompileCache>) -> Self {
        Self {
            config,
            cache,
            variables: Map::new(),
            blueprint: None,
            layout: LayoutState::NoLayout,
        }
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn include_path(&self) -> &Path {
        &self.config.include_path
    }

    pub fn set_include_path(&mut self, path: impl Into<PathBuf>) {
        self.config.include_path = path.into();
    }

    /// Applies a blueprint. Its layout, if any, wraps the next render.
    pub fn set_blueprint(&mut self, blueprint: Blueprint) {
        self.layout = match blueprint.layout_name() {
            Some(layout) => LayoutState::Pending(layout.to_string()),
            None => LayoutState::NoLayout,
        };
        self.blueprint = Some(blueprint);
    }

    pub fn blueprint(&self) -> Option<&Blueprint> {
        self.blueprint.as_ref()
    }

    pub fn layout_state(&self) -> &LayoutState {
        &self.layout
    }

    pub fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }

    /// Sets one variable, replacing an earlier value.
    pub fn assign(
        &mut self,
        name: impl Into<String>,
        value: impl Serialize,
    ) -> Result<(), RenderError> {
        self.variables.insert(name.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Merges every field of `variables` into the view. `variables` must
    /// serialize to a map (or to `null`, which adds nothing).
    pub fn merge(&mut self, variables: impl Serialize) -> Result<(), RenderError> {
        match serde_json::to_value(variables)? {
            Value::Object(map) => {
                self.variables.extend(map);
                Ok(())
            }
            Value::Null => Ok(()),
            other => Err(RenderError::SerializationError(format!(
                "view variables must be a map, got {other}"
            ))),
        }
    }

    /// Renders the template `name` after merging `variables`.
    ///
    /// With a pending layout, the layout is rendered instead and receives
    /// the view's name in `__view_file`.
    pub fn render(
        &mut self,
        name: &str,
        variables: impl Serialize,
    ) -> Result<String, RenderError> {
        self.merge(variables)?;

        let pending = match &self.layout {
            LayoutState::Pending(layout) => Some(layout.clone()),
            _ => None,
        };
        let target = match pending {
            Some(layout) => {
                debug!("Rendering view {} inside layout {}", name, layout);
                self.variables
                    .insert(VIEW_FILE_VAR.to_string(), Value::String(name.to_string()));
                self.layout = LayoutState::Applied;
                format!("{LAYOUT_NAMESPACE}{layout}")
            }
            None => {
                self.variables.remove(VIEW_FILE_VAR);
                name.to_string()
            }
        };

        let env = self.environment();
        let template = env.get_template(&target)?;
        Ok(template.render(&self.variables)?)
    }

    /// Renders template source that does not live on disk. Included
    /// templates still resolve through the include path.
    pub fn render_str(
        &self,
        source: &str,
        variables: impl Serialize,
    ) -> Result<String, RenderError> {
        let mut context = self.variables.clone();
        if let Value::Object(map) = serde_json::to_value(variables)? {
            context.extend(map);
        }
        let compiled = self
            .config
            .adapter
            .compiler()
            .compile(source)
            .map_err(|error| RenderError::CompileError {
                template: "<inline>".to_string(),
                error,
            })?;
        let env = self.environment();
        Ok(env.render_str(&compiled, &context)?)
    }

    fn environment(&self) -> Environment<'static> {
        let loader = TemplateLoader::new(
            self.config.include_path.clone(),
            self.config.layouts_root.clone(),
            self.config.adapter,
            &self.config.extension,
            self.config.extension_prefix.as_deref(),
            Arc::clone(&self.cache),
        );

        let mut env = Environment::new();
        env.set_loader(loader.into_minijinja());
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_keep_trailing_newline(true);
        register_functions(&mut env, &self.config.assets_url);
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn app() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let views = dir.path().join("views/account");
        fs::create_dir_all(&views).unwrap();
        fs::create_dir_all(dir.path().join("layouts")).unwrap();

        fs::write(views.join("get.io.html"), "Hello {{ $name }}").unwrap();
        fs::write(views.join("_menu.io.html"), "[menu]").unwrap();
        fs::write(
            views.join("list.io.html"),
            "@partial('menu')@foreach($items as $i)<{{ $i }}>@endforeach",
        )
        .unwrap();
        fs::write(views.join("raw.html"), "{{ name }}!").unwrap();
        fs::write(
            dir.path().join("layouts/pistachio.io.html"),
            "<body class=\"{{ $bodyClassNames }}\">@yield</body>",
        )
        .unwrap();
        dir
    }

    fn view(dir: &TempDir) -> View {
        View::new(ViewConfig::new(
            dir.path().join("views/account"),
            dir.path().join("layouts"),
        ))
    }

    #[test]
    fn test_render_view() {
        let dir = app();
        let mut view = view(&dir);
        assert_eq!(view.render("get", json!({ "name": "Ada" })).unwrap(), "Hello Ada");
    }

    #[test]
    fn test_variables_accumulate() {
        let dir = app();
        let mut view = view(&dir);
        view.assign("name", "Grace").unwrap();
        assert_eq!(view.render("get", ()).unwrap(), "Hello Grace");
        assert_eq!(view.render("get", json!({ "name": "Ada" })).unwrap(), "Hello Ada");
        assert_eq!(view.variables()["name"], "Ada");
    }

    #[test]
    fn test_output_is_not_escaped() {
        let dir = app();
        let mut view = view(&dir);
        assert_eq!(
            view.render("get", json!({ "name": "<b>x</b>" })).unwrap(),
            "Hello <b>x</b>"
        );
    }

    #[test]
    fn test_partials_and_loops() {
        let dir = app();
        let mut view = view(&dir);
        assert_eq!(
            view.render("list", json!({ "items": [1, 2] })).unwrap(),
            "[menu]<1><2>"
        );
    }

    #[test]
    fn test_layout_applies_once() {
        let dir = app();
        let mut view = view(&dir);
        view.set_blueprint(Blueprint::new("Pistachio").layout("pistachio"));
        assert_eq!(
            view.layout_state(),
            &LayoutState::Pending("pistachio".to_string())
        );

        let page = view
            .render("get", json!({ "name": "Ada", "bodyClassNames": "brewery account" }))
            .unwrap();
        assert_eq!(page, "<body class=\"brewery account\">Hello Ada</body>");
        assert_eq!(view.layout_state(), &LayoutState::Applied);

        assert_eq!(view.render("get", ()).unwrap(), "Hello Ada");
    }

    #[test]
    fn test_blueprint_without_layout() {
        let dir = app();
        let mut view = view(&dir);
        view.set_blueprint(Blueprint::new("Api").header("Content-Type", "application/json"));
        assert_eq!(view.layout_state(), &LayoutState::NoLayout);
        assert_eq!(view.render("get", json!({ "name": "x" })).unwrap(), "Hello x");
    }

    #[test]
    fn test_blueprint_header_replaces_same_name() {
        let bp = Blueprint::new("Pistachio")
            .header("X-Brewery-Version", "0.9")
            .header("x-brewery-version", "1.0");
        assert_eq!(bp.headers(), &[("X-Brewery-Version".to_string(), "1.0".to_string())]);
    }

    #[test]
    fn test_plain_adapter() {
        let dir = app();
        let mut view = View::new(
            ViewConfig::new(dir.path().join("views/account"), dir.path().join("layouts"))
                .adapter(Adapter::Plain),
        );
        assert_eq!(view.render("raw", json!({ "name": "plain" })).unwrap(), "plain!");
    }

    #[test]
    fn test_missing_template() {
        let dir = app();
        let mut view = view(&dir);
        let err = view.render("delete", ()).unwrap_err();
        assert!(matches!(err, RenderError::TemplateNotFound(_)));
    }

    #[test]
    fn test_merge_rejects_non_maps() {
        let dir = app();
        let mut view = view(&dir);
        assert!(view.merge(json!([1, 2])).is_err());
        assert!(view.merge(()).is_ok());
    }

    #[test]
    fn test_render_str_uses_helpers() {
        let dir = app();
        let view = view(&dir);
        let out = view
            .render_str("{{ asset('logo.png') }} @render('get')", json!({ "name": "Ada" }))
            .unwrap();
        assert_eq!(out, "/assets/img/logo.png Hello Ada");
    }
}
