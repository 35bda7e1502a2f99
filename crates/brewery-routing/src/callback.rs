//! Callback descriptors.
//!
//! A [`CallbackDescriptor`] identifies one resolvable unit of a route: the
//! action hook, the controller, or one constraint. It knows which resource to
//! look up and which method to call on it, but not whether that resource
//! exists. Existence is checked lazily when the route imports its resources.

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// The closed set of callback kinds a route is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    Action,
    Controller,
    Constraint,
}

impl CallbackKind {
    /// Directory name resources of this kind live under.
    pub fn directory(&self) -> &'static str {
        match self {
            CallbackKind::Action => "Actions",
            CallbackKind::Controller => "Controllers",
            CallbackKind::Constraint => "Constraints",
        }
    }
}

impl fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackKind::Action => f.write_str("action"),
            CallbackKind::Controller => f.write_str("controller"),
            CallbackKind::Constraint => f.write_str("constraint"),
        }
    }
}

/// Where a resource is registered: at the application root or inside a component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Application,
    Component(String),
}

impl Scope {
    pub fn component(identifier: impl Into<String>) -> Self {
        Scope::Component(identifier.into())
    }
}

/// Conventional location of a resource.
///
/// Locations double as registry keys and as the text shown in
/// "resource does not exist" diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceLocation {
    pub scope: Scope,
    pub kind: CallbackKind,
    pub name: String,
}

impl ResourceLocation {
    pub fn new(scope: Scope, kind: CallbackKind, name: impl Into<String>) -> Self {
        Self {
            scope,
            kind,
            name: trim_name(&name.into()).to_string(),
        }
    }

    /// Filesystem path of the resource below the given roots.
    pub fn path(&self, application_root: &Path, components_root: &Path) -> PathBuf {
        let base = match &self.scope {
            Scope::Application => application_root.to_path_buf(),
            Scope::Component(id) => components_root.join(id),
        };
        base.join(self.kind.directory()).join(&self.name)
    }
}

impl fmt::Display for ResourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Scope::Application => write!(f, "app/{}/{}", self.kind.directory(), self.name),
            Scope::Component(id) => write!(
                f,
                "components/{}/{}/{}",
                id,
                self.kind.directory(),
                self.name
            ),
        }
    }
}

fn trim_name(name: &str) -> &str {
    name.trim_matches('/')
}

/// Identity of an action, controller or constraint on a route.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackDescriptor {
    kind: CallbackKind,
    name: String,
    method: String,
    parameters: Vec<Value>,
    optional: bool,
    ignore_component_scope: bool,
}

impl CallbackDescriptor {
    /// Creates a descriptor. Descriptors are optional by default: a missing
    /// resource is not an error.
    pub fn new(kind: CallbackKind, name: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            method: method.into(),
            parameters: Vec::new(),
            optional: true,
            ignore_component_scope: false,
        }
    }

    /// An optional action hook.
    pub fn action(name: impl Into<String>, method: impl Into<String>) -> Self {
        Self::new(CallbackKind::Action, name, method)
    }

    /// A mandatory controller.
    pub fn controller(name: impl Into<String>, method: impl Into<String>) -> Self {
        Self::new(CallbackKind::Controller, name, method).optional(false)
    }

    /// A mandatory constraint, validated through its `validate` method.
    ///
    /// A leading `/` in the name resolves the constraint from the application
    /// root even when the route runs inside a component.
    pub fn constraint(name: impl Into<String>) -> Self {
        let name = name.into();
        let ignore = name.starts_with('/');
        Self::new(CallbackKind::Constraint, name, "validate")
            .optional(false)
            .ignore_component_scope(ignore)
    }

    pub fn with_parameters(mut self, parameters: Vec<Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn ignore_component_scope(mut self, ignore: bool) -> Self {
        self.ignore_component_scope = ignore;
        self
    }

    pub fn kind(&self) -> CallbackKind {
        self.kind
    }

    /// The resource name, trimmed of path separators.
    pub fn name(&self) -> &str {
        trim_name(&self.name)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    pub fn set_parameters(&mut self, parameters: Vec<Value>) {
        self.parameters = parameters;
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn ignores_component_scope(&self) -> bool {
        self.ignore_component_scope
    }

    /// Resolves the resource location, scoped to `component` unless this
    /// descriptor ignores component scope.
    pub fn location(&self, component: Option<&str>) -> ResourceLocation {
        let scope = match component {
            Some(id) if !self.ignore_component_scope => Scope::component(id),
            _ => Scope::Application,
        };
        ResourceLocation::new(scope, self.kind, self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let action = CallbackDescriptor::action("AccountAction", "get");
        assert!(action.is_optional());
        assert!(!action.ignores_component_scope());
        assert!(action.parameters().is_empty());

        let controller = CallbackDescriptor::controller("AccountController", "get");
        assert!(!controller.is_optional());
    }

    #[test]
    fn test_constraint_with_leading_slash_ignores_component() {
        let scoped = CallbackDescriptor::constraint("Authenticated");
        assert_eq!(scoped.method(), "validate");
        assert_eq!(
            scoped.location(Some("AdminComponent")).to_string(),
            "components/AdminComponent/Constraints/Authenticated"
        );

        let rooted = CallbackDescriptor::constraint("/Authenticated");
        assert_eq!(rooted.name(), "Authenticated");
        assert!(rooted.ignores_component_scope());
        assert_eq!(
            rooted.location(Some("AdminComponent")).to_string(),
            "app/Constraints/Authenticated"
        );
    }

    #[test]
    fn test_location_without_component() {
        let controller = CallbackDescriptor::controller("WidgetsController", "get");
        let location = controller.location(None);
        assert_eq!(location.scope, Scope::Application);
        assert_eq!(location.to_string(), "app/Controllers/WidgetsController");
    }

    #[test]
    fn test_location_path() {
        let location = ResourceLocation::new(
            Scope::component("AdminComponent"),
            CallbackKind::Controller,
            "AccountController",
        );
        let path = location.path(Path::new("/srv/app"), Path::new("/srv/app/components"));
        assert_eq!(
            path,
            PathBuf::from("/srv/app/components/AdminComponent/Controllers/AccountController")
        );
    }

    #[test]
    fn test_parameters_replace() {
        let mut controller = CallbackDescriptor::controller("AccountController", "post")
            .with_parameters(vec![json!("getAccountBySlug")]);
        controller.set_parameters(vec![json!("42"), json!(null)]);
        assert_eq!(controller.parameters(), &[json!("42"), json!(null)]);
    }
}
