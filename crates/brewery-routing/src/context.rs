//! Per-request state handed to actions, controllers and constraints.
//!
//! # State Management: App State vs Extensions
//!
//! A [`RequestContext`] carries two containers:
//!
//! - **`app_state`**: shared, immutable state frozen when the application is
//!   built (configuration, view environment, compile cache). Every request
//!   sees the same `Rc`.
//! - **`extensions`**: mutable, request-scoped state. Constraints typically
//!   put what they learned here (the authenticated user, say) for the
//!   controller to pick up.
//!
//! The request and the response being assembled live on the context too, as
//! does the [`CurrentRoute`] record the dispatcher sets right before invoking
//! the controller.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use http::{Method, Uri};

use crate::http::{Request, RequestMethod, Response};

/// Values stored by type, one per type.
///
/// The same container backs both scopes of a [`RequestContext`]. It names
/// its scope so a missing value reports where it was looked up:
///
/// ```rust
/// use brewery_routing::Extensions;
///
/// struct User { name: String }
///
/// let mut scope = Extensions::request_scope();
/// scope.insert(User { name: "ada".into() });
///
/// let user = scope.get_required::<User>()?;
/// assert_eq!(user.name, "ada");
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct Extensions {
    scope: &'static str,
    values: HashMap<TypeId, Box<dyn Any>>,
}

impl Extensions {
    /// Container for application state, filled by the app builder.
    pub fn app_state() -> Self {
        Self::scoped("application state")
    }

    /// Container for request-scoped values. Constraints and actions insert
    /// what they learned for the controller.
    pub fn request_scope() -> Self {
        Self::scoped("request scope")
    }

    fn scoped(scope: &'static str) -> Self {
        Self {
            scope,
            values: HashMap::new(),
        }
    }

    /// Stores `value`, handing back the one it replaced.
    pub fn insert<T: 'static>(&mut self, value: T) -> Option<T> {
        self.values
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|previous| previous.downcast().ok().map(|b| *b))
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref())
    }

    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.values
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut())
    }

    /// The stored `T`, or an error naming the type and the scope. Route
    /// callbacks return it with `?`, so the failure lands in the error dump.
    pub fn get_required<T: 'static>(&self) -> Result<&T, anyhow::Error> {
        self.get::<T>().ok_or_else(|| {
            anyhow::anyhow!(
                "{} holds no {}",
                self.scope,
                std::any::type_name::<T>()
            )
        })
    }

    /// Takes the stored `T` out, e.g. a blueprint consumed by one render.
    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.values
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast().ok().map(|b| *b))
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for Extensions {
    fn default() -> Self {
        Self::request_scope()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("scope", &self.scope)
            .field("len", &self.values.len())
            .finish_non_exhaustive()
    }
}

/// Description of the route being served, used to locate its views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentRoute {
    /// Controller name, e.g. `AccountController`.
    pub controller: String,
    /// Callback invoked on the controller, e.g. `getAccountBySlug`.
    pub callback: String,
    /// Lowercase controller name without the `Controller` suffix.
    pub resource: String,
    /// View name derived from the callback, e.g. `account.by.slug`.
    pub action: String,
    /// Component the route belongs to, if any.
    pub component: Option<String>,
    /// Directory the route's templates are looked up in.
    pub include_path: PathBuf,
}

impl CurrentRoute {
    /// Derives the route record.
    ///
    /// `views_root` is the application views directory; routes inside a
    /// component use `<components_root>/<component>/views` instead.
    pub fn new(
        controller: &str,
        callback: &str,
        component: Option<&str>,
        views_root: &Path,
        components_root: &Path,
    ) -> Self {
        let resource = strip_suffix_ignore_case(controller, "Controller").to_lowercase();
        let base = match component {
            Some(id) => components_root.join(id).join("views"),
            None => views_root.to_path_buf(),
        };

        Self {
            controller: controller.to_string(),
            callback: callback.to_string(),
            action: view_action(callback),
            include_path: base.join(&resource),
            component: component.map(str::to_string),
            resource,
        }
    }
}

fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> &'a str {
    let split = name.len().saturating_sub(suffix.len());
    match name.get(split..) {
        Some(tail) if tail.eq_ignore_ascii_case(suffix) => &name[..split],
        _ => name,
    }
}

/// Splits a callback on its camel-case humps and drops verb words:
/// `getAccountBySlug` becomes `account.by.slug`, `get` stays `get`.
fn view_action(callback: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    for ch in callback.chars() {
        if ch.is_ascii_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.push(ch.to_ascii_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }

    if words.len() < 2 {
        return callback.to_lowercase();
    }

    let is_verb = |word: &str| {
        word == "ajax" || word == "pjax" || word.parse::<RequestMethod>().is_ok()
    };
    let kept: Vec<&str> = words
        .iter()
        .map(String::as_str)
        .filter(|word| !is_verb(word))
        .collect();

    match kept.is_empty() {
        true => words.last().cloned().unwrap_or_default(),
        false => kept.join("."),
    }
}

/// Context handed to every routed callback.
#[derive(Debug)]
pub struct RequestContext {
    pub request: Request,
    pub response: Response,
    /// Application-lifetime state, shared by all requests.
    pub app_state: Rc<Extensions>,
    /// Request-scoped state. Each dispatch starts with an empty container.
    pub extensions: Extensions,
    /// Set by the dispatcher before the controller runs.
    pub route: Option<CurrentRoute>,
}

impl RequestContext {
    pub fn new(request: Request, app_state: Rc<Extensions>) -> Self {
        Self {
            request,
            response: Response::new(),
            app_state,
            extensions: Extensions::request_scope(),
            route: None,
        }
    }

    /// Application state of type `T`, registered when the app was built.
    pub fn state<T: 'static>(&self) -> Result<&T, anyhow::Error> {
        self.app_state.get_required()
    }

    /// Request-scoped value of type `T`, typically left by a constraint.
    pub fn local<T: 'static>(&self) -> Result<&T, anyhow::Error> {
        self.extensions.get_required()
    }

    /// The current route, or an error when called before dispatch set it.
    pub fn current_route(&self) -> Result<&CurrentRoute, anyhow::Error> {
        self.route
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no route has been dispatched for this request"))
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(
            Request::new(Method::GET, Uri::from_static("/")),
            Rc::new(Extensions::app_state()),
        )
    }
}
