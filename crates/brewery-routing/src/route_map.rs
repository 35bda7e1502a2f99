//! Route table parsing.
//!
//! A route table is a JSON object. Keys are path patterns, values are either
//! a callback string or a group:
//!
//! ```json
//! {
//!     "account/:num": "AccountController::getAccount",
//!     "admin": {
//!         "component": "AdminComponent",
//!         "constraints": ["Authenticated"],
//!         "dashboard": "DashboardController::get",
//!         "settings": { "path": "SettingsController::post", "constraints": ["CsrfToken"] }
//!     }
//! }
//! ```
//!
//! Groups are flattened into a single ordered [`RouteMap`] keyed by the
//! concatenated path (`admin/dashboard`). Declaration order is preserved
//! because the first matching pattern wins.
//!
//! # Callback strings
//!
//! `Controller::callback/param1/param2`, where `::` and `/` are
//! interchangeable and a missing callback means `get`. The callback segment is
//! an optional `ajax`/`pjax` prefix, an HTTP verb and an optional name suffix:
//! `getAccountBySlug`, `ajaxPost`, `delete`.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::RouterError;
use crate::http::{AsyncMethod, RequestMethod};

static CALLBACK_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?P<async>(?:[ap]jax)?)(?P<verb>head|options|get|post|put|patch|delete|trace|connect)(?P<name>[a-z0-9]*)$",
    )
    .unwrap()
});

static WILDCARD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i):(num|word|alnum|uri)").unwrap());

/// Wildcard tokens usable in route keys and the pattern each expands to.
pub const WILDCARDS: [(&str, &str); 4] = [
    (":num", r"(\d+)"),
    (":word", r"(\w+)"),
    (":alnum", r"([A-Za-z0-9]+)"),
    (":uri", r"([A-Za-z_\-+#?&.@]+)"),
];

const COMPONENT_KEY: &str = "component";
const CONSTRAINTS_KEY: &str = "constraints";
const PATH_KEY: &str = "path";

/// A parsed route: everything the dispatcher needs to build a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRoute {
    pub is_async: bool,
    pub async_method: Option<AsyncMethod>,
    pub allowed_request_method: RequestMethod,
    pub component: Option<String>,
    pub constraints: Vec<String>,
    /// Action name, the controller name with `Controller` replaced by `Action`.
    pub action: String,
    pub controller: String,
    /// Method invoked on the action and the controller.
    pub callback: String,
    pub parameters: Vec<String>,
}

/// Uppercases the first character.
pub(crate) fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lowercases the first character.
pub(crate) fn lcfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Builds a callback name from its parts, skipping empty ones:
/// `("ajax", "GET", "list")` gives `ajaxGetList`.
pub(crate) fn compose_callback(async_prefix: &str, verb: &str, suffix: &str) -> String {
    let parts = [
        async_prefix.to_lowercase(),
        ucfirst(&verb.to_lowercase()),
        ucfirst(suffix),
    ];
    let joined: String = parts.iter().filter(|p| !p.is_empty()).map(String::as_str).collect();
    lcfirst(&joined)
}

/// The HTTP verb a callback name answers to, if it has one.
pub(crate) fn callback_verb(callback: &str) -> Option<RequestMethod> {
    CALLBACK_SEGMENT
        .captures(callback)
        .and_then(|caps| caps["verb"].parse().ok())
}

fn replace_ignore_case(haystack: &str, needle: &str, replacement: &str) -> String {
    let pattern = format!("(?i){}", regex::escape(needle));
    match Regex::new(&pattern) {
        Ok(re) => re.replace_all(haystack, replacement).into_owned(),
        Err(_) => haystack.to_string(),
    }
}

/// Parses a callback string such as `AccountController::getAccountBySlug/tea`.
pub fn parse_callback(spec: &str) -> Result<CompiledRoute, RouterError> {
    let mut normalized = spec.replace("::", "/");
    if !normalized.contains('/') {
        normalized.push_str("/get");
    }

    let mut segments = normalized.split('/');
    let controller = segments.next().unwrap_or_default().trim();
    let callback_segment = segments.next().unwrap_or_default().trim();
    let parameters: Vec<String> = segments.map(str::to_string).collect();

    if controller.is_empty() {
        return Err(RouterError::MalformedRoute {
            callback: spec.to_string(),
            reason: "missing controller name".into(),
        });
    }

    let caps = CALLBACK_SEGMENT
        .captures(callback_segment)
        .ok_or_else(|| RouterError::MalformedRoute {
            callback: spec.to_string(),
            reason: format!("`{callback_segment}` does not start with an HTTP verb"),
        })?;

    let async_prefix = &caps["async"];
    let verb: RequestMethod = caps["verb"]
        .parse()
        .map_err(|_| RouterError::MalformedRoute {
            callback: spec.to_string(),
            reason: format!("unknown HTTP verb `{}`", &caps["verb"]),
        })?;
    let async_method = async_prefix.parse::<AsyncMethod>().ok();
    let controller = ucfirst(controller);

    Ok(CompiledRoute {
        is_async: async_method.is_some(),
        async_method,
        allowed_request_method: verb,
        component: None,
        constraints: Vec::new(),
        action: replace_ignore_case(&controller, "Controller", "Action"),
        callback: compose_callback(async_prefix, verb.as_str(), &caps["name"]),
        controller,
        parameters,
    })
}

/// Expands wildcard tokens in a route key, case-insensitively.
pub fn expand_wildcards(key: &str) -> String {
    WILDCARD
        .replace_all(key, |caps: &Captures<'_>| {
            let token = caps[1].to_lowercase();
            WILDCARDS
                .iter()
                .find(|(name, _)| name[1..] == token)
                .map(|(_, pattern)| pattern.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn join_key(parent: &str, child: &str) -> String {
    format!("{parent}/{child}").trim_matches('/').to_string()
}

fn string_list(key: &str, value: &Value) -> Result<Vec<String>, RouterError> {
    let invalid = || RouterError::InvalidRouteTable {
        key: key.to_string(),
        reason: "`constraints` must be a list of constraint names".into(),
    };
    value
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|v| v.as_str().map(str::to_string).ok_or_else(invalid))
        .collect()
}

/// Parses one group into flattened `(key, route)` pairs.
///
/// `component` applies to every entry of the group. `constraints` accumulate
/// in declaration order: an entry receives the constraints declared before
/// it, never those declared after. An entry of the form
/// `{ "path": "...", "constraints": [...] }` adds its constraints to the
/// running list. Nested groups inherit the component and the constraints
/// accumulated so far.
pub fn parse_group(
    prefix: &str,
    group: &Map<String, Value>,
) -> Result<Vec<(String, CompiledRoute)>, RouterError> {
    parse_group_inherited(prefix, group, None, &[])
}

fn parse_group_inherited(
    prefix: &str,
    group: &Map<String, Value>,
    inherited_component: Option<&str>,
    inherited_constraints: &[String],
) -> Result<Vec<(String, CompiledRoute)>, RouterError> {
    let component = match group.get(COMPONENT_KEY) {
        Some(Value::String(id)) => Some(id.as_str()),
        Some(_) => {
            return Err(RouterError::InvalidRouteTable {
                key: join_key(prefix, COMPONENT_KEY),
                reason: "`component` must be a string".into(),
            })
        }
        None => inherited_component,
    };

    let mut constraints = inherited_constraints.to_vec();
    let mut routes = Vec::new();

    for (key, value) in group {
        let full_key = join_key(prefix, key);
        match (key.as_str(), value) {
            (COMPONENT_KEY, _) => {}
            (CONSTRAINTS_KEY, list) => constraints.extend(string_list(&full_key, list)?),
            (_, Value::String(callback)) => {
                let mut route = parse_callback(callback)?;
                route.component = component.map(str::to_string);
                route.constraints = constraints.clone();
                routes.push((full_key, route));
            }
            (_, Value::Object(entry)) if entry.contains_key(PATH_KEY) => {
                let callback = entry
                    .get(PATH_KEY)
                    .and_then(Value::as_str)
                    .ok_or_else(|| RouterError::InvalidRouteTable {
                        key: full_key.clone(),
                        reason: "`path` must be a callback string".into(),
                    })?;
                if let Some(list) = entry.get(CONSTRAINTS_KEY) {
                    constraints.extend(string_list(&full_key, list)?);
                }
                let mut route = parse_callback(callback)?;
                route.component = component.map(str::to_string);
                route.constraints = constraints.clone();
                routes.push((full_key, route));
            }
            (_, Value::Object(nested)) => {
                routes.extend(parse_group_inherited(
                    &full_key,
                    nested,
                    component,
                    &constraints,
                )?);
            }
            (_, _) => {
                return Err(RouterError::InvalidRouteTable {
                    key: full_key,
                    reason: "expected a callback string or a route group".into(),
                })
            }
        }
    }

    Ok(routes)
}

/// A route table entry with its compiled pattern.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    key: String,
    pattern: Regex,
    route: CompiledRoute,
}

impl RouteEntry {
    fn new(key: String, route: CompiledRoute) -> Result<Self, RouterError> {
        let trimmed = key.trim_matches('/');
        let source = if trimmed.is_empty() { "/" } else { trimmed };
        let expanded = format!("^{}$", expand_wildcards(source));
        let pattern = Regex::new(&expanded).map_err(|source| RouterError::InvalidPattern {
            pattern: key.clone(),
            source,
        })?;
        Ok(Self {
            key,
            pattern,
            route,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn route(&self) -> &CompiledRoute {
        &self.route
    }
}

/// Flattened, ordered route table.
#[derive(Debug, Clone, Default)]
pub struct RouteMap {
    entries: Vec<RouteEntry>,
}

impl RouteMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a route table.
    pub fn parse(table: &Value) -> Result<Self, RouterError> {
        let object = table
            .as_object()
            .ok_or_else(|| RouterError::InvalidRouteTable {
                key: "/".into(),
                reason: "route table must be an object".into(),
            })?;

        let mut map = Self::new();
        for (key, value) in object {
            match value {
                Value::String(callback) => map.insert(key.clone(), parse_callback(callback)?)?,
                Value::Object(group) => {
                    for (child_key, route) in parse_group(key, group)? {
                        map.insert(child_key, route)?;
                    }
                }
                _ => {
                    return Err(RouterError::InvalidRouteTable {
                        key: key.clone(),
                        reason: "expected a callback string or a route group".into(),
                    })
                }
            }
        }

        debug!("Parsed route table with {} routes", map.len());
        Ok(map)
    }

    /// Parses a route table from JSON text.
    pub fn from_json_str(source: &str) -> Result<Self, RouterError> {
        let table: Value =
            serde_json::from_str(source).map_err(|e| RouterError::InvalidRouteTable {
                key: "/".into(),
                reason: e.to_string(),
            })?;
        Self::parse(&table)
    }

    /// Reads and parses a route table file.
    pub fn load(path: &Path) -> Result<Self, RouterError> {
        let source = fs::read_to_string(path).map_err(|e| RouterError::InvalidRouteTable {
            key: path.display().to_string(),
            reason: e.to_string(),
        })?;
        debug!("Loading route table: {}", path.display());
        Self::from_json_str(&source)
    }

    /// Adds a route. A key that is already present keeps its position and
    /// takes the new route.
    pub fn insert(&mut self, key: String, route: CompiledRoute) -> Result<(), RouterError> {
        let entry = RouteEntry::new(key, route)?;
        match self.entries.iter_mut().find(|e| e.key == entry.key) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        Ok(())
    }

    /// Finds the first route whose pattern matches the normalized `path`.
    ///
    /// The returned route's parameters are the pattern's captures.
    pub fn find(&self, path: &str) -> Option<(&RouteEntry, CompiledRoute)> {
        self.entries.iter().find_map(|entry| {
            let caps = entry.pattern.captures(path)?;
            let mut route = entry.route.clone();
            route.parameters = caps
                .iter()
                .skip(1)
                .map(|m| m.map_or(String::new(), |m| m.as_str().to_string()))
                .collect();
            Some((entry, route))
        })
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&CompiledRoute> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| &e.route)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_callback_full() {
        let route = parse_callback("AccountController::getAccountBySlug/tea/42").unwrap();
        assert_eq!(route.controller, "AccountController");
        assert_eq!(route.action, "AccountAction");
        assert_eq!(route.callback, "getAccountBySlug");
        assert_eq!(route.allowed_request_method, RequestMethod::Get);
        assert_eq!(route.parameters, vec!["tea", "42"]);
        assert!(!route.is_async);
        assert_eq!(route.async_method, None);
    }

    #[test]
    fn test_parse_callback_defaults_to_get() {
        let route = parse_callback("Account").unwrap();
        assert_eq!(route.controller, "Account");
        assert_eq!(route.action, "Account");
        assert_eq!(route.callback, "get");
        assert_eq!(route.allowed_request_method, RequestMethod::Get);
        assert!(route.parameters.is_empty());
    }

    #[test]
    fn test_parse_callback_slash_delimiter_and_case() {
        let route = parse_callback("accountController/POST").unwrap();
        assert_eq!(route.controller, "AccountController");
        assert_eq!(route.callback, "post");
        assert_eq!(route.allowed_request_method, RequestMethod::Post);
    }

    #[test]
    fn test_parse_callback_async() {
        let route = parse_callback("CommentsController::ajaxPostReply").unwrap();
        assert_eq!(route.callback, "ajaxPostReply");
        assert!(route.is_async);
        assert_eq!(route.async_method, Some(AsyncMethod::Ajax));
        assert_eq!(route.allowed_request_method, RequestMethod::Post);

        let route = parse_callback("CommentsController::PjaxGet").unwrap();
        assert_eq!(route.callback, "pjaxGet");
        assert_eq!(route.async_method, Some(AsyncMethod::Pjax));
    }

    #[test]
    fn test_parse_callback_suffix_capitalized() {
        let route = parse_callback("AccountController::getaccount").unwrap();
        assert_eq!(route.callback, "getAccount");
    }

    #[test]
    fn test_parse_callback_without_verb_is_malformed() {
        let err = parse_callback("AccountController::fetch").unwrap_err();
        assert!(matches!(err, RouterError::MalformedRoute { .. }));
        assert_eq!(err.summary(), "Could not parse defined callback route.");

        let err = parse_callback("::get").unwrap_err();
        assert!(matches!(err, RouterError::MalformedRoute { .. }));
    }

    #[test]
    fn test_expand_wildcards() {
        assert_eq!(expand_wildcards("account/:num"), r"account/(\d+)");
        assert_eq!(expand_wildcards("tag/:WORD"), r"tag/(\w+)");
        assert_eq!(
            expand_wildcards(":alnum/:uri"),
            r"([A-Za-z0-9]+)/([A-Za-z_\-+#?&.@]+)"
        );
        assert_eq!(expand_wildcards("plain/:other"), "plain/:other");
    }

    #[test]
    fn test_group_component_hoisted_to_every_entry() {
        let group = json!({
            "dashboard": "DashboardController::get",
            "component": "AdminComponent",
            "users": "UsersController::get"
        });
        let routes = parse_group("admin", group.as_object().unwrap()).unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].0, "admin/dashboard");
        for (_, route) in &routes {
            assert_eq!(route.component.as_deref(), Some("AdminComponent"));
        }
    }

    #[test]
    fn test_group_constraints_accumulate_forward() {
        let group = json!({
            "public": "PagesController::get",
            "constraints": ["Authenticated"],
            "profile": "ProfileController::get",
            "settings": { "path": "SettingsController::post", "constraints": ["CsrfToken"] },
            "billing": "BillingController::get"
        });
        let routes = parse_group("", group.as_object().unwrap()).unwrap();
        let constraints: Vec<(&str, Vec<String>)> = routes
            .iter()
            .map(|(key, route)| (key.as_str(), route.constraints.clone()))
            .collect();

        assert_eq!(
            constraints,
            vec![
                ("public", vec![]),
                ("profile", vec!["Authenticated".to_string()]),
                (
                    "settings",
                    vec!["Authenticated".to_string(), "CsrfToken".to_string()]
                ),
                (
                    "billing",
                    vec!["Authenticated".to_string(), "CsrfToken".to_string()]
                ),
            ]
        );
    }

    #[test]
    fn test_nested_groups_flatten_and_inherit() {
        let group = json!({
            "component": "AdminComponent",
            "constraints": ["Authenticated"],
            "reports": {
                "constraints": ["Auditor"],
                "daily": "ReportsController::getDaily"
            }
        });
        let routes = parse_group("/admin/", group.as_object().unwrap()).unwrap();
        assert_eq!(routes.len(), 1);
        let (key, route) = &routes[0];
        assert_eq!(key, "admin/reports/daily");
        assert_eq!(route.component.as_deref(), Some("AdminComponent"));
        assert_eq!(route.constraints, vec!["Authenticated", "Auditor"]);
    }

    #[test]
    fn test_group_rejects_bad_shapes() {
        let group = json!({ "component": 42 });
        let err = parse_group("admin", group.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, RouterError::InvalidRouteTable { .. }));

        let group = json!({ "constraints": "Authenticated" });
        assert!(parse_group("admin", group.as_object().unwrap()).is_err());

        let group = json!({ "count": 3 });
        assert!(parse_group("admin", group.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_route_map_keeps_order_and_replaces_duplicates() {
        let mut map = RouteMap::from_json_str(
            r#"{
                "account/:num": "AccountController::getAccount",
                "account/new": "AccountController::getNew",
                "admin": { "dashboard": "DashboardController::get" }
            }"#,
        )
        .unwrap();
        let keys: Vec<&str> = map.entries().iter().map(RouteEntry::key).collect();
        assert_eq!(keys, vec!["account/:num", "account/new", "admin/dashboard"]);

        map.insert(
            "account/new".into(),
            parse_callback("AccountController::postNew").unwrap(),
        )
        .unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.entries()[1].route().callback, "postNew");
    }

    #[test]
    fn test_find_first_match_wins_with_captures() {
        let map = RouteMap::from_json_str(
            r#"{
                "account/:alnum": "AccountController::getAccountBySlug/ignored",
                "account/:num": "AccountController::getAccount"
            }"#,
        )
        .unwrap();
        let (entry, route) = map.find("account/42").unwrap();
        assert_eq!(entry.key(), "account/:alnum");
        assert_eq!(route.callback, "getAccountBySlug");
        assert_eq!(route.parameters, vec!["42"]);
        assert!(map.find("account/42/extra").is_none());
    }

    #[test]
    fn test_find_root_route() {
        let map = RouteMap::from_json_str(r#"{ "/": "HomeController::get" }"#).unwrap();
        let (_, route) = map.find("/").unwrap();
        assert_eq!(route.controller, "HomeController");
        assert!(route.parameters.is_empty());
    }

    #[test]
    fn test_invalid_pattern() {
        let err = RouteMap::from_json_str(r#"{ "broken/(": "BrokenController" }"#).unwrap_err();
        assert!(matches!(err, RouterError::InvalidPattern { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RouteMap::load(&dir.path().join("routes.json")).unwrap_err();
        assert!(matches!(err, RouterError::InvalidRouteTable { .. }));
    }

    #[test]
    fn test_callback_verb() {
        assert_eq!(callback_verb("getAccount"), Some(RequestMethod::Get));
        assert_eq!(callback_verb("ajaxDelete"), Some(RequestMethod::Delete));
        assert_eq!(callback_verb("index"), None);
    }
}
