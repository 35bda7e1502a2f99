//! Property-based tests for route resolution using proptest.

use brewery_routing::{
    normalize_path, parse_callback, parse_group, Request, RequestMethod, Resolution, RouteMap,
    Router, RouterConfig,
};
use http::Method;
use proptest::prelude::*;
use serde_json::{json, Map, Value};

// ============================================================================
// Test helpers
// ============================================================================

fn router(table: &str) -> Router {
    Router::new(
        RouterConfig::new("/srv/app"),
        RouteMap::from_json_str(table).unwrap(),
    )
}

fn get(path: &str) -> Request {
    http::Request::builder()
        .method(Method::GET)
        .uri(path)
        .body(String::new())
        .unwrap()
        .into()
}

fn method_strategy() -> impl Strategy<Value = RequestMethod> {
    prop::sample::select(RequestMethod::ALL.to_vec())
}

/// A route group as it appears in a route table. Each route may carry its
/// own constraint; the `component` key is written last.
#[derive(Debug, Clone)]
struct Group {
    component: Option<String>,
    constraints: Vec<String>,
    routes: Vec<Option<String>>,
    children: Vec<(String, Group)>,
}

/// (key, component, constraints) of one flattened route.
type Flattened = (String, Option<String>, Vec<String>);

impl Group {
    fn to_json(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if !self.constraints.is_empty() {
            map.insert("constraints".into(), json!(self.constraints));
        }
        for (i, own) in self.routes.iter().enumerate() {
            let entry = match own {
                Some(constraint) => {
                    json!({ "path": "ThingController::get", "constraints": [constraint] })
                }
                None => json!("ThingController::get"),
            };
            map.insert(format!("r{i}"), entry);
        }
        for (i, (name, child)) in self.children.iter().enumerate() {
            map.insert(format!("{name}_{i}"), Value::Object(child.to_json()));
        }
        if let Some(component) = &self.component {
            map.insert("component".into(), json!(component));
        }
        map
    }

    fn flatten(
        &self,
        prefix: &str,
        component: Option<&str>,
        inherited: &[String],
        out: &mut Vec<Flattened>,
    ) {
        let component = self.component.as_deref().or(component);
        let mut running = inherited.to_vec();
        running.extend(self.constraints.iter().cloned());
        for (i, own) in self.routes.iter().enumerate() {
            running.extend(own.iter().cloned());
            out.push((
                format!("{prefix}/r{i}"),
                component.map(str::to_string),
                running.clone(),
            ));
        }
        for (i, (name, child)) in self.children.iter().enumerate() {
            child.flatten(&format!("{prefix}/{name}_{i}"), component, &running, out);
        }
    }
}

fn group_strategy() -> impl Strategy<Value = Group> {
    let fields = || {
        (
            prop::option::of("[A-Z][a-z]{1,6}Component"),
            prop::collection::vec("[A-Z][a-z]{1,6}", 0..3),
            prop::collection::vec(prop::option::of("[A-Z][a-z]{1,6}"), 0..4),
        )
    };
    let leaf = fields().prop_map(|(component, constraints, routes)| Group {
        component,
        constraints,
        routes,
        children: Vec::new(),
    });
    leaf.prop_recursive(3, 24, 3, move |inner| {
        (
            fields(),
            prop::collection::vec(("[a-z]{1,5}", inner), 0..3),
        )
            .prop_map(|((component, constraints, routes), children)| Group {
                component,
                constraints,
                routes,
                children,
            })
    })
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    /// The first declared pattern that matches wins, even when a later one
    /// would match too.
    #[test]
    fn first_declared_match_wins(id in 0u32..1_000_000, slug in "[a-z]{1,12}") {
        let router = router(r#"{
            "item/:num": "ItemController::getById",
            "item/:alnum": "ItemController::getBySlug"
        }"#);

        let (resolution, route) = router.resolve(&get(&format!("/item/{id}")));
        prop_assert_eq!(resolution, Resolution::Declared);
        prop_assert_eq!(route.callback, "getById");
        prop_assert_eq!(route.parameters, vec![id.to_string()]);

        let (_, route) = router.resolve(&get(&format!("/item/{slug}")));
        prop_assert_eq!(route.callback, "getBySlug");
        prop_assert_eq!(route.parameters, vec![slug]);
    }

    /// A callback string without a method segment routes to `get`.
    #[test]
    fn bare_controller_defaults_to_get(name in "[A-Z][a-z]{0,10}Controller") {
        let route = parse_callback(&name).unwrap();
        prop_assert_eq!(route.callback, "get");
        prop_assert_eq!(route.allowed_request_method, RequestMethod::Get);
        prop_assert_eq!(route.controller, name);
    }

    /// Callback names always start lowercase and keep the verb.
    #[test]
    fn callback_is_lowercase_first(
        method in method_strategy(),
        suffix in "[a-zA-Z0-9]{0,8}",
    ) {
        let spec = format!("ThingController::{}{}", method.as_str().to_uppercase(), suffix);
        let route = parse_callback(&spec).unwrap();
        prop_assert_eq!(route.allowed_request_method, method);
        prop_assert!(route.callback.starts_with(method.as_str()));
    }

    /// Normalizing twice is the same as normalizing once.
    #[test]
    fn normalize_path_is_idempotent(path in "(/{0,3}[a-z0-9]{0,5}){0,5}/{0,3}") {
        let once = normalize_path(&path);
        prop_assert_eq!(normalize_path(&once), once.clone());
        prop_assert!(once == "/" || (!once.starts_with('/') && !once.ends_with('/')));
        prop_assert!(!once.contains("//"));
    }

    /// Every path resolves to some controller.
    #[test]
    fn auto_detect_always_names_a_controller(
        segments in prop::collection::vec("[a-zA-Z0-9._-]{1,8}", 0..5),
    ) {
        let router = router("{}");
        let path = format!("/{}", segments.join("/"));
        let route = router.auto_detect(&get(&path));
        prop_assert!(route.controller.ends_with("Controller"));
        prop_assert!(route.action.ends_with("Action"));
        prop_assert!(route.callback.starts_with("get"));
    }

    /// Flattened keys concatenate the group prefixes, the nearest component
    /// applies wherever it is declared, and constraints accumulate in
    /// declaration order into every later route and nested group.
    #[test]
    fn groups_flatten_with_inherited_scope(prefix in "[a-z]{1,6}", group in group_strategy()) {
        let routes = parse_group(&prefix, &group.to_json()).unwrap();
        let actual: Vec<Flattened> = routes
            .into_iter()
            .map(|(key, route)| (key, route.component, route.constraints))
            .collect();

        let mut expected = Vec::new();
        group.flatten(&prefix, None, &[], &mut expected);
        prop_assert_eq!(actual, expected);
    }
}
