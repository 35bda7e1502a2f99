//! A small tea shop built on Brewery.
//!
//! The bundled `app/` tree holds the route table, views and layouts. This
//! crate registers the resources the route table names:
//!
//! - `HomeController` and `TeaController`, rendered inside the `Pistachio`
//!   blueprint's layout
//! - `TeaAction`, which filters the menu before `TeaController` runs
//! - the `AdminComponent`, guarded by its `Authenticated` constraint

use std::path::Path;

use anyhow::Context as _;
use brewery::{App, Blueprint, Config, Methods, RequestContext, ResourceRegistry};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

/// Configuration file expected at the application root.
pub const CONFIG_FILE: &str = "brewery.yaml";

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Tea {
    pub name: &'static str,
    pub origin: &'static str,
}

pub const MENU: [Tea; 5] = [
    Tea { name: "Sencha", origin: "Japan" },
    Tea { name: "Gyokuro", origin: "Japan" },
    Tea { name: "Longjing", origin: "China" },
    Tea { name: "Assam", origin: "India" },
    Tea { name: "Purple Tea", origin: "Kenya" },
];

#[derive(Debug, Clone, Copy, Serialize)]
struct Order {
    tea: &'static str,
    quantity: u32,
}

const ORDERS: [(u32, Order); 2] = [
    (1, Order { tea: "Sencha", quantity: 2 }),
    (2, Order { tea: "Assam", quantity: 1 }),
];

/// Name of the user the `Authenticated` constraint let through.
struct User(String);

/// Builds the demo application rooted at `root`.
pub fn app(root: &Path) -> anyhow::Result<App> {
    let path = root.join(CONFIG_FILE);
    let mut config = Config::load(&path).with_context(|| format!("loading {}", path.display()))?;
    config.apply_env_overrides()?;

    let app = App::builder()
        .config(config)
        .registry(registry())
        .blueprint(
            Blueprint::new("Pistachio")
                .header("X-Brewery-Version", "1.0")
                .layout("pistachio"),
        )
        .default_blueprint("Pistachio")
        .build()?;
    Ok(app)
}

/// Every action, controller and constraint of the demo.
pub fn registry() -> ResourceRegistry {
    ResourceRegistry::new()
        .controller("HomeController", || {
            Methods::new().on("get", |_, ctx| {
                brewery::render(ctx, json!({ "title": "Brewery", "teas": MENU }))
            })
        })
        .action("TeaAction", || {
            Methods::new().on("getTeaByOrigin", |params, _| {
                let origin = params.first().and_then(Value::as_str).unwrap_or_default();
                let teas: Vec<Tea> = MENU
                    .into_iter()
                    .filter(|tea| tea.origin.eq_ignore_ascii_case(origin))
                    .collect();
                debug!("{} teas from {}", teas.len(), origin);
                Ok(serde_json::to_value(teas)?)
            })
        })
        .controller("TeaController", || {
            Methods::new()
                .on("get", |_, ctx| {
                    brewery::render(ctx, json!({ "title": "Teas", "teas": MENU }))
                })
                .on("getTeaByOrigin", |params, ctx| {
                    // The action's result arrives after the route parameters.
                    brewery::render(
                        ctx,
                        json!({ "title": "Teas", "origin": params[0], "teas": params[1] }),
                    )
                })
        })
        .component("AdminComponent", |admin| {
            admin
                .constraint("Authenticated", || {
                    Methods::new().on("validate", |_, ctx| Ok(authenticate(ctx)))
                })
                .controller("OrdersController", || {
                    Methods::new()
                        .on("get", |_, ctx| {
                            let user = ctx.local::<User>()?.0.clone();
                            let orders: serde_json::Map<String, Value> = ORDERS
                                .iter()
                                .map(|(id, order)| (id.to_string(), json!(order)))
                                .collect();
                            brewery::render(ctx, json!({ "user": user, "orders": orders }))
                        })
                        .on("getOrder", |params, ctx| {
                            let id = params[0].as_str().unwrap_or_default();
                            match ORDERS.iter().find(|(key, _)| key.to_string() == id) {
                                Some((_, order)) => {
                                    brewery::render(ctx, json!({ "id": id, "order": order }))
                                }
                                None => {
                                    ctx.response.set_status(404);
                                    anyhow::bail!("no order #{}", id)
                                }
                            }
                        })
                });
        })
}

/// Accepts `Authorization: Bearer <name>` and records the user.
fn authenticate(ctx: &mut RequestContext) -> bool {
    let user = ctx
        .request
        .headers()
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);

    match user {
        Some(name) => {
            ctx.extensions.insert(User(name));
            true
        }
        None => false,
    }
}
