//! # Brewery View - Pistachio Templates, Views and Layouts
//!
//! `brewery-view` compiles Pistachio templates into MiniJinja and renders
//! them through views that know where templates live, which layout wraps
//! them and which response headers go with them.
//!
//! ## Core Concepts
//!
//! - [`Compiler`]: ordered [`Pass`]es that rewrite template source
//! - [`Adapter`]: template flavour, Pistachio (`*.io.html`) or plain (`*.html`)
//! - [`View`]: renders named templates with accumulated variables
//! - [`Blueprint`]: response headers plus an optional layout
//! - [`CompileCache`]: compiles each template file once per modification
//!
//! ## Quick Start
//!
//! ```rust
//! use brewery_view::Compiler;
//!
//! let compiled = Compiler::pistachio()
//!     .compile("@if($user)Hello {{ $user->name }}@endif")
//!     .unwrap();
//! assert_eq!(compiled, "{% if user %}Hello {{ user.name }}{% endif %}");
//! ```
//!
//! ## Layouts
//!
//! A blueprint's layout wraps the first view rendered after the blueprint
//! is applied. The layout marks where the view goes with `@yield`:
//!
//! ```text
//! layouts/pistachio.io.html:  <body>@yield</body>
//! views/account/get.io.html:  Hello {{ $name }}
//! ```
//!
//! ```rust,ignore
//! let mut view = View::new(ViewConfig::new("app/views/account", "app/layouts"));
//! view.set_blueprint(Blueprint::new("Pistachio").layout("pistachio"));
//! assert_eq!(view.render("get", json!({ "name": "Ada" }))?, "<body>Hello Ada</body>");
//! ```
//!
//! ## Template Helpers
//!
//! Every view registers `asset('logo.png')`, which files the asset under
//! `img/`, `css/` or `js/` of the configured assets URL, and the `slug`
//! filter (`{{ title|slug }}`).

mod cache;
mod compiler;
mod error;
mod functions;
mod loader;
mod pistachio;
mod stream;
mod view;

pub use cache::CompileCache;
pub use compiler::{Adapter, Compiler, Pass};
pub use error::{CompileError, RenderError};
pub use functions::{asset_url, register_functions, slug};
pub use loader::{TemplateLoader, LAYOUT_NAMESPACE};
pub use pistachio::{translate_expression, VIEW_FILE_VAR, WHILE_LIMIT};
pub use stream::{protocol_name, TemplateStream};
pub use view::{Blueprint, LayoutState, View, ViewConfig};
