//! Template helpers: the `asset()` function and the `slug` filter.

use minijinja::Environment;
use once_cell::sync::Lazy;
use regex::Regex;

static IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.(jpe?g|png|gif|svgz?)$").unwrap());
static STYLESHEET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.((c|sc|le)ss)$").unwrap());
static SCRIPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.(js|coffee)$").unwrap());
static SLUG_STRIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^-/+|\w ]").unwrap());
static SLUG_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[_|+ -]+").unwrap());

/// Public URL of an asset, filed under a directory by type.
///
/// ```rust
/// use brewery_view::asset_url;
///
/// assert_eq!(asset_url("/assets", "logo.png"), "/assets/img/logo.png");
/// assert_eq!(asset_url("/assets", "site.scss"), "/assets/css/site.scss");
/// assert_eq!(asset_url("/assets", "app.js"), "/assets/js/app.js");
/// assert_eq!(asset_url("/assets", "fonts/a.woff"), "/assets/fonts/a.woff");
/// ```
pub fn asset_url(base: &str, name: &str) -> String {
    let base = base.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    let directory = if IMAGE.is_match(name) {
        Some("img")
    } else if STYLESHEET.is_match(name) {
        Some("css")
    } else if SCRIPT.is_match(name) {
        Some("js")
    } else {
        None
    };
    match directory {
        Some(directory) => format!("{base}/{directory}/{name}"),
        None => format!("{base}/{name}"),
    }
}

/// URL-safe slug of `input`, transliterated to ASCII.
///
/// ```rust
/// use brewery_view::slug;
///
/// assert_eq!(slug("Crème Brûlée & Co.", "-"), "creme-brulee-co");
/// assert_eq!(slug("teas / Green tea", "-"), "teas/green-tea");
/// ```
pub fn slug(input: &str, delimiter: &str) -> String {
    let ascii = deunicode::deunicode(input);
    let stripped = SLUG_STRIP.replace_all(&ascii, "");
    let lowered = stripped.to_lowercase();
    let lowered = lowered.trim_matches(|c: char| c == '-' || c.is_whitespace());
    let joined = SLUG_SEPARATORS.replace_all(lowered, delimiter);
    let mut slug = joined.into_owned();
    if !delimiter.is_empty() {
        slug = slug
            .replace(&format!("{delimiter}/"), "/")
            .replace(&format!("/{delimiter}"), "/");
    }
    slug.trim_matches(|c: char| delimiter.contains(c)).to_string()
}

/// Registers `asset()` and `|slug` on `env`.
pub fn register_functions(env: &mut Environment<'_>, assets_url: &str) {
    let base = assets_url.to_string();
    env.add_function("asset", move |name: String| asset_url(&base, &name));
    env.add_filter("slug", |value: String, delimiter: Option<String>| {
        slug(&value, delimiter.as_deref().unwrap_or("-"))
    });
}
