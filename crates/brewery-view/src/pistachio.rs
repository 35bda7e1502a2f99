//! Pistachio directives.
//!
//! Pistachio is a small `@`-directive syntax layered over MiniJinja:
//!
//! | Pistachio                              | Compiles to                                |
//! |----------------------------------------|--------------------------------------------|
//! | `{{ $user->name }}`                    | `{{ user.name }}`                          |
//! | `{{ $name or 'Guest' }}`               | `{{ (name if name is defined and ...) }}`  |
//! | `@if(cond)` / `@elseif(cond)` / `@else`| `{% if %}` / `{% elif %}` / `{% else %}`   |
//! | `@foreach($items as $item)`            | `{% for item in items %}`                  |
//! | `@foreach($map as $k => $v)`           | `{% for k, v in map\|items %}`              |
//! | `@for($i = 0; $i < $n; $i++)`          | `{% for i in range(0, n) %}`               |
//! | `@while(cond)`                         | bounded `{% for %}` that breaks on `cond`  |
//! | `@endif` / `@endforeach` / `@endfor`   | `{% endif %}` / `{% endfor %}`             |
//! | `@endwhile`                            | `{% endfor %}`                             |
//! | `@render('name')`                      | `{% include 'name' %}`                     |
//! | `@partial('name')`                     | `{% include '_name' %}`                    |
//! | `@yield`                               | includes the view wrapped by a layout      |
//!
//! Expressions drop the `$` sigil, turn `->` into attribute access and map
//! `!`, `&&`, `||` and `===` onto their MiniJinja spelling. Anything else is
//! passed through, so MiniJinja filters and tests work inside Pistachio
//! expressions.
//!
//! MiniJinja has no `while`, so `@while` becomes a `for` over
//! [`WHILE_LIMIT`] iterations that breaks as soon as the condition is false.
//! Inside the body `loop.index0` counts the iterations run so far.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::compiler::Pass;
use crate::error::CompileError;

/// Variable holding the name of the view a layout wraps.
pub const VIEW_FILE_VAR: &str = "__view_file";

/// Upper bound on the iterations of a `@while` loop.
pub const WHILE_LIMIT: usize = 10_000;

static VARIABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{\{\s*(.+?)\s*\}\}").unwrap());
static FALLBACK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^(\$.+?)\s+or\s+(.+)$").unwrap());
static ATTRIBUTE_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_]\w*(?:\.\w+)*$").unwrap());
static OPENER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@(elseif|if|foreach|for|while)\s*\(").unwrap());
static CLOSER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@(endforeach|endfor|endif|endwhile)\b").unwrap());
static ELSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@else\b").unwrap());
static RENDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"@render(?:\s*\(\s*['"]([\w:./-]+)['"]\s*\)|\s+['"]([\w:./-]+)['"])"#).unwrap()
});
static PARTIAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"@partial(?:\s*\(\s*['"]([\w:./-]+)['"]\s*\)|\s+['"]([\w:./-]+)['"])"#).unwrap()
});
static YIELD: Lazy<Regex> = Lazy::new(|| Regex::new(r"@yield\b").unwrap());
static FOREACH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*(.+?)\s+as\s+(?:\$?(\w+)\s*=>\s*)?\$?(\w+)\s*$").unwrap()
});
static FOR_COUNTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)^\s*\$?(\w+)\s*=\s*(.+?)\s*;\s*\$?(\w+)\s*(<=|<)\s*(.+?)\s*;\s*\$?(\w+)\s*(?:\+\+|\+=\s*1)\s*$",
    )
    .unwrap()
});
static FOR_IN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*\$?\w+(?:\s*,\s*\$?\w+)?\s+in\s+.+$").unwrap());

struct Directive {
    name: &'static str,
    rewrite: fn(&str) -> Result<String, CompileError>,
}

impl Pass for Directive {
    fn name(&self) -> &'static str {
        self.name
    }

    fn apply(&self, source: &str) -> Result<String, CompileError> {
        (self.rewrite)(source)
    }
}

/// The Pistachio passes in the order they must run.
pub(crate) fn passes() -> Vec<Box<dyn Pass>> {
    let table: [(&'static str, fn(&str) -> Result<String, CompileError>); 7] = [
        ("variables", variables),
        ("openers", openers),
        ("closers", closers),
        ("else", else_branches),
        ("render", renders),
        ("partial", partials),
        ("yield", yields),
    ];
    table
        .into_iter()
        .map(|(name, rewrite)| Box::new(Directive { name, rewrite }) as Box<dyn Pass>)
        .collect()
}

fn variables(source: &str) -> Result<String, CompileError> {
    Ok(VARIABLE
        .replace_all(source, |caps: &Captures<'_>| {
            format!("{{{{ {} }}}}", interpolate(&caps[1]))
        })
        .into_owned())
}

fn interpolate(expression: &str) -> String {
    match FALLBACK.captures(expression.trim()) {
        Some(caps) => {
            let value = translate_expression(caps[1].trim());
            let fallback = translate_expression(caps[2].trim());
            format!("({value} if {} else {fallback})", defined_guard(&value))
        }
        None => translate_expression(expression.trim()),
    }
}

/// `user.name` is only defined when `user` is, so every prefix of an
/// attribute path is tested before the full value.
fn defined_guard(value: &str) -> String {
    let mut guards = Vec::new();
    if ATTRIBUTE_PATH.is_match(value) {
        let mut end = 0;
        for segment in value.split('.') {
            end += segment.len();
            if end < value.len() {
                guards.push(format!("{} is defined", &value[..end]));
            }
            end += 1;
        }
    }
    guards.push(format!("{value} is defined"));
    guards.push(format!("{value} is not none"));
    guards.join(" and ")
}

fn openers(source: &str) -> Result<String, CompileError> {
    let mut output = String::with_capacity(source.len());
    let mut last = 0;
    let mut from = 0;

    while let Some(caps) = OPENER.captures_at(source, from) {
        let (Some(whole), Some(keyword)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        if preceded_by_word(source, whole.start()) {
            from = whole.end();
            continue;
        }

        let directive = format!("@{}", keyword.as_str());
        let open = whole.end() - 1;
        let close = matching_paren(source, open).ok_or_else(|| {
            CompileError::at(source, whole.start(), directive.clone(), "unbalanced parentheses")
        })?;
        let compiled = opener(keyword.as_str(), &source[open + 1..close])
            .map_err(|message| CompileError::at(source, whole.start(), directive, message))?;

        output.push_str(&source[last..whole.start()]);
        output.push_str(&compiled);
        last = close + 1;
        from = last;
    }

    output.push_str(&source[last..]);
    Ok(output)
}

fn opener(keyword: &str, inner: &str) -> Result<String, &'static str> {
    let inner = inner.trim();
    if inner.is_empty() {
        return Err("empty condition");
    }
    match keyword {
        "if" => Ok(format!("{{% if {} %}}", translate_expression(inner))),
        "elseif" => Ok(format!("{{% elif {} %}}", translate_expression(inner))),
        "foreach" => {
            foreach(inner).ok_or("expected `$items as $item` or `$items as $key => $value`")
        }
        "for" => for_loop(inner).ok_or("expected `$i = start; $i < end; $i++` or `item in items`"),
        "while" => Ok(format!(
            "{{% for _ in range({WHILE_LIMIT}) %}}{{% if not ({}) %}}{{% break %}}{{% endif %}}",
            translate_expression(inner)
        )),
        _ => Err("unknown directive"),
    }
}

fn foreach(inner: &str) -> Option<String> {
    let caps = FOREACH.captures(inner)?;
    let items = translate_expression(caps[1].trim());
    let value = &caps[3];
    Some(match caps.get(2) {
        Some(key) => format!("{{% for {}, {} in {}|items %}}", key.as_str(), value, items),
        None => format!("{{% for {} in {} %}}", value, items),
    })
}

fn for_loop(inner: &str) -> Option<String> {
    if let Some(caps) = FOR_COUNTER.captures(inner) {
        let counter = &caps[1];
        if caps[3] != *counter || caps[6] != *counter {
            return None;
        }
        let start = translate_expression(&caps[2]);
        let end = translate_expression(&caps[5]);
        let end = if &caps[4] == "<=" {
            format!("{end} + 1")
        } else {
            end
        };
        return Some(format!("{{% for {counter} in range({start}, {end}) %}}"));
    }
    if FOR_IN.is_match(inner) {
        return Some(format!("{{% for {} %}}", translate_expression(inner)));
    }
    None
}

fn closers(source: &str) -> Result<String, CompileError> {
    rewrite(source, &CLOSER, false, |caps, _| {
        Ok(match &caps[1] {
            "endif" => "{% endif %}",
            _ => "{% endfor %}",
        }
        .to_string())
    })
}

fn else_branches(source: &str) -> Result<String, CompileError> {
    rewrite(source, &ELSE, true, |_, _| Ok("{% else %}".to_string()))
}

fn renders(source: &str) -> Result<String, CompileError> {
    rewrite(source, &RENDER, false, |caps, _| {
        Ok(format!("{{% include '{}' %}}", included_name(caps)))
    })
}

fn partials(source: &str) -> Result<String, CompileError> {
    rewrite(source, &PARTIAL, false, |caps, _| {
        Ok(format!("{{% include '{}' %}}", partial_name(included_name(caps))))
    })
}

fn yields(source: &str) -> Result<String, CompileError> {
    rewrite(source, &YIELD, true, |_, _| {
        Ok(format!(
            "{{% if {VIEW_FILE_VAR} is defined %}}{{% include {VIEW_FILE_VAR} %}}{{% endif %}}"
        ))
    })
}

fn included_name<'h>(caps: &Captures<'h>) -> &'h str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str())
        .unwrap_or_default()
}

/// Partials live next to views with a leading underscore on the file name:
/// `shared/menu` resolves to `shared/_menu`.
fn partial_name(name: &str) -> String {
    match name.rfind(['/', ':']) {
        Some(at) => format!("{}_{}", &name[..=at], &name[at + 1..]),
        None => format!("_{name}"),
    }
}

/// Replaces every match of `pattern`. With `guard` set, matches directly
/// preceded by a word character (`user@else.org`) are left alone.
fn rewrite(
    source: &str,
    pattern: &Regex,
    guard: bool,
    mut replace: impl FnMut(&Captures<'_>, usize) -> Result<String, CompileError>,
) -> Result<String, CompileError> {
    let mut output = String::with_capacity(source.len());
    let mut last = 0;

    for caps in pattern.captures_iter(source) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if guard && preceded_by_word(source, whole.start()) {
            continue;
        }
        output.push_str(&source[last..whole.start()]);
        output.push_str(&replace(&caps, whole.start())?);
        last = whole.end();
    }

    output.push_str(&source[last..]);
    Ok(output)
}

fn preceded_by_word(source: &str, at: usize) -> bool {
    source[..at]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric() || c == '_')
}

/// Byte index of the `)` closing the `(` at `open`, skipping quoted strings.
fn matching_paren(source: &str, open: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'(' => depth += 1,
                b')' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Rewrites a Pistachio expression into MiniJinja syntax. Quoted strings
/// are copied verbatim.
pub fn translate_expression(expression: &str) -> String {
    let chars: Vec<char> = expression.chars().collect();
    let mut output = String::with_capacity(expression.len());
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            output.push(c);
            if c == '\\' {
                if let Some(&escaped) = chars.get(i + 1) {
                    output.push(escaped);
                    i += 1;
                }
            } else if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        let next = chars.get(i + 1).copied();
        let mut skip_space = false;
        match c {
            '\'' | '"' => {
                quote = Some(c);
                output.push(c);
            }
            '$' if next.is_some_and(|n| n.is_alphabetic() || n == '_') => {}
            '-' if next == Some('>') => {
                output.push('.');
                i += 1;
            }
            '&' if next == Some('&') => {
                push_word(&mut output, "and");
                skip_space = true;
                i += 1;
            }
            '|' if next == Some('|') => {
                push_word(&mut output, "or");
                skip_space = true;
                i += 1;
            }
            '!' if next == Some('=') => {
                output.push_str("!=");
                i += 1;
                if chars.get(i + 1) == Some(&'=') {
                    i += 1;
                }
            }
            '!' => {
                push_word(&mut output, "not");
                skip_space = true;
            }
            '=' if next == Some('=') && chars.get(i + 2) == Some(&'=') => {
                output.push_str("==");
                i += 2;
            }
            _ => output.push(c),
        }
        i += 1;

        if skip_space {
            while chars.get(i).is_some_and(|c| c.is_whitespace()) {
                i += 1;
            }
        }
    }

    output
}

fn push_word(output: &mut String, word: &str) {
    if !output.is_empty() && !output.ends_with(|c: char| c.is_whitespace() || c == '(') {
        output.push(' ');
    }
    output.push_str(word);
    output.push(' ');
}
