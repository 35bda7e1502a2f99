//! Compiled template streams.
//!
//! A [`TemplateStream`] reads a template file, runs it through a
//! [`Compiler`] and exposes the compiled text as a seekable byte stream.
//! Seeking is bounds checked: positions outside the compiled text are
//! refused instead of clamped.

use std::fs;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::compiler::Compiler;
use crate::error::RenderError;

/// Name of the stream protocol for templates with `extension`, e.g.
/// `ioHtmlView` for `io` + `html`.
///
/// ```rust
/// use brewery_view::protocol_name;
///
/// assert_eq!(protocol_name("html", Some("io")), "ioHtmlView");
/// assert_eq!(protocol_name("html", None), "htmlView");
/// ```
pub fn protocol_name(extension: &str, prefix: Option<&str>) -> String {
    let extension = extension.trim_start_matches('.').to_lowercase();
    let mut chars = extension.chars();
    let extension = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    match prefix.filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{}{}View", prefix.to_lowercase(), extension),
        None => format!("{}View", extension.to_lowercase()),
    }
}

/// Compiled template contents with a read cursor.
#[derive(Debug, Clone)]
pub struct TemplateStream {
    path: Option<PathBuf>,
    modified: Option<SystemTime>,
    data: String,
    position: u64,
}

impl TemplateStream {
    /// Reads and compiles the template at `path`.
    pub fn open(path: &Path, compiler: &Compiler) -> Result<Self, RenderError> {
        let metadata = fs::metadata(path)?;
        let source = fs::read_to_string(path)?;
        let data = compiler
            .compile(&source)
            .map_err(|error| RenderError::CompileError {
                template: path.display().to_string(),
                error,
            })?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            modified: metadata.modified().ok(),
            data,
            position: 0,
        })
    }

    /// Compiles in-memory source.
    pub fn from_source(source: &str, compiler: &Compiler) -> Result<Self, RenderError> {
        let data = compiler
            .compile(source)
            .map_err(|error| RenderError::CompileError {
                template: "<inline>".to_string(),
                error,
            })?;
        Ok(Self {
            path: None,
            modified: None,
            data,
            position: 0,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Modification time of the source file when it was opened.
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn tell(&self) -> u64 {
        self.position
    }

    pub fn eof(&self) -> bool {
        self.position >= self.len()
    }

    pub fn as_str(&self) -> &str {
        &self.data
    }

    pub fn into_string(self) -> String {
        self.data
    }

    /// Moves the cursor. Returns false and leaves the cursor in place when
    /// the target is out of range:
    ///
    /// - `Start(n)` requires `n < len`
    /// - `Current(n)` requires `n >= 0`
    /// - `End(n)` requires `len + n >= 0`
    pub fn seek_to(&mut self, pos: SeekFrom) -> bool {
        let len = self.len();
        let target = match pos {
            SeekFrom::Start(offset) if offset < len => Some(offset),
            SeekFrom::Current(offset) if offset >= 0 => self.position.checked_add(offset as u64),
            SeekFrom::End(offset) => {
                let target = len as i128 + offset as i128;
                u64::try_from(target).ok()
            }
            _ => None,
        };
        match target {
            Some(target) => {
                self.position = target;
                true
            }
            None => false,
        }
    }
}

impl Read for TemplateStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.eof() {
            return Ok(0);
        }
        let remaining = &self.data.as_bytes()[self.position as usize..];
        let count = remaining.len().min(buf.len());
        buf[..count].copy_from_slice(&remaining[..count]);
        self.position += count as u64;
        Ok(count)
    }
}

impl Seek for TemplateStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if self.seek_to(pos) {
            Ok(self.position)
        } else {
            Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid seek to {pos:?} in stream of {} bytes", self.len()),
            ))
        }
    }
}
