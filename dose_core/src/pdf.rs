//! # PDF Export Backend
//!
//! Translates the composer's drawing commands into a Typst document and
//! compiles it to PDF bytes.
//!
//! ## Architecture
//!
//! - The composer owns layout: section order, toggles and pagination arrive
//!   here as an already-ordered command stream
//! - Each command maps to one Typst element (styled paragraph, rule line,
//!   page break)
//! - Output is raw PDF bytes (`Vec<u8>`)
//!
//! ## Example
//!
//! ```rust,no_run
//! use dose_core::capability::DocumentExporter;
//! use dose_core::pdf::TypstExporter;
//! use dose_core::report::{DrawCommand, TextStyle};
//!
//! let commands = vec![
//!     DrawCommand::Text { body: "181.8 mg".to_string(), style: TextStyle::Title },
//!     DrawCommand::Rule,
//! ];
//! let pdf_bytes = TypstExporter::new().render(&commands).unwrap();
//! std::fs::write("report.pdf", pdf_bytes).unwrap();
//! ```

use chrono::Utc;
use typst::diag::{FileError, FileResult};
use typst::foundations::{Bytes, Datetime};
use typst::syntax::{FileId, Source};
use typst::text::{Font, FontBook};
use typst::utils::LazyHash;
use typst::{Library, LibraryExt, World};
use typst_pdf::PdfOptions;

use crate::capability::DocumentExporter;
use crate::errors::{DoseError, DoseResult};
use crate::report::{DrawCommand, TextStyle};

// ============================================================================
// Typst World Implementation
// ============================================================================

/// A minimal Typst world for compiling documents without external files.
struct PdfWorld {
    /// The main source document
    main: Source,
    /// Font book
    book: LazyHash<FontBook>,
    /// Available fonts
    fonts: Vec<Font>,
    /// Library (standard functions)
    library: LazyHash<Library>,
}

impl PdfWorld {
    fn new(source: String) -> Self {
        let fonts = Self::load_fonts();
        let book = FontBook::from_fonts(&fonts);

        PdfWorld {
            main: Source::detached(source),
            book: LazyHash::new(book),
            fonts,
            library: LazyHash::new(Library::default()),
        }
    }

    fn load_fonts() -> Vec<Font> {
        let mut fonts = Vec::new();

        // Bundled fonts from typst-assets
        for font_bytes in typst_assets::fonts() {
            let buffer = Bytes::new(font_bytes.to_vec());
            for font in Font::iter(buffer) {
                fonts.push(font);
            }
        }

        fonts
    }
}

impl World for PdfWorld {
    fn library(&self) -> &LazyHash<Library> {
        &self.library
    }

    fn book(&self) -> &LazyHash<FontBook> {
        &self.book
    }

    fn main(&self) -> FileId {
        self.main.id()
    }

    fn source(&self, id: FileId) -> FileResult<Source> {
        if id == self.main.id() {
            Ok(self.main.clone())
        } else {
            Err(FileError::NotFound(id.vpath().as_rootless_path().into()))
        }
    }

    fn file(&self, id: FileId) -> FileResult<Bytes> {
        Err(FileError::NotFound(id.vpath().as_rootless_path().into()))
    }

    fn font(&self, index: usize) -> Option<Font> {
        self.fonts.get(index).cloned()
    }

    fn today(&self, _offset: Option<i64>) -> Option<Datetime> {
        let now = Utc::now();
        Datetime::from_ymd(
            now.format("%Y").to_string().parse().ok()?,
            now.format("%m").to_string().parse().ok()?,
            now.format("%d").to_string().parse().ok()?,
        )
    }
}

// ============================================================================
// Command Translation
// ============================================================================

const PAGE_SETUP: &str = r##"#set page(
  paper: "us-letter",
  margin: (top: 1in, bottom: 1in, left: 1in, right: 1in),
)
#set text(size: 11pt)
#set par(spacing: 3pt)
"##;

fn style_prefix(style: TextStyle) -> &'static str {
    match style {
        TextStyle::Title => "#text(size: 18pt, weight: \"bold\")",
        TextStyle::Heading => "#text(size: 14pt, weight: \"bold\")",
        TextStyle::Body => "#text(size: 11pt)",
        TextStyle::Small => "#text(size: 9pt, fill: gray)",
    }
}

/// Build the Typst source for a command stream.
fn typst_source(commands: &[DrawCommand]) -> String {
    let mut source = String::from(PAGE_SETUP);
    for command in commands {
        match command {
            DrawCommand::Text { body, style } => {
                if body.trim().is_empty() {
                    source.push_str("#v(6pt)\n");
                } else {
                    source.push_str(&format!(
                        "#block[{}[{}]]\n",
                        style_prefix(*style),
                        escape_typst(body)
                    ));
                }
            }
            DrawCommand::Rule => {
                source.push_str("#v(4pt)\n#line(length: 100%, stroke: 0.5pt)\n");
            }
            DrawCommand::PageBreak => {
                source.push_str("#pagebreak()\n");
            }
        }
    }
    source
}

/// Escape special Typst characters in user-provided text
fn escape_typst(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '*' => "\\*".to_string(),
            '_' => "\\_".to_string(),
            '#' => "\\#".to_string(),
            '$' => "\\$".to_string(),
            '@' => "\\@".to_string(),
            '<' => "\\<".to_string(),
            '>' => "\\>".to_string(),
            '\\' => "\\\\".to_string(),
            '`' => "\\`".to_string(),
            '[' => "\\[".to_string(),
            ']' => "\\]".to_string(),
            _ => c.to_string(),
        })
        .collect()
}

// ============================================================================
// Exporter
// ============================================================================

/// Typst-backed implementation of the document-export capability.
#[derive(Debug, Default)]
pub struct TypstExporter;

impl TypstExporter {
    pub fn new() -> Self {
        TypstExporter
    }
}

impl DocumentExporter for TypstExporter {
    fn render(&self, commands: &[DrawCommand]) -> DoseResult<Vec<u8>> {
        let world = PdfWorld::new(typst_source(commands));

        let warned = typst::compile(&world);

        let document = warned.output.map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.message.to_string()).collect();
            DoseError::export(
                "pdf",
                format!("Typst compilation failed: {}", error_msgs.join("; ")),
            )
        })?;

        let pdf_bytes = typst_pdf::pdf(&document, &PdfOptions::default()).map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.message.to_string()).collect();
            DoseError::export(
                "pdf",
                format!("PDF rendering failed: {}", error_msgs.join("; ")),
            )
        })?;

        Ok(pdf_bytes)
    }
}
