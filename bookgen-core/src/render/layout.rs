//! Page layout for a generated book.
//!
//! Layout is computed separately from PDF encoding so page breaks and the
//! table of contents can be checked without parsing PDF output. All
//! coordinates are PDF points with the origin at the bottom-left corner; `y`
//! is the text baseline.

use crate::book::Book;

pub const MM_TO_PT: f32 = 72.0 / 25.4;

/// Font faces used by the book layout (the built-in Times family).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    Regular,
    Bold,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Center,
}

/// Page size and margins in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width_mm: f32,
    pub height_mm: f32,
    pub margin_mm: f32,
}

impl Default for PageGeometry {
    /// A4 portrait with 20 mm margins.
    fn default() -> Self {
        Self {
            width_mm: 210.0,
            height_mm: 297.0,
            margin_mm: 20.0,
        }
    }
}

impl PageGeometry {
    pub fn width_pt(&self) -> f32 {
        self.width_mm * MM_TO_PT
    }

    pub fn height_pt(&self) -> f32 {
        self.height_mm * MM_TO_PT
    }

    pub fn margin_pt(&self) -> f32 {
        self.margin_mm * MM_TO_PT
    }

    pub fn text_width_pt(&self) -> f32 {
        self.width_pt() - 2.0 * self.margin_pt()
    }
}

/// One positioned line of text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub face: Face,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LaidOutPage {
    pub lines: Vec<TextLine>,
}

/// Chapter title and the 1-based page it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub title: String,
    pub page: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentLayout {
    pub pages: Vec<LaidOutPage>,
    pub toc: Vec<TocEntry>,
}

const TITLE_SIZE: f32 = 24.0;
const AUTHOR_SIZE: f32 = 16.0;
const HEADER_SIZE: f32 = 12.0;
const CHAPTER_SIZE: f32 = 14.0;
const BODY_SIZE: f32 = 12.0;
const TOC_HEADING_SIZE: f32 = 16.0;
const FOOTER_SIZE: f32 = 8.0;
const LINE_SPACING: f32 = 1.4;

/// Replace characters the built-in fonts cannot encode with `?`, tabs with
/// spaces, and drop carriage returns.
pub fn sanitize_latin1(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\r' => None,
            '\t' => Some(' '),
            c if c.is_control() => Some('?'),
            c if (c as u32) < 256 => Some(c),
            _ => Some('?'),
        })
        .collect()
}

/// Approximate rendered width of `text`. Times averages about half an em
/// per character; bold runs slightly wider.
pub fn approx_text_width(text: &str, size: f32, face: Face) -> f32 {
    let factor = match face {
        Face::Bold => 0.53,
        Face::Regular | Face::Italic => 0.5,
    };
    text.chars().count() as f32 * size * factor
}

/// Greedy word wrap to `max_width`. Words wider than a line are split.
pub fn wrap_text(text: &str, size: f32, face: Face, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if approx_text_width(&candidate, size, face) <= max_width {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        let mut rest = word.to_string();
        while approx_text_width(&rest, size, face) > max_width {
            let fit = ((max_width / (approx_text_width("m", size, face))).floor() as usize).max(1);
            let split_at = rest
                .char_indices()
                .nth(fit)
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            lines.push(rest[..split_at].to_string());
            rest = rest[split_at..].to_string();
        }
        current = rest;
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Builds pages top to bottom, adding running header and footer to every
/// page after the title page.
struct PageCursor<'a> {
    geometry: PageGeometry,
    book_title: &'a str,
    pages: Vec<LaidOutPage>,
    y: f32,
}

impl<'a> PageCursor<'a> {
    fn new(geometry: PageGeometry, book_title: &'a str) -> Self {
        Self {
            geometry,
            book_title,
            pages: Vec::new(),
            y: 0.0,
        }
    }

    fn page_number(&self) -> usize {
        self.pages.len()
    }

    fn top(&self) -> f32 {
        self.geometry.height_pt() - self.geometry.margin_pt()
    }

    fn bottom(&self) -> f32 {
        self.geometry.margin_pt()
    }

    fn push_line(&mut self, text: String, size: f32, face: Face, align: Align, y: f32) {
        let x = match align {
            Align::Left => self.geometry.margin_pt(),
            Align::Center => {
                let width = approx_text_width(&text, size, face);
                ((self.geometry.width_pt() - width) / 2.0).max(self.geometry.margin_pt())
            }
        };
        if let Some(page) = self.pages.last_mut() {
            page.lines.push(TextLine {
                text,
                x,
                y,
                size,
                face,
            });
        }
    }

    fn bare_page(&mut self) {
        self.pages.push(LaidOutPage::default());
        self.y = self.top();
    }

    fn content_page(&mut self) {
        self.bare_page();
        let number = self.page_number();
        let header_y = self.top() - HEADER_SIZE;
        self.push_line(
            sanitize_latin1(self.book_title),
            HEADER_SIZE,
            Face::Bold,
            Align::Center,
            header_y,
        );
        let footer_y = self.bottom() / 2.0;
        self.push_line(
            format!("Page {number}"),
            FOOTER_SIZE,
            Face::Italic,
            Align::Center,
            footer_y,
        );
        self.y = header_y - HEADER_SIZE * 2.0;
    }

    /// Emit one line, starting a new content page when the current one is full.
    fn flow_line(&mut self, text: String, size: f32, face: Face, align: Align) {
        let advance = size * LINE_SPACING;
        if self.y - advance < self.bottom() {
            self.content_page();
        }
        self.y -= advance;
        let y = self.y;
        self.push_line(text, size, face, align, y);
    }

    fn gap(&mut self, points: f32) {
        self.y -= points;
    }

    fn flow_paragraphs(&mut self, text: &str, size: f32, face: Face) {
        let width = self.geometry.text_width_pt();
        for paragraph in text.split('\n') {
            let wrapped = wrap_text(&sanitize_latin1(paragraph), size, face, width);
            if wrapped.is_empty() {
                self.flow_line(String::new(), size, face, Align::Left);
            }
            for line in wrapped {
                self.flow_line(line, size, face, Align::Left);
            }
        }
    }
}

/// Lay out the title page, one section per chapter and the trailing table of
/// contents.
pub fn layout_book(
    geometry: PageGeometry,
    title: &str,
    author: Option<&str>,
    book: &Book,
) -> DocumentLayout {
    let mut cursor = PageCursor::new(geometry, title);
    let width = geometry.text_width_pt();

    cursor.bare_page();
    cursor.y = geometry.height_pt() * 0.62;
    for line in wrap_text(&sanitize_latin1(title), TITLE_SIZE, Face::Bold, width) {
        cursor.flow_line(line, TITLE_SIZE, Face::Bold, Align::Center);
    }
    if let Some(author) = author.filter(|a| !a.trim().is_empty()) {
        cursor.gap(AUTHOR_SIZE);
        cursor.flow_line(
            sanitize_latin1(author),
            AUTHOR_SIZE,
            Face::Regular,
            Align::Center,
        );
    }

    let mut toc = Vec::with_capacity(book.chapters.len());
    for chapter in &book.chapters {
        cursor.content_page();
        toc.push(TocEntry {
            title: chapter.title.clone(),
            page: cursor.page_number(),
        });
        for line in wrap_text(&sanitize_latin1(&chapter.title), CHAPTER_SIZE, Face::Bold, width) {
            cursor.flow_line(line, CHAPTER_SIZE, Face::Bold, Align::Left);
        }
        cursor.gap(CHAPTER_SIZE / 2.0);
        cursor.flow_paragraphs(&chapter.body(), BODY_SIZE, Face::Regular);
    }

    cursor.content_page();
    cursor.flow_line(
        "Table of Contents".to_string(),
        TOC_HEADING_SIZE,
        Face::Bold,
        Align::Center,
    );
    cursor.gap(TOC_HEADING_SIZE / 2.0);
    for entry in &toc {
        cursor.flow_paragraphs(
            &format!("{} - Page {}", entry.title, entry.page),
            BODY_SIZE,
            Face::Regular,
        );
    }

    DocumentLayout {
        pages: cursor.pages,
        toc,
    }
}
