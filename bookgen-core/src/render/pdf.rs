//! Encodes a [`DocumentLayout`] as PDF using printpdf's built-in Times fonts.

use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, Pt, TextItem, TextMatrix,
};
use tracing::debug;

use super::layout::{DocumentLayout, Face, PageGeometry, TextLine};

fn builtin(face: Face) -> BuiltinFont {
    match face {
        Face::Regular => BuiltinFont::TimesRoman,
        Face::Bold => BuiltinFont::TimesBold,
        Face::Italic => BuiltinFont::TimesItalic,
    }
}

fn line_ops(line: &TextLine) -> Vec<Op> {
    let font = builtin(line.face);
    vec![
        Op::StartTextSection,
        Op::SetFontSizeBuiltinFont {
            size: Pt(line.size),
            font,
        },
        Op::SetTextMatrix {
            matrix: TextMatrix::Translate(Pt(line.x), Pt(line.y)),
        },
        Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(line.text.clone())],
            font,
        },
        Op::EndTextSection,
    ]
}

/// Encode every laid-out page and return the PDF bytes.
pub fn encode_pdf(title: &str, geometry: PageGeometry, layout: &DocumentLayout) -> Vec<u8> {
    let mut doc = PdfDocument::new(title);
    for page in &layout.pages {
        let ops: Vec<Op> = page
            .lines
            .iter()
            .filter(|line| !line.text.is_empty())
            .flat_map(line_ops)
            .collect();
        doc.pages.push(PdfPage::new(
            Mm(geometry.width_mm),
            Mm(geometry.height_mm),
            ops,
        ));
    }
    let mut warnings = Vec::new();
    let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
    debug!(
        pages = layout.pages.len(),
        size = bytes.len(),
        warnings = warnings.len(),
        "Encoded PDF"
    );
    bytes
}
