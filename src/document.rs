//! Document assembly: analysis markdown + bitmap → DOCX.
//!
//! Assembly happens in two steps so the structure can be tested without
//! opening a Word file:
//!
//! 1. [`assemble_document`] builds an [`ExportableDocument`]: title, the
//!    "Uploaded Image" section with the bitmap, then the body blocks from
//!    [`crate::report::parse_report`].
//! 2. [`ExportableDocument::to_docx`] lays that structure out with `docx-rs`
//!    and packs it into the bytes of a `.docx` file.
//!
//! Every heading in the body is rendered at one level below the title,
//! whatever number of `#` the model used.

use crate::error::MedScanError;
use crate::pipeline::encode::encode_png;
use crate::prompts::{IMAGE_SECTION_HEADING, REPORT_TITLE};
use crate::report::{parse_report, Block, TextRun};
use docx_rs::{BreakType, Docx, Paragraph, Pic, Run, Style, StyleType};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Filename offered for download.
pub const DOCX_FILENAME: &str = "medical_image_analysis.docx";

/// MIME type of a Word-processing document.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// English Metric Units per inch, the unit of DrawingML extents.
const EMU_PER_INCH: f32 = 914_400.0;

const TITLE_STYLE: &str = "Title";
const HEADING_STYLE: &str = "Heading1";

/// A report ready to be serialised.
#[derive(Debug, Clone)]
pub struct ExportableDocument {
    pub title: String,
    pub image_heading: String,
    pub image: DynamicImage,
    /// Display width of the embedded picture.
    pub image_width_inches: f32,
    pub blocks: Vec<Block>,
}

/// Build the document structure for `report` with `image` at the top.
pub fn assemble_document(
    report: &str,
    image: DynamicImage,
    image_width_inches: f32,
) -> ExportableDocument {
    let blocks = parse_report(report);
    debug!("Parsed report into {} blocks", blocks.len());
    ExportableDocument {
        title: REPORT_TITLE.to_string(),
        image_heading: IMAGE_SECTION_HEADING.to_string(),
        image,
        image_width_inches,
        blocks,
    }
}

impl ExportableDocument {
    /// Picture extent in EMU, height following the bitmap's aspect ratio.
    pub fn image_extent_emu(&self) -> (u32, u32) {
        let width = self.image_width_inches * EMU_PER_INCH;
        let (w, h) = (self.image.width().max(1), self.image.height());
        let height = width * h as f32 / w as f32;
        (width.round() as u32, height.round() as u32)
    }

    /// Lay out and pack the document as `.docx` bytes.
    pub fn to_docx(&self) -> Result<Vec<u8>, MedScanError> {
        let png = encode_png(&self.image)?;
        let (cx, cy) = self.image_extent_emu();

        let mut docx = Docx::new()
            .add_style(
                Style::new(TITLE_STYLE, StyleType::Paragraph)
                    .name("Title")
                    .size(56)
                    .bold(),
            )
            .add_style(
                Style::new(HEADING_STYLE, StyleType::Paragraph)
                    .name("Heading 1")
                    .size(32)
                    .bold()
                    .color("2F5496"),
            )
            .add_paragraph(heading(&self.title, TITLE_STYLE))
            .add_paragraph(heading(&self.image_heading, HEADING_STYLE))
            .add_paragraph(Paragraph::new().add_run(Run::new().add_image(Pic::new(&png).size(cx, cy))));

        for block in &self.blocks {
            docx = docx.add_paragraph(block_paragraph(block));
        }

        let mut buf = Cursor::new(Vec::new());
        docx.build()
            .pack(&mut buf)
            .map_err(|e| MedScanError::Internal(format!("DOCX packaging failed: {e}")))?;
        let bytes = buf.into_inner();
        debug!("Packed DOCX: {} bytes", bytes.len());
        Ok(bytes)
    }
}

fn heading(text: &str, style: &str) -> Paragraph {
    Paragraph::new()
        .add_run(Run::new().add_text(text))
        .style(style)
}

fn block_paragraph(block: &Block) -> Paragraph {
    match block {
        Block::Heading(text) => heading(text, HEADING_STYLE),
        Block::PageBreak => Paragraph::new().add_run(Run::new().add_break(BreakType::Page)),
        Block::Paragraph(runs) => runs
            .iter()
            .fold(Paragraph::new(), |p, run| p.add_run(text_run(run))),
    }
}

fn text_run(run: &TextRun) -> Run {
    let r = Run::new().add_text(&run.text);
    if run.bold {
        r.bold()
    } else {
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn sample_image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(w, h, Luma([90])))
    }

    #[test]
    fn assembled_document_has_fixed_preamble() {
        let doc = assemble_document("# Findings\nClear lungs", sample_image(10, 10), 5.0);
        assert_eq!(doc.title, "Medical Imaging Analysis");
        assert_eq!(doc.image_heading, "Uploaded Image");
        assert_eq!(
            doc.blocks,
            vec![
                Block::Heading("Findings".into()),
                Block::Paragraph(vec![TextRun::plain("Clear lungs")]),
            ]
        );
    }

    #[test]
    fn picture_extent_is_five_inches_wide() {
        let doc = assemble_document("", sample_image(500, 250), 5.0);
        assert_eq!(doc.image_extent_emu(), (4_572_000, 2_286_000));
    }

    #[test]
    fn docx_bytes_are_a_zip_package() {
        let doc = assemble_document(
            "# Title\nSome **bold** text\n---\nAfter break",
            sample_image(20, 12),
            5.0,
        );
        let bytes = doc.to_docx().expect("docx");
        assert!(bytes.len() > 100);
        assert_eq!(&bytes[..2], b"PK");
    }

    fn paragraphs(bytes: &[u8]) -> Vec<Paragraph> {
        let docx = docx_rs::read_docx(bytes).expect("readable docx");
        docx.document
            .children
            .into_iter()
            .filter_map(|c| match c {
                docx_rs::DocumentChild::Paragraph(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    fn style_of(p: &Paragraph) -> Option<&str> {
        p.property.style.as_ref().map(|s| s.val.as_str())
    }

    fn runs(p: &Paragraph) -> Vec<&Run> {
        p.children
            .iter()
            .filter_map(|c| match c {
                docx_rs::ParagraphChild::Run(r) => Some(r.as_ref()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn packed_docx_reads_back_with_styles_breaks_and_picture() {
        use docx_rs::{Break, DrawingData, RunChild};

        let doc = assemble_document(
            "# Title\nSome **bold** text\n---\nAfter break",
            sample_image(20, 10),
            5.0,
        );
        let paras = paragraphs(&doc.to_docx().unwrap());
        assert_eq!(paras.len(), 7);

        assert_eq!(style_of(&paras[0]), Some("Title"));
        assert_eq!(paras[0].raw_text().trim(), "Medical Imaging Analysis");
        assert_eq!(style_of(&paras[1]), Some("Heading1"));
        assert_eq!(paras[1].raw_text().trim(), "Uploaded Image");

        let sizes: Vec<(u32, u32)> = runs(&paras[2])
            .iter()
            .flat_map(|r| r.children.iter())
            .filter_map(|c| match c {
                RunChild::Drawing(d) => match &d.data {
                    Some(DrawingData::Pic(pic)) => Some(pic.size),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(sizes, vec![(4_572_000, 2_286_000)]);

        assert_eq!(style_of(&paras[3]), Some("Heading1"));
        assert_eq!(paras[3].raw_text().trim(), "Title");

        let body = runs(&paras[4]);
        assert_eq!(body.len(), 3);
        let text = |r: &Run| {
            r.children
                .iter()
                .filter_map(|c| match c {
                    RunChild::Text(t) => Some(t.text.trim().to_string()),
                    _ => None,
                })
                .collect::<String>()
        };
        let bold: Vec<(String, bool)> = body
            .iter()
            .map(|r| (text(r), r.run_property.bold.is_some()))
            .collect();
        assert_eq!(
            bold,
            vec![
                ("Some".to_string(), false),
                ("bold".to_string(), true),
                ("text".to_string(), false),
            ]
        );

        let page_break = RunChild::Break(Break::new(BreakType::Page));
        assert!(runs(&paras[5])
            .iter()
            .any(|r| r.children.contains(&page_break)));
        assert_eq!(style_of(&paras[6]), None);
        assert_eq!(paras[6].raw_text().trim(), "After break");
    }

    #[test]
    fn malformed_markdown_still_packs() {
        let doc = assemble_document("**\n__x\n#\n---\n\n** **", sample_image(3, 3), 5.0);
        assert!(doc.to_docx().is_ok());
    }
}
