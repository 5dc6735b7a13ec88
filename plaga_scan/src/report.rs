//! PDF report assembly.
//!
//! The report is an A4 document: a title page followed by one section per
//! scanned image. A section starts on a fresh page with a centred heading, lists
//! one line per detection and ends with the annotated image, 100 mm wide. Text
//! that would cross the bottom margin continues on a new page.

use crate::scanner::ScannedImage;
use lopdf::{
    content::{Content, Operation},
    dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat,
};
use thiserror::Error;

const MM: f32 = 72.0 / 25.4;
const PAGE_WIDTH: f32 = 210.0 * MM;
const PAGE_HEIGHT: f32 = 297.0 * MM;
const MARGIN: f32 = 10.0 * MM;
const BOTTOM_MARGIN: f32 = 15.0 * MM;
const LINE_HEIGHT: f32 = 10.0 * MM;
const IMAGE_WIDTH: f32 = 100.0 * MM;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image for {0:?} is not a JPEG")]
    NotJpeg(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource_name(&self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }

    // Average Helvetica glyph width in em.
    fn average_width(&self) -> f32 {
        match self {
            Font::Regular => 0.5,
            Font::Bold => 0.55,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

struct PageState {
    operations: Vec<Operation>,
    xobjects: Dictionary,
    cursor: f32,
}

impl PageState {
    fn new() -> Self {
        Self {
            operations: Vec::new(),
            xobjects: Dictionary::new(),
            cursor: PAGE_HEIGHT - MARGIN,
        }
    }
}

pub struct ReportBuilder {
    doc: Document,
    pages_id: ObjectId,
    regular_font: ObjectId,
    bold_font: ObjectId,
    info_id: ObjectId,
    pages: Vec<ObjectId>,
    current: Option<PageState>,
    image_count: usize,
}

impl ReportBuilder {
    pub fn new(title: &str) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let bold_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::String(encode_win_ansi(title), StringFormat::Literal),
            "Producer" => Object::string_literal("plaga-scan"),
        });

        Self {
            doc,
            pages_id,
            regular_font,
            bold_font,
            info_id,
            pages: Vec::new(),
            current: None,
            image_count: 0,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len() + usize::from(self.current.is_some())
    }

    pub fn add_page(&mut self) -> Result<(), ReportError> {
        self.finish_page()?;
        self.current = Some(PageState::new());
        Ok(())
    }

    fn finish_page(&mut self) -> Result<(), ReportError> {
        let Some(page) = self.current.take() else {
            return Ok(());
        };

        let content = Content {
            operations: page.operations,
        };
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.encode()?));

        let resources = dictionary! {
            "Font" => dictionary! {
                "F1" => self.regular_font,
                "F2" => self.bold_font,
            },
            "XObject" => page.xobjects,
        };

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "Resources" => resources,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        });
        self.pages.push(page_id);
        Ok(())
    }

    /// Returns the current page, breaking to a new one when `height` points do
    /// not fit above the bottom margin.
    fn reserve(&mut self, height: f32) -> Result<&mut PageState, ReportError> {
        let needs_page = match &self.current {
            None => true,
            Some(page) => page.cursor - height < BOTTOM_MARGIN,
        };
        if needs_page {
            self.add_page()?;
        }
        Ok(self.current.get_or_insert_with(PageState::new))
    }

    /// Writes `text` as one or more lines; text wider than the printable area
    /// wraps at spaces, or mid-word when a single word does not fit.
    pub fn text_line(
        &mut self,
        text: &str,
        font: Font,
        size: f32,
        align: Align,
    ) -> Result<(), ReportError> {
        let encoded = encode_win_ansi(text);
        let char_width = size * font.average_width();
        let max_chars = ((PAGE_WIDTH - 2. * MARGIN) / char_width).floor().max(1.) as usize;

        for line in wrap_encoded(&encoded, max_chars) {
            let x = match align {
                Align::Left => MARGIN,
                Align::Center => {
                    let width = line.len() as f32 * char_width;
                    ((PAGE_WIDTH - width) / 2.).max(MARGIN)
                }
            };

            let page = self.reserve(LINE_HEIGHT)?;
            let baseline = page.cursor - LINE_HEIGHT * 0.65;
            page.operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![font.resource_name().into(), size.into()]),
                Operation::new("Td", vec![x.into(), baseline.into()]),
                Operation::new("Tj", vec![Object::String(line, StringFormat::Literal)]),
                Operation::new("ET", vec![]),
            ]);
            page.cursor -= LINE_HEIGHT;
        }
        Ok(())
    }

    /// Places a JPEG at the left margin, 100 mm wide, aspect preserved. Images
    /// taller than a page are scaled down to fit.
    pub fn jpeg_image(
        &mut self,
        label: &str,
        jpeg: &[u8],
        width_px: u32,
        height_px: u32,
    ) -> Result<(), ReportError> {
        if !jpeg.starts_with(&[0xFF, 0xD8]) || width_px == 0 || height_px == 0 {
            return Err(ReportError::NotJpeg(label.to_string()));
        }

        let max_height = PAGE_HEIGHT - MARGIN - BOTTOM_MARGIN;
        let mut width = IMAGE_WIDTH;
        let mut height = IMAGE_WIDTH * height_px as f32 / width_px as f32;
        if height > max_height {
            width *= max_height / height;
            height = max_height;
        }

        let image_id = self.doc.add_object(
            Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width_px as i64,
                    "Height" => height_px as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                jpeg.to_vec(),
            )
            .with_compression(false),
        );
        self.image_count += 1;
        let name = format!("Im{}", self.image_count);

        let page = self.reserve(height)?;
        let y = page.cursor - height;
        page.xobjects.set(name.clone(), image_id);
        page.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0.into(),
                    0.into(),
                    height.into(),
                    MARGIN.into(),
                    y.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
        page.cursor = y;
        Ok(())
    }

    pub fn finish(mut self) -> Result<Vec<u8>, ReportError> {
        self.finish_page()?;

        let kids: Vec<Object> = self.pages.iter().map(|id| (*id).into()).collect();
        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", self.info_id);

        let mut buf = Vec::new();
        self.doc.save_to(&mut buf)?;
        Ok(buf)
    }
}

/// Builds the full report for a batch: title page, then one section per image.
pub fn render_report(title: &str, images: &[ScannedImage]) -> Result<Vec<u8>, ReportError> {
    let mut builder = ReportBuilder::new(title);
    builder.add_page()?;
    builder.text_line(title, Font::Bold, 16., Align::Center)?;

    for image in images {
        builder.add_page()?;
        builder.text_line(
            &format!("Results for: {}", image.source_name),
            Font::Bold,
            12.,
            Align::Center,
        )?;

        if image.detections.is_empty() {
            builder.text_line("No pests detected", Font::Regular, 12., Align::Left)?;
        }
        for detection in &image.detections {
            builder.text_line(&detection.summary(), Font::Regular, 12., Align::Left)?;
        }

        builder.jpeg_image(
            &image.source_name,
            &image.annotated_jpeg,
            image.width,
            image.height,
        )?;
    }

    tracing::debug!(
        "Rendered report with {} pages for {} images",
        builder.page_count(),
        images.len()
    );
    builder.finish()
}

/// Splits encoded text into lines of at most `max_chars` bytes, preferring
/// to break after the last space that fits.
fn wrap_encoded(text: &[u8], max_chars: usize) -> Vec<Vec<u8>> {
    let mut lines = Vec::new();
    let mut rest = text;
    while rest.len() > max_chars {
        let split = rest[..=max_chars]
            .iter()
            .rposition(|&b| b == b' ')
            .filter(|&i| i > 0)
            .unwrap_or(max_chars);
        lines.push(rest[..split].to_vec());
        rest = &rest[split..];
        while rest.first() == Some(&b' ') {
            rest = &rest[1..];
        }
    }
    if !rest.is_empty() || lines.is_empty() {
        lines.push(rest.to_vec());
    }
    lines
}

/// Maps text to WinAnsi bytes for the standard Type1 fonts. Latin-1 characters
/// map directly; everything else becomes `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}
