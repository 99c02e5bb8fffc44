use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Rgb,
};

use crate::error::BulletinError;
use crate::models::{BulletinPage, PromotionStatus, SchoolIdentity, Term};

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;

const MARGIN_LEFT: f32 = 20.0;
const MARGIN_RIGHT: f32 = 190.0;
const ROW_HEIGHT: f32 = 7.0;
const TABLE_TOP: f32 = 85.0;
const BOTTOM_MARGIN: f32 = 15.0;
const COLUMN_X: [f32; 5] = [20.0, 85.0, 110.0, 140.0, 170.0];
const PT_TO_MM: f32 = 0.3528;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ink {
    Black,
    Green,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub bold: bool,
    pub ink: Ink,
}

impl TextStyle {
    pub const fn regular(size: f32) -> Self {
        Self {
            size,
            bold: false,
            ink: Ink::Black,
        }
    }

    pub const fn bold(size: f32) -> Self {
        Self {
            size,
            bold: true,
            ink: Ink::Black,
        }
    }

    pub const fn with_ink(self, ink: Ink) -> Self {
        Self { ink, ..self }
    }
}

/// Drawing surface for bulletin pages. Coordinates are millimetres measured
/// from the top-left corner. A canvas starts with one open page.
pub trait BulletinCanvas {
    fn begin_page(&mut self) -> Result<(), BulletinError>;
    fn text(&mut self, text: &str, x: f32, y: f32, style: TextStyle) -> Result<(), BulletinError>;
    fn rule(&mut self, x1: f32, x2: f32, y: f32) -> Result<(), BulletinError>;
}

/// Rough Helvetica advance, good enough to centre short headings.
fn approx_text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.5 * PT_TO_MM
}

fn centered<C: BulletinCanvas + ?Sized>(
    canvas: &mut C,
    text: &str,
    y: f32,
    style: TextStyle,
) -> Result<(), BulletinError> {
    let x = ((PAGE_WIDTH_MM - approx_text_width(text, style.size)) / 2.0).max(0.0);
    canvas.text(text, x, y, style)
}

/// Baseline of the last line drawn for a page with `rows` subject rows.
fn content_bottom(rows: usize, term: Term) -> f32 {
    let summary_line = TABLE_TOP + rows as f32 * ROW_HEIGHT + 16.0;
    match term {
        Term::First => summary_line,
        Term::Second => summary_line + 16.0,
    }
}

pub fn render_page<C: BulletinCanvas + ?Sized>(
    canvas: &mut C,
    school: &SchoolIdentity,
    page: &BulletinPage,
    term: Term,
    is_first_page: bool,
) -> Result<(), BulletinError> {
    let bottom = content_bottom(page.results.len(), term);
    if bottom > PAGE_HEIGHT_MM - BOTTOM_MARGIN {
        return Err(BulletinError::Render(format!(
            "{} subjects for `{}` do not fit on one page",
            page.results.len(),
            page.student.registration_id
        )));
    }

    if !is_first_page {
        canvas.begin_page()?;
    }

    centered(canvas, &school.name, 20.0, TextStyle::bold(16.0))?;
    centered(canvas, "BULLETIN DE NOTES", 30.0, TextStyle::bold(14.0))?;
    centered(canvas, term.label(), 38.0, TextStyle::regular(12.0))?;

    let info = TextStyle::regular(11.0);
    let student = &page.student;
    canvas.text(&format!("Nom : {}", student.full_name), MARGIN_LEFT, 50.0, info)?;
    canvas.text(&format!("Classe : {}", student.class_name), MARGIN_LEFT, 56.0, info)?;
    canvas.text(
        &format!("Matricule : {}", student.registration_id),
        MARGIN_LEFT,
        62.0,
        info,
    )?;

    let header = TextStyle::bold(10.0);
    let headings = ["Matière", "Coef.", "Moy. classe", "Moy. examen", "Moy. matière"];
    for (heading, x) in headings.iter().zip(COLUMN_X) {
        canvas.text(heading, x, 76.0, header)?;
    }
    canvas.rule(MARGIN_LEFT, MARGIN_RIGHT, 78.5)?;

    let cell = TextStyle::regular(10.0);
    let mut y = TABLE_TOP;
    for result in &page.results {
        let cells = [
            result.subject_name.clone(),
            result.coefficient.to_string(),
            format!("{:.2}", result.class_average),
            format!("{:.2}", result.exam_average),
            format!("{:.2}", result.subject_average),
        ];
        for (value, x) in cells.iter().zip(COLUMN_X) {
            canvas.text(value, x, y, cell)?;
        }
        y += ROW_HEIGHT;
    }

    canvas.rule(MARGIN_LEFT, MARGIN_RIGHT, y - ROW_HEIGHT + 2.5)?;
    let summary = &page.summary;
    canvas.text("TOTAL", COLUMN_X[0], y + 2.0, header)?;
    canvas.text(&summary.total_coefficients.to_string(), COLUMN_X[1], y + 2.0, header)?;
    canvas.text(&format!("{:.2}", summary.overall_average), COLUMN_X[4], y + 2.0, header)?;

    y += 16.0;
    canvas.text(
        &format!("Moyenne générale : {:.2} / 20", summary.overall_average),
        MARGIN_LEFT,
        y,
        TextStyle::bold(12.0),
    )?;

    if let (Term::Second, Some(annual)) = (term, summary.annual) {
        y += 8.0;
        canvas.text(
            &format!("Moyenne annuelle : {:.2} / 20", annual.annual_average),
            MARGIN_LEFT,
            y,
            TextStyle::bold(12.0),
        )?;
        y += 8.0;
        let ink = match annual.status {
            PromotionStatus::Admitted => Ink::Green,
            PromotionStatus::MustRepeat => Ink::Red,
        };
        canvas.text(
            &format!("Décision : {}", annual.status.label()),
            MARGIN_LEFT,
            y,
            TextStyle::bold(12.0).with_ink(ink),
        )?;
    }

    Ok(())
}

/// One page per student, in the order given. Any failure aborts the batch.
pub fn render_bulletins<C: BulletinCanvas + ?Sized>(
    canvas: &mut C,
    school: &SchoolIdentity,
    pages: &[BulletinPage],
    term: Term,
) -> Result<(), BulletinError> {
    if pages.is_empty() {
        return Err(BulletinError::MissingInput(
            "no students selected for the bulletin".to_string(),
        ));
    }

    for (index, page) in pages.iter().enumerate() {
        render_page(canvas, school, page, term, index == 0)?;
    }

    Ok(())
}

fn render_error<E: std::fmt::Debug>(err: E) -> BulletinError {
    BulletinError::Render(format!("{err:?}"))
}

pub struct PdfCanvas {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

impl PdfCanvas {
    pub fn new(title: &str) -> Result<Self, BulletinError> {
        let (doc, page, layer) = PdfDocument::new(
            title,
            Mm(PAGE_WIDTH_MM),
            Mm(PAGE_HEIGHT_MM),
            "bulletin",
        );
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(render_error)?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(render_error)?;
        let layer = doc.get_page(page).get_layer(layer);

        Ok(Self {
            doc,
            layer,
            regular,
            bold,
        })
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, BulletinError> {
        self.doc.save_to_bytes().map_err(render_error)
    }
}

fn ink_color(ink: Ink) -> Color {
    let (r, g, b) = match ink {
        Ink::Black => (0.0, 0.0, 0.0),
        Ink::Green => (0.0, 0.5, 0.0),
        Ink::Red => (0.8, 0.0, 0.0),
    };
    Color::Rgb(Rgb::new(r, g, b, None))
}

impl BulletinCanvas for PdfCanvas {
    fn begin_page(&mut self) -> Result<(), BulletinError> {
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "bulletin");
        self.layer = self.doc.get_page(page).get_layer(layer);
        Ok(())
    }

    fn text(&mut self, text: &str, x: f32, y: f32, style: TextStyle) -> Result<(), BulletinError> {
        let font = if style.bold { &self.bold } else { &self.regular };
        self.layer.set_fill_color(ink_color(style.ink));
        self.layer
            .use_text(text, style.size, Mm(x), Mm(PAGE_HEIGHT_MM - y), font);
        Ok(())
    }

    fn rule(&mut self, x1: f32, x2: f32, y: f32) -> Result<(), BulletinError> {
        let y = Mm(PAGE_HEIGHT_MM - y);
        self.layer.set_outline_color(ink_color(Ink::Black));
        self.layer.set_outline_thickness(0.8);
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(x1), y), false),
                (Point::new(Mm(x2), y), false),
            ],
            is_closed: false,
        });
        Ok(())
    }
}
