//! "CV Summary" report: [`StructuredRecord`] → PDF.
//!
//! Layout and drawing are separate. [`layout_report`] turns a record into
//! styled, pre-wrapped lines and [`paginate`] splits them into pages; both
//! are pure and tested without pdfium. [`PdfiumReportRenderer`] only places
//! the resulting lines on A4 pages in the standard Times fonts.
//!
//! ```text
//!                 CV Summary                 ← header, every page
//! Personal Information                       ← section
//! Name: jane doe                             ← text
//! Work Experience
//! data analyst | acme                        ← subtitle
//! Location: jakarta
//! Duration: Jan 2020 - present
//! Job Summary:
//!   - built dashboards                       ← bullet
//!                     1                      ← footer
//! ```

use crate::error::ResumeError;
use crate::pipeline::render::bind_pdfium;
use crate::schema::StructuredRecord;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Report heading printed at the top of every page.
pub const REPORT_TITLE: &str = "CV Summary";

// A4 in PDF points.
const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;
const HEADER_HEIGHT: f32 = 30.0;
const FOOTER_HEIGHT: f32 = 30.0;

/// Vertical space available for body lines on one page.
pub const PAGE_CAPACITY: f32 = PAGE_HEIGHT - 2.0 * MARGIN - HEADER_HEIGHT - FOOTER_HEIGHT;

/// Wrap widths in characters for 11pt Times across the text column.
const TEXT_WRAP: usize = 95;
const BULLET_WRAP: usize = 88;

/// Visual role of a report line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Section,
    Subtitle,
    Text,
    Bullet,
    /// Vertical spacing only.
    Gap,
}

impl LineStyle {
    pub fn font_size(&self) -> f32 {
        match self {
            LineStyle::Section => 13.0,
            LineStyle::Subtitle => 11.5,
            LineStyle::Text | LineStyle::Bullet => 11.0,
            LineStyle::Gap => 0.0,
        }
    }

    /// Line advance in points.
    pub fn height(&self) -> f32 {
        match self {
            LineStyle::Section => 20.0,
            LineStyle::Subtitle => 16.0,
            LineStyle::Text | LineStyle::Bullet => 14.0,
            LineStyle::Gap => 8.0,
        }
    }

    fn bold(&self) -> bool {
        matches!(self, LineStyle::Section | LineStyle::Subtitle)
    }

    fn indent(&self) -> f32 {
        match self {
            LineStyle::Bullet => 12.0,
            _ => 0.0,
        }
    }
}

/// One physical line of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub style: LineStyle,
    pub text: String,
}

struct Layout {
    lines: Vec<ReportLine>,
}

impl Layout {
    fn push(&mut self, style: LineStyle, text: impl Into<String>) {
        self.lines.push(ReportLine {
            style,
            text: text.into(),
        });
    }

    fn section(&mut self, title: &str) {
        self.push(LineStyle::Section, title);
    }

    fn subtitle(&mut self, text: String) {
        self.push(LineStyle::Subtitle, text);
    }

    fn text(&mut self, text: &str) {
        for line in wrap(text, TEXT_WRAP) {
            self.push(LineStyle::Text, line);
        }
    }

    fn bullet(&mut self, text: &str) {
        for (i, line) in wrap(text, BULLET_WRAP).into_iter().enumerate() {
            let marker = if i == 0 { "- " } else { "  " };
            self.push(LineStyle::Bullet, format!("{marker}{line}"));
        }
    }

    fn gap(&mut self) {
        self.push(LineStyle::Gap, "");
    }
}

/// Lay out the report body for `record`.
pub fn layout_report(record: &StructuredRecord) -> Vec<ReportLine> {
    let mut l = Layout { lines: Vec::new() };
    let info = &record.basic_info;

    l.section("Personal Information");
    l.text(&format!("Name: {}", info.name));
    l.text(&format!("Email: {}", info.email));
    l.text(&format!("Phone Number: {}", info.phone_number));
    l.text(&format!("Location: {}", info.location));
    l.gap();

    l.section("Work Experience");
    for work in &record.work_experience {
        l.subtitle(format!("{} | {}", work.job_title, work.company));
        l.text(&format!("Location: {}", work.location));
        l.text(&format!("Duration: {} - {}", work.start_date, work.end_date));
        l.text("Job Summary:");
        for desc in &work.job_desc {
            l.bullet(desc);
        }
        l.gap();
    }
    l.gap();

    l.section("Education");
    for edu in &record.education {
        l.subtitle(format!("{} | {}", edu.title, edu.institute));
        l.text(&format!("Location: {}", edu.location));
        l.text(&format!("Duration: {} - {}", edu.start_date, edu.end_date));
        l.text(&format!("Description: {}", edu.description));
    }
    l.gap();

    l.section("Languages");
    l.text(&record.languages.join(", "));
    l.gap();

    l.section("Skills");
    l.text(&record.skills.join(", "));
    l.gap();

    l.section("Certifications");
    for cert in &record.certification {
        l.subtitle(format!("{} | {}", cert.title, cert.issuer));
        l.text(&format!(
            "Issued date: {} - {}",
            cert.start_date, cert.expiration_date
        ));
    }

    l.lines
}

/// Greedy word wrap. Words longer than `width` are hard-split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.push(word.drain(..width).collect());
        }
        let word: String = word.into_iter().collect();
        if word.is_empty() {
            continue;
        }

        let needed = current.chars().count() + usize::from(!current.is_empty()) + word.chars().count();
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Split lines into pages of at most `capacity` points. Gaps that would open
/// a page are dropped, and a section or subtitle never ends a page.
pub fn paginate(lines: &[ReportLine], capacity: f32) -> Vec<Vec<ReportLine>> {
    let mut pages: Vec<Vec<ReportLine>> = Vec::new();
    let mut current: Vec<ReportLine> = Vec::new();
    let mut used = 0.0;

    for line in lines {
        let h = line.style.height();
        if used + h > capacity && !current.is_empty() {
            // Carry dangling headings over to the next page.
            let mut carried = Vec::new();
            while matches!(
                current.last().map(|l| l.style),
                Some(LineStyle::Section | LineStyle::Subtitle)
            ) && current.len() > 1
            {
                if let Some(last) = current.pop() {
                    carried.push(last);
                }
            }
            carried.reverse();
            pages.push(std::mem::take(&mut current));
            used = carried.iter().map(|l| l.style.height()).sum();
            current = carried;
        }
        if line.style == LineStyle::Gap && current.is_empty() {
            continue;
        }
        used += h;
        current.push(line.clone());
    }

    if !current.is_empty() || pages.is_empty() {
        pages.push(current);
    }
    pages
}

/// Renders a record into a report file.
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(&self, record: &StructuredRecord, path: &Path) -> Result<(), ResumeError>;
}

/// [`ReportRenderer`] drawing with pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumReportRenderer {
    library_dir: Option<PathBuf>,
}

impl PdfiumReportRenderer {
    pub fn new(library_dir: Option<PathBuf>) -> Self {
        Self { library_dir }
    }
}

#[async_trait]
impl ReportRenderer for PdfiumReportRenderer {
    async fn render(&self, record: &StructuredRecord, path: &Path) -> Result<(), ResumeError> {
        let pages = paginate(&layout_report(record), PAGE_CAPACITY);
        let path = path.to_path_buf();
        let library_dir = self.library_dir.clone();

        tokio::task::spawn_blocking(move || {
            draw_report_blocking(&pages, &path, library_dir.as_deref())
        })
        .await
        .map_err(|e| ResumeError::Internal(format!("Report task panicked: {}", e)))?
    }
}

fn draw_report_blocking(
    pages: &[Vec<ReportLine>],
    path: &Path,
    library_dir: Option<&Path>,
) -> Result<(), ResumeError> {
    let failed = |what: &str, e: PdfiumError| ResumeError::Render {
        detail: format!("{what}: {:?}", e),
    };

    let pdfium = bind_pdfium(library_dir)?;
    let mut document = pdfium
        .create_new_pdf()
        .map_err(|e| failed("cannot create document", e))?;
    let regular = document.fonts_mut().times_roman();
    let bold = document.fonts_mut().times_bold();

    let total = pages.len();
    for (page_no, lines) in pages.iter().enumerate() {
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .map_err(|e| failed("cannot add page", e))?;
        let objects = page.objects_mut();

        let mut put = |text: &str, x: f32, y: f32, size: f32, is_bold: bool| {
            let font = if is_bold { bold } else { regular };
            objects
                .create_text_object(PdfPoints::new(x), PdfPoints::new(y), text, font, PdfPoints::new(size))
                .map(|_| ())
                .map_err(|e| failed("cannot place text", e))
        };

        put(REPORT_TITLE, centred_x(REPORT_TITLE, 16.0), PAGE_HEIGHT - MARGIN, 16.0, true)?;

        let mut y = PAGE_HEIGHT - MARGIN - HEADER_HEIGHT;
        for line in lines {
            y -= line.style.height();
            if line.style != LineStyle::Gap && !line.text.is_empty() {
                put(
                    &line.text,
                    MARGIN + line.style.indent(),
                    y,
                    line.style.font_size(),
                    line.style.bold(),
                )?;
            }
        }

        let footer = (page_no + 1).to_string();
        put(&footer, centred_x(&footer, 9.0), MARGIN, 9.0, false)?;
        debug!("Report page {}/{}: {} lines", page_no + 1, total, lines.len());
    }

    document
        .save_to_file(path)
        .map_err(|e| failed("cannot save report", e))?;
    info!("Report written to {} ({} pages)", path.display(), total);
    Ok(())
}

/// Approximate left edge that centres `text` on the page.
fn centred_x(text: &str, size: f32) -> f32 {
    let width = text.chars().count() as f32 * size * 0.5;
    ((PAGE_WIDTH - width) / 2.0).max(MARGIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BasicInfo, Certification, Education, WorkExperience};

    fn record() -> StructuredRecord {
        StructuredRecord {
            basic_info: BasicInfo {
                name: "jane doe".into(),
                email: "jane@gmail.com".into(),
                phone_number: "081234567890".into(),
                location: "Unknown".into(),
            },
            work_experience: vec![WorkExperience {
                job_title: "data analyst".into(),
                company: "acme".into(),
                location: "jakarta".into(),
                start_date: "Jan 2020".into(),
                end_date: "present".into(),
                job_desc: vec!["built dashboards".into(), "cleaned data".into()],
            }],
            education: vec![Education {
                title: "s1 statistics".into(),
                institute: "universitas indonesia".into(),
                location: "depok".into(),
                start_date: "Aug 2015".into(),
                end_date: "Jul 2019".into(),
                description: "Unknown".into(),
            }],
            languages: vec!["english".into(), "indonesian".into()],
            skills: vec!["python".into(), "sql".into()],
            certification: vec![Certification {
                title: "tensorflow developer".into(),
                issuer: "google".into(),
                start_date: "Mar 2021".into(),
                expiration_date: "Mar 2024".into(),
            }],
        }
    }

    fn texts(lines: &[ReportLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn layout_has_every_section_in_order() {
        let lines = layout_report(&record());
        let sections: Vec<&str> = lines
            .iter()
            .filter(|l| l.style == LineStyle::Section)
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(
            sections,
            vec![
                "Personal Information",
                "Work Experience",
                "Education",
                "Languages",
                "Skills",
                "Certifications"
            ]
        );
    }

    #[test]
    fn layout_formats_entries() {
        let lines = layout_report(&record());
        let t = texts(&lines);
        assert!(t.contains(&"Phone Number: 081234567890"));
        assert!(t.contains(&"data analyst | acme"));
        assert!(t.contains(&"Duration: Jan 2020 - present"));
        assert!(t.contains(&"- built dashboards"));
        assert!(t.contains(&"s1 statistics | universitas indonesia"));
        assert!(t.contains(&"english, indonesian"));
        assert!(t.contains(&"Issued date: Mar 2021 - Mar 2024"));
    }

    #[test]
    fn wrap_respects_width() {
        let text = "lorem ipsum ".repeat(30);
        for line in wrap(&text, 40) {
            assert!(line.chars().count() <= 40, "{line}");
        }
        assert_eq!(wrap("", 10), vec![String::new()]);
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn long_bullets_continue_indented() {
        let mut rec = record();
        rec.work_experience[0].job_desc = vec!["word ".repeat(40)];
        let lines = layout_report(&rec);
        let bullets: Vec<&ReportLine> = lines.iter().filter(|l| l.style == LineStyle::Bullet).collect();
        assert!(bullets.len() > 1);
        assert!(bullets[0].text.starts_with("- "));
        assert!(bullets[1].text.starts_with("  "));
    }

    #[test]
    fn short_report_fits_one_page() {
        let pages = paginate(&layout_report(&record()), PAGE_CAPACITY);
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn pages_respect_capacity() {
        let mut rec = record();
        rec.work_experience = (0..30).map(|_| rec.work_experience[0].clone()).collect();
        let pages = paginate(&layout_report(&rec), PAGE_CAPACITY);
        assert!(pages.len() > 1);
        for page in &pages {
            let used: f32 = page.iter().map(|l| l.style.height()).sum();
            assert!(used <= PAGE_CAPACITY, "{used}");
            assert_ne!(page.first().map(|l| l.style), Some(LineStyle::Gap));
            assert!(!matches!(
                page.last().map(|l| l.style),
                Some(LineStyle::Section | LineStyle::Subtitle)
            ));
        }
        let total: usize = pages.iter().map(Vec::len).sum();
        assert!(total <= layout_report(&rec).len());
    }

    #[test]
    fn empty_input_gives_one_empty_page() {
        assert_eq!(paginate(&[], PAGE_CAPACITY), vec![Vec::<ReportLine>::new()]);
    }
}
