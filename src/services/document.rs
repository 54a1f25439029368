use chrono::Utc;
use lopdf::content::{ Content, Operation };
use lopdf::{ dictionary, Document, Object, Stream };
use std::io::{ Cursor, Write };
use std::str::FromStr;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{ CompressionMethod, ZipWriter };

use crate::models::complaint::{ provided, ComplaintRecord };

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("PDF rendering failed: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("DOCX packaging failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("document IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Docx =>
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
        }
    }
}

impl FromStr for DocumentFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" | "word" | "doc" => Ok(DocumentFormat::Docx),
            other => Err(format!("Unsupported format: {}", other)),
        }
    }
}

/// Layout-independent content of a rendered complaint.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Title(String),
    Heading(String),
    Field(String, String),
    Paragraph(String),
    Footer(String),
}

#[derive(Debug, Clone)]
pub struct ComplaintDocument {
    pub title: String,
    pub blocks: Vec<Block>,
}

fn yes_no(flag: bool) -> String {
    (if flag { "Yes" } else { "No" }).to_string()
}

fn or_default(value: &Option<String>, default: &str) -> String {
    provided(value).unwrap_or(default).to_string()
}

impl ComplaintDocument {
    pub fn from_record(record: &ComplaintRecord) -> Self {
        Self::from_record_at(record, &Utc::now().to_rfc3339())
    }

    pub fn from_record_at(record: &ComplaintRecord, generated_on: &str) -> Self {
        let req = &record.request_data;
        let field = |label: &str, value: String| Block::Field(label.to_string(), value);

        let mut blocks = vec![
            Block::Title("CHILD SAFETY INCIDENT COMPLAINT".to_string()),
            Block::Heading("Basic Information".to_string()),
            field("Complaint ID:", record.complaint_id.clone()),
            field("Date Filed:", record.submission_timestamp.clone()),
            field("Status:", record.status.clone()),
            field("Priority:", "medium".to_string()),
            Block::Heading("Child Information".to_string()),
            field("Name:", req.child_name.clone()),
            field("Age:", req.child_age.to_string()),
            field("Gender:", or_default(&req.child_gender, "N/A")),
            field("School/Institution:", or_default(&req.child_school, "N/A"))
        ];
        if let Some(grade) = provided(&req.child_grade) {
            blocks.push(field("Grade:", grade.to_string()));
        }

        blocks.extend([
            Block::Heading("Incident Details".to_string()),
            Block::Paragraph(req.incident_description.clone()),
            field("Incident Type:", req.incident_type.clone()),
            field("Date of Incident:", req.incident_date.clone()),
            field("Time of Incident:", req.incident_time.clone()),
            field("Location:", req.location.clone()),
            field("Witnesses:", or_default(&req.witnesses, "None")),
            field("Evidence:", or_default(&req.evidence, "None provided")),
            field("Previous Incidents:", or_default(&req.previous_incidents, "None reported")),
            Block::Heading("Guardian Information".to_string()),
            field("Name:", req.guardian_name.clone()),
            field("Phone:", req.guardian_phone.clone()),
            field("Email:", or_default(&req.guardian_email, "N/A")),
            field("Address:", or_default(&req.guardian_address, "N/A")),
            Block::Heading("Legal Preferences".to_string()),
            field("Legal Action:", yes_no(req.wants_legal_action)),
            field("Mediation:", yes_no(req.wants_mediation)),
            field("Restraining Order:", yes_no(req.wants_restraining_order)),
            field("Compensation:", yes_no(req.wants_compensation)),
        ]);

        if !record.complaint_text.trim().is_empty() {
            blocks.push(Block::Heading("Complaint".to_string()));
            for paragraph in record.complaint_text.split("\n\n") {
                let paragraph = paragraph.trim();
                if !paragraph.is_empty() {
                    blocks.push(Block::Paragraph(paragraph.to_string()));
                }
            }
        }

        blocks.push(
            Block::Footer(format!("Generated on {} by SafeChild-Lite System", generated_on))
        );

        Self {
            title: "Child Safety Incident Complaint".to_string(),
            blocks,
        }
    }

    pub fn render(&self, format: DocumentFormat) -> Result<Vec<u8>, DocumentError> {
        match format {
            DocumentFormat::Pdf => render_pdf(self),
            DocumentFormat::Docx => render_docx(self),
        }
    }
}

// --- PDF ---

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 72.0;

struct PdfLine {
    bold: bool,
    size: f32,
    x: f32,
    text: Vec<u8>,
    space_before: f32,
}

/// Cuts a word wider than a whole line into line-sized pieces.
fn hard_split(word: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars
        .chunks(max_chars)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Greedy word wrap by character count; Helvetica averages about half an
/// em per glyph.
fn wrap(text: &str, size: f32, width: f32) -> Vec<String> {
    let max_chars = ((width / (size * 0.5)) as usize).max(10);
    let mut lines = Vec::new();
    for raw in text.lines() {
        let mut current = String::new();
        for word in raw.split_whitespace().flat_map(|w| hard_split(w, max_chars)) {
            let word = word.as_str();
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > max_chars && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }
    lines
}

/// Encodes text for the WinAnsi-encoded standard fonts. Printable ASCII and
/// Latin-1 (U+00A0..U+00FF) map to single bytes; anything else becomes `?`.
fn pdf_safe(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7e | 0xa0..=0xff => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

fn layout(doc: &ComplaintDocument) -> Vec<PdfLine> {
    let width = PAGE_WIDTH - 2.0 * MARGIN;
    let mut lines = Vec::new();
    let mut push = |bold: bool, size: f32, x: f32, text: &str, space_before: f32, avail: f32| {
        for (i, line) in wrap(text, size, avail).into_iter().enumerate() {
            lines.push(PdfLine {
                bold,
                size,
                x,
                text: pdf_safe(&line),
                space_before: if i == 0 { space_before } else { 0.0 },
            });
        }
    };

    for block in &doc.blocks {
        match block {
            Block::Title(text) => push(true, 16.0, MARGIN, text, 0.0, width),
            Block::Heading(text) => push(true, 13.0, MARGIN, text, 14.0, width),
            Block::Field(label, value) => {
                push(true, 10.0, MARGIN, &format!("{} {}", label, value), 2.0, width);
            }
            Block::Paragraph(text) => push(false, 10.0, MARGIN, text, 6.0, width),
            Block::Footer(text) => push(false, 8.0, MARGIN, text, 20.0, width),
        }
    }
    lines
}

fn paginate(lines: Vec<PdfLine>) -> Vec<Vec<(PdfLine, f32)>> {
    let mut pages = vec![Vec::new()];
    let mut y = PAGE_HEIGHT - MARGIN;
    for line in lines {
        let advance = line.size * 1.4 + line.space_before;
        if y - advance < MARGIN {
            pages.push(Vec::new());
            y = PAGE_HEIGHT - MARGIN;
        }
        y -= advance;
        if let Some(page) = pages.last_mut() {
            page.push((line, y));
        }
    }
    pages
}

fn render_pdf(doc: &ComplaintDocument) -> Result<Vec<u8>, DocumentError> {
    let mut pdf = Document::with_version("1.5");
    let pages_id = pdf.new_object_id();
    let regular_id = pdf.add_object(
        dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        }
    );
    let bold_id = pdf.add_object(
        dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        }
    );
    let resources_id = pdf.add_object(
        dictionary! {
            "Font" => dictionary! {
                "F1" => regular_id,
                "F2" => bold_id,
            },
        }
    );

    let mut kids: Vec<Object> = Vec::new();
    for page in paginate(layout(doc)) {
        let mut operations = Vec::new();
        for (line, y) in page {
            let font = if line.bold { "F2" } else { "F1" };
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec![font.into(), line.size.into()]));
            operations.push(Operation::new("Td", vec![line.x.into(), y.into()]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(line.text)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = pdf.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = pdf.add_object(
            dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            }
        );
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    };
    pdf.objects.insert(pages_id, Object::Dictionary(pages));

    let info_id = pdf.add_object(
        dictionary! {
            "Title" => Object::string_literal(doc.title.as_str()),
            "Author" => Object::string_literal("SafeChild-Lite System"),
        }
    );
    let catalog_id = pdf.add_object(
        dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        }
    );
    pdf.trailer.set("Root", catalog_id);
    pdf.trailer.set("Info", info_id);
    pdf.compress();

    let mut out = Vec::new();
    pdf.save_to(&mut out)?;
    Ok(out)
}

// --- DOCX ---

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/></Relationships>"#;

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn run(text: &str, bold: bool, half_points: u32) -> String {
    let mut props = String::new();
    if bold {
        props.push_str("<w:b/>");
    }
    props.push_str(&format!("<w:sz w:val=\"{}\"/>", half_points));
    format!("<w:r><w:rPr>{}</w:rPr><w:t xml:space=\"preserve\">{}</w:t></w:r>", props, xml_escape(text))
}

fn paragraph(runs: &str, centered: bool) -> String {
    let props = if centered { "<w:pPr><w:jc w:val=\"center\"/></w:pPr>" } else { "" };
    format!("<w:p>{}{}</w:p>", props, runs)
}

fn document_xml(doc: &ComplaintDocument) -> String {
    let mut body = String::new();
    for block in &doc.blocks {
        let xml = match block {
            Block::Title(text) => paragraph(&run(text, true, 32), true),
            Block::Heading(text) => paragraph(&run(text, true, 26), false),
            Block::Field(label, value) => {
                paragraph(&format!("{}{}", run(&format!("{} ", label), true, 20), run(value, false, 20)), false)
            }
            Block::Paragraph(text) => {
                // Line breaks inside a paragraph become separate paragraphs.
                text.lines()
                    .map(|line| paragraph(&run(line.trim(), false, 20), false))
                    .collect::<String>()
            }
            Block::Footer(text) => paragraph(&run(text, false, 16), true),
        };
        body.push_str(&xml);
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr></w:body></w:document>"#,
        body
    )
}

fn core_xml(doc: &ComplaintDocument) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>{}</dc:title><dc:creator>SafeChild-Lite System</dc:creator><dc:subject>Child Safety Incident Report</dc:subject></cp:coreProperties>"#,
        xml_escape(&doc.title)
    )
}

fn render_docx(doc: &ComplaintDocument) -> Result<Vec<u8>, DocumentError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("docProps/core.xml", core_xml(doc)),
        ("word/document.xml", document_xml(doc)),
    ];
    for (name, body) in parts {
        zip.start_file(name, options)?;
        zip.write_all(body.as_bytes())?;
    }

    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::complaint::{ ComplaintRequest, STATUS_DRAFT_GENERATED };
    use std::collections::BTreeMap;
    use std::io::Read;

    fn record(text: &str) -> ComplaintRecord {
        ComplaintRecord {
            complaint_id: "COMP_20240402_ABCDEF12".into(),
            status: STATUS_DRAFT_GENERATED.into(),
            complaint_text: text.into(),
            submission_timestamp: "2024-04-02T10:00:00Z".into(),
            generated_at: "2024-04-02T10:00:01Z".into(),
            updated_at: None,
            fallback: true,
            request_data: ComplaintRequest {
                child_name: "Ava".into(),
                child_age: 10,
                incident_date: "2024-04-02".into(),
                incident_time: "15:30".into(),
                location: "School <playground>".into(),
                incident_type: "bullying".into(),
                incident_description: "Repeated pushing during recess".into(),
                guardian_name: "Jordan".into(),
                guardian_phone: "555-123-4567".into(),
                wants_mediation: true,
                ..Default::default()
            },
            download_urls: BTreeMap::new(),
        }
    }

    #[test]
    fn format_aliases() {
        assert_eq!("PDF".parse::<DocumentFormat>(), Ok(DocumentFormat::Pdf));
        assert_eq!("word".parse::<DocumentFormat>(), Ok(DocumentFormat::Docx));
        assert_eq!("doc".parse::<DocumentFormat>(), Ok(DocumentFormat::Docx));
        assert!("txt".parse::<DocumentFormat>().is_err());
    }

    #[test]
    fn document_lists_sections_in_order() {
        let doc = ComplaintDocument::from_record_at(&record("OFFICIAL COMPLAINT\n\nBody"), "now");
        let headings: Vec<&str> = doc.blocks
            .iter()
            .filter_map(|b| match b {
                Block::Heading(h) => Some(h.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(headings, vec![
            "Basic Information",
            "Child Information",
            "Incident Details",
            "Guardian Information",
            "Legal Preferences",
            "Complaint"
        ]);
        assert!(doc.blocks.contains(&Block::Field("Mediation:".into(), "Yes".into())));
        assert_eq!(
            doc.blocks.last(),
            Some(&Block::Footer("Generated on now by SafeChild-Lite System".into()))
        );
    }

    #[test]
    fn wrap_respects_width() {
        let lines = wrap(&"word ".repeat(100), 10.0, 100.0);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.chars().count() <= 20));
    }

    #[test]
    fn wrap_splits_words_longer_than_a_line() {
        let url = format!("https://example.org/{}", "x".repeat(60));
        let lines = wrap(&format!("see {}", url), 10.0, 100.0);
        assert!(lines.iter().all(|l| l.chars().count() <= 20));
        assert_eq!(lines.concat().replace(' ', ""), format!("see{}", url));
    }

    #[test]
    fn latin1_survives_pdf_encoding() {
        assert_eq!(pdf_safe("José Muñoz"), b"Jos\xe9 Mu\xf1oz".to_vec());
        assert_eq!(pdf_safe("a\u{2014}b\u{1F600}\t"), b"a?b??".to_vec());
    }

    #[test]
    fn accented_names_reach_the_page_content() {
        let mut rec = record("Body");
        rec.request_data.child_name = "José Muñoz".into();
        let bytes = ComplaintDocument::from_record(&rec).render(DocumentFormat::Pdf).unwrap();
        let pdf = Document::load_mem(&bytes).unwrap();
        let page_id = *pdf.get_pages().values().next().unwrap();

        let content = Content::decode(&pdf.get_page_content(page_id).unwrap()).unwrap();
        let shown: Vec<Vec<u8>> = content.operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| op.operands.first())
            .filter_map(|o| o.as_str().ok())
            .map(|b| b.to_vec())
            .collect();
        assert!(shown.contains(&b"Name: Jos\xe9 Mu\xf1oz".to_vec()));
        assert!(!shown.iter().any(|line| line.starts_with(b"Name: Jos?")));

        let fonts = pdf.get_page_fonts(page_id);
        assert!(!fonts.is_empty());
        for font in fonts.values() {
            assert_eq!(font.get(b"Encoding").unwrap().as_name_str().unwrap(), "WinAnsiEncoding");
        }
    }

    #[test]
    fn pdf_is_loadable_and_paginates_long_text() {
        let short = ComplaintDocument::from_record(&record("Short text")).render(DocumentFormat::Pdf).unwrap();
        assert!(short.starts_with(b"%PDF-1.5"));
        assert_eq!(Document::load_mem(&short).unwrap().get_pages().len(), 1);

        let long_text = vec!["A paragraph of the complaint that goes on for a while."; 120].join("\n\n");
        let long = ComplaintDocument::from_record(&record(&long_text)).render(DocumentFormat::Pdf).unwrap();
        assert!(Document::load_mem(&long).unwrap().get_pages().len() > 1);
    }

    #[test]
    fn docx_package_holds_escaped_body() {
        let bytes = ComplaintDocument::from_record(&record("Body")).render(DocumentFormat::Docx).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert!(archive.by_name("[Content_Types].xml").is_ok());
        assert!(archive.by_name("_rels/.rels").is_ok());

        let mut xml = String::new();
        archive.by_name("word/document.xml").unwrap().read_to_string(&mut xml).unwrap();
        assert!(xml.contains("CHILD SAFETY INCIDENT COMPLAINT"));
        assert!(xml.contains("School &lt;playground&gt;"));
    }
}
