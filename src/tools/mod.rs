//! File tools
//!
//! Every tool takes a list of input files plus a JSON options object and
//! produces files, text or structured data. Inputs and outputs travel as
//! data URIs. CPU-bound work (lopdf, image) runs on the blocking pool;
//! LibreOffice, Tesseract and Gemini are awaited directly.

pub mod ai;
pub mod archive;
pub mod command;
pub mod data_uri;
pub mod error;
pub mod ocr;
pub mod office;
pub mod pdf;
pub mod raster;
pub mod registry;
pub mod voter;

pub use data_uri::DataUri;
pub use error::{ToolError, ToolResult};
pub use registry::{ToolCategory, ToolInfo};

use crate::config::{AiConfig, ToolsConfig};
use ai::{strip_code_fence, AiError, GeminiClient};
use ocr::TesseractOcr;
use office::{Conversion, OfficeConverter};
use raster::RasterOutput;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Instant;

const PDF_MIME: &str = "application/pdf";
const ZIP_MIME: &str = "application/zip";
const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const DEFAULT_AI_OCR_PROMPT: &str = "Transcribe all text in this image exactly as written. \
Keep the reading order and line breaks. Return only the text.";

const VOTER_AI_PROMPT: &str = "This image is a page of an Indian electoral roll. Transcribe it line by line, \
keeping every label (Name, Father's Name, Husband's Name, Mother's Name, House Number, Age, Gender) \
and every EPIC number next to its value. Return only the text.";

/// JSON body of `POST /tools/{slug}`
#[derive(Debug, Default, Deserialize)]
pub struct ToolRequest {
    /// Data URIs
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub options: Value,
}

/// One decoded input file
#[derive(Debug, Clone)]
pub struct ToolInput {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ToolInput {
    /// Build an input, sniffing the type when the client sent a generic one
    pub fn new(name: Option<String>, mime: &str, bytes: Vec<u8>, index: usize) -> Self {
        let mime = match mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase() {
            m if m.is_empty() || m == "application/octet-stream" => sniff_mime(&bytes).to_string(),
            m => m,
        };
        let name = name
            .map(|n| sanitize_file_name(&n))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| {
                let ext = office::extension_for_mime(&mime).unwrap_or("bin");
                format!("file-{}.{}", index + 1, ext)
            });
        Self { name, mime, bytes }
    }

    pub fn from_data_uri(raw: &str, index: usize) -> ToolResult<Self> {
        let uri = DataUri::parse(raw).map_err(|e| match e {
            ToolError::InvalidInput(msg) => ToolError::InvalidInput(format!("File {}: {}", index + 1, msg)),
            other => other,
        })?;
        Ok(Self::new(uri.name, &uri.mime, uri.data, index))
    }

    /// File name without its extension
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("document")
    }

    fn extension(&self) -> Option<String> {
        office::extension_from_name(&self.name)
            .or_else(|| office::extension_for_mime(&self.mime).map(str::to_string))
    }
}

/// One produced file
#[derive(Debug, Clone)]
pub struct OutputFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl OutputFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    fn raster(stem: &str, suffix: &str, out: RasterOutput) -> Self {
        Self::new(
            format!("{}-{}.{}", stem, suffix, out.extension()),
            out.mime(),
            out.bytes,
        )
    }
}

/// What a tool produced, before encoding
#[derive(Debug, Default)]
pub struct ToolOutput {
    pub files: Vec<OutputFile>,
    pub text: Option<String>,
    pub data: Option<Value>,
}

impl ToolOutput {
    fn file(file: OutputFile) -> Self {
        Self {
            files: vec![file],
            ..Default::default()
        }
    }

    fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    fn output_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.bytes.len() as u64).sum::<u64>()
            + self.text.as_ref().map_or(0, |t| t.len() as u64)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFile {
    pub name: String,
    pub data_uri: String,
    pub size: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RunStats {
    pub input_bytes: u64,
    pub output_bytes: u64,
}

/// Response body of a tool run
#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse {
    pub tool: String,
    /// Data URI of the first output file
    pub result: Option<String>,
    pub files: Vec<ResponseFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub stats: RunStats,
}

impl ToolResponse {
    fn new(tool: &str, output: ToolOutput, input_bytes: u64) -> Self {
        let output_bytes = output.output_bytes();
        let files: Vec<ResponseFile> = output
            .files
            .into_iter()
            .map(|f| ResponseFile {
                data_uri: data_uri::encode(&f.mime, &f.bytes),
                size: f.bytes.len(),
                name: f.name,
            })
            .collect();
        Self {
            tool: tool.to_string(),
            result: files.first().map(|f| f.data_uri.clone()),
            files,
            text: output.text,
            data: output.data,
            stats: RunStats {
                input_bytes,
                output_bytes,
            },
        }
    }
}

/// Deserialize a tool's options; `null` means all defaults
pub fn parse_options<T: DeserializeOwned + Default>(value: &Value) -> ToolResult<T> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value.clone()).map_err(|e| ToolError::invalid(format!("Invalid options: {}", e)))
}

async fn blocking<T, F>(f: F) -> ToolResult<T>
where
    F: FnOnce() -> ToolResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ToolError::processing(format!("worker task failed: {}", e)))?
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SplitOptions {
    ranges: Option<String>,
    zip: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self { ranges: None, zip: true }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageSelection {
    pages: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RotateOptions {
    angle: i64,
    pages: Option<String>,
    format: Option<String>,
}

impl Default for RotateOptions {
    fn default() -> Self {
        Self {
            angle: 90,
            pages: None,
            format: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompressPdfOptions {
    /// JPEG quality for embedded photos; untouched when absent
    quality: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UnlockOptions {
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FormatOnly {
    format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlipOptions {
    direction: raster::FlipDirection,
    format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConvertDocumentOptions {
    target: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OcrOptions {
    language: Option<String>,
    psm: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AiOcrOptions {
    prompt: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngine {
    #[default]
    Tesseract,
    Ai,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VoterOptions {
    engine: OcrEngine,
    /// Already recognised text; skips OCR
    text: Option<String>,
    language: Option<String>,
}

/// Runs tools against the configured external collaborators
pub struct Toolbox {
    office: OfficeConverter,
    ocr: TesseractOcr,
    ai: Option<GeminiClient>,
    max_files: usize,
}

impl Toolbox {
    pub fn new(tools: &ToolsConfig, ai: &AiConfig) -> anyhow::Result<Self> {
        let ai = GeminiClient::from_config(ai).map_err(|e| anyhow::anyhow!("Failed to set up AI client: {}", e))?;
        if let Some(client) = &ai {
            tracing::info!(model = client.model(), "AI tools enabled");
        }
        Ok(Self {
            office: OfficeConverter::new(tools),
            ocr: TesseractOcr::new(tools),
            ai,
            max_files: tools.max_files,
        })
    }

    pub fn ai_enabled(&self) -> bool {
        self.ai.is_some()
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    /// Count and type checks shared by every tool
    pub fn check_inputs(&self, tool: &ToolInfo, inputs: &[ToolInput]) -> ToolResult<()> {
        let max = tool.max_files_with(self.max_files);
        if inputs.len() < tool.min_files {
            return Err(ToolError::invalid(format!(
                "{} needs at least {} file{}",
                tool.name,
                tool.min_files,
                if tool.min_files == 1 { "" } else { "s" }
            )));
        }
        if inputs.len() > max {
            return Err(ToolError::invalid(format!(
                "{} accepts at most {} file{}",
                tool.name,
                max,
                if max == 1 { "" } else { "s" }
            )));
        }
        for (i, input) in inputs.iter().enumerate() {
            if input.bytes.is_empty() {
                return Err(ToolError::invalid(format!("File {} is empty", i + 1)));
            }
            if !tool.accepts_mime(&input.mime) {
                return Err(ToolError::UnsupportedFormat(format!(
                    "{} does not accept {} files",
                    tool.name, input.mime
                )));
            }
        }
        Ok(())
    }

    /// Run a tool by slug
    pub async fn run(&self, slug: &str, inputs: Vec<ToolInput>, options: &Value) -> ToolResult<ToolResponse> {
        let tool = registry::find(slug).ok_or_else(|| ToolError::invalid(format!("Unknown tool '{}'", slug)))?;
        self.check_inputs(tool, &inputs)?;

        let input_bytes: u64 = inputs.iter().map(|i| i.bytes.len() as u64).sum();
        let started = Instant::now();
        let output = self.dispatch(tool, inputs, options).await?;
        let response = ToolResponse::new(tool.slug, output, input_bytes);

        tracing::info!(
            tool = tool.slug,
            input_bytes,
            output_bytes = response.stats.output_bytes,
            files = response.files.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tool run finished"
        );
        Ok(response)
    }

    async fn dispatch(&self, tool: &ToolInfo, mut inputs: Vec<ToolInput>, options: &Value) -> ToolResult<ToolOutput> {
        tracing::info!(tool = tool.slug, inputs = inputs.len(), "Running tool");

        match tool.slug {
            "merge-pdf" => {
                let files: Vec<Vec<u8>> = inputs.drain(..).map(|i| i.bytes).collect();
                let merged = blocking(move || pdf::merge(&files)).await?;
                Ok(ToolOutput::file(OutputFile::new("merged.pdf", PDF_MIME, merged)))
            }
            "split-pdf" => {
                let input = take_first(&mut inputs)?;
                let opts: SplitOptions = parse_options(options)?;
                let stem = input.stem().to_string();
                let parts = blocking(move || pdf::split(&input.bytes, opts.ranges.as_deref())).await?;
                let part_count = parts.len();
                let files: Vec<(String, Vec<u8>)> =
                    parts.into_iter().map(|p| (p.file_name(&stem), p.bytes)).collect();

                let output = if opts.zip {
                    let zipped = blocking(move || archive::zip_files(&files)).await?;
                    ToolOutput::file(OutputFile::new(format!("{}-split.zip", stem), ZIP_MIME, zipped))
                } else {
                    ToolOutput {
                        files: files
                            .into_iter()
                            .map(|(name, bytes)| OutputFile::new(name, PDF_MIME, bytes))
                            .collect(),
                        ..Default::default()
                    }
                };
                Ok(output.with_data(json!({ "parts": part_count })))
            }
            "extract-pages" | "remove-pages" => {
                let input = take_first(&mut inputs)?;
                let opts: PageSelection = parse_options(options)?;
                if opts.pages.trim().is_empty() {
                    return Err(ToolError::invalid("Choose the pages, e.g. \"1-3,5\""));
                }
                let remove = tool.slug == "remove-pages";
                let name = format!("{}-{}.pdf", input.stem(), if remove { "trimmed" } else { "extract" });
                let bytes = blocking(move || {
                    if remove {
                        pdf::remove_pages(&input.bytes, &opts.pages)
                    } else {
                        pdf::extract_pages(&input.bytes, &opts.pages)
                    }
                })
                .await?;
                Ok(ToolOutput::file(OutputFile::new(name, PDF_MIME, bytes)))
            }
            "rotate-pdf" => {
                let input = take_first(&mut inputs)?;
                let opts: RotateOptions = parse_options(options)?;
                let name = format!("{}-rotated.pdf", input.stem());
                let bytes = blocking(move || pdf::rotate(&input.bytes, opts.angle, opts.pages.as_deref())).await?;
                Ok(ToolOutput::file(OutputFile::new(name, PDF_MIME, bytes)))
            }
            "compress-pdf" => {
                let input = take_first(&mut inputs)?;
                let opts: CompressPdfOptions = parse_options(options)?;
                let before = input.bytes.len();
                let name = format!("{}-compressed.pdf", input.stem());
                let (bytes, stats) = blocking(move || pdf::compress(&input.bytes, opts.quality)).await?;
                let after = bytes.len();
                Ok(ToolOutput::file(OutputFile::new(name, PDF_MIME, bytes)).with_data(json!({
                    "objects_removed": stats.objects_removed,
                    "images_recompressed": stats.images_recompressed,
                    "original_size": before,
                    "compressed_size": after,
                })))
            }
            "watermark-pdf" => {
                let input = take_first(&mut inputs)?;
                let opts: pdf::WatermarkOptions = parse_options(options)?;
                let name = format!("{}-watermarked.pdf", input.stem());
                let bytes = blocking(move || pdf::watermark(&input.bytes, &opts)).await?;
                Ok(ToolOutput::file(OutputFile::new(name, PDF_MIME, bytes)))
            }
            "add-page-numbers" => {
                let input = take_first(&mut inputs)?;
                let opts: pdf::PageNumberOptions = parse_options(options)?;
                let name = format!("{}-numbered.pdf", input.stem());
                let bytes = blocking(move || pdf::add_page_numbers(&input.bytes, &opts)).await?;
                Ok(ToolOutput::file(OutputFile::new(name, PDF_MIME, bytes)))
            }
            "unlock-pdf" => {
                let input = take_first(&mut inputs)?;
                let opts: UnlockOptions = parse_options(options)?;
                let name = format!("{}-unlocked.pdf", input.stem());
                let (bytes, method) = blocking(move || pdf::unlock(&input.bytes, opts.password.as_deref())).await?;
                Ok(ToolOutput::file(OutputFile::new(name, PDF_MIME, bytes)).with_data(json!({ "method": method })))
            }
            "pdf-to-text" => {
                let input = take_first(&mut inputs)?;
                let pages = blocking(move || pdf::extract_text(&input.bytes)).await?;
                let text = pages
                    .iter()
                    .map(|p| p.text.trim())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                Ok(ToolOutput {
                    text: Some(text),
                    data: Some(json!({ "pages": pages })),
                    ..Default::default()
                })
            }
            "pdf-info" => {
                let input = take_first(&mut inputs)?;
                let info = blocking(move || pdf::info(&input.bytes)).await?;
                let data = serde_json::to_value(&info).map_err(ToolError::processing)?;
                Ok(ToolOutput {
                    data: Some(data),
                    ..Default::default()
                })
            }
            "images-to-pdf" => {
                let images: Vec<Vec<u8>> = inputs.drain(..).map(|i| i.bytes).collect();
                let bytes = blocking(move || pdf::images_to_pdf(&images)).await?;
                Ok(ToolOutput::file(OutputFile::new("images.pdf", PDF_MIME, bytes)))
            }
            "compress-image" | "resize-image" | "convert-image" | "rotate-image" | "flip-image" | "crop-image"
            | "grayscale-image" => self.run_raster(tool.slug, take_first(&mut inputs)?, options).await,
            "word-to-pdf" | "excel-to-pdf" | "powerpoint-to-pdf" => {
                let input = take_first(&mut inputs)?;
                self.run_office(&input, "pdf", None, None).await
            }
            "pdf-to-word" => {
                let input = take_first(&mut inputs)?;
                self.run_office(&input, "docx", Some("MS Word 2007 XML"), Some("writer_pdf_import"))
                    .await
            }
            "convert" => {
                let input = take_first(&mut inputs)?;
                let opts: ConvertDocumentOptions = parse_options(options)?;
                if opts.target.trim().is_empty() {
                    return Err(ToolError::invalid("Target format is required"));
                }
                self.run_office(&input, &opts.target, None, None).await
            }
            "ocr-image" => {
                let input = take_first(&mut inputs)?;
                let opts: OcrOptions = parse_options(options)?;
                let text = self
                    .ocr
                    .recognize(&input.bytes, opts.language.as_deref(), opts.psm)
                    .await?;
                Ok(text_output(text))
            }
            "ai-ocr" => {
                let input = take_first(&mut inputs)?;
                let opts: AiOcrOptions = parse_options(options)?;
                let prompt = opts
                    .prompt
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .unwrap_or(DEFAULT_AI_OCR_PROMPT);
                let text = self.ai_text(prompt, &input).await?;
                Ok(text_output(text))
            }
            "voter-extract" => self.run_voter(inputs.into_iter().next(), options).await,
            other => Err(ToolError::invalid(format!("Unknown tool '{}'", other))),
        }
    }

    async fn run_raster(&self, slug: &'static str, input: ToolInput, options: &Value) -> ToolResult<ToolOutput> {
        let stem = input.stem().to_string();
        let options = options.clone();
        let (suffix, out) = blocking(move || {
            let bytes = &input.bytes;
            Ok(match slug {
                "compress-image" => ("compressed", raster::compress(bytes, &parse_options(&options)?)?),
                "resize-image" => ("resized", raster::resize(bytes, &parse_options(&options)?)?),
                "convert-image" => ("converted", raster::convert(bytes, &parse_options(&options)?)?),
                "rotate-image" => {
                    let opts: RotateOptions = parse_options(&options)?;
                    ("rotated", raster::rotate(bytes, opts.angle, &opts.format)?)
                }
                "flip-image" => {
                    let opts: FlipOptions = parse_options(&options)?;
                    ("flipped", raster::flip(bytes, opts.direction, &opts.format)?)
                }
                "crop-image" => ("cropped", raster::crop(bytes, &parse_options(&options)?)?),
                _ => {
                    let opts: FormatOnly = parse_options(&options)?;
                    ("grayscale", raster::grayscale(bytes, &opts.format)?)
                }
            })
        })
        .await?;

        let data = json!({ "width": out.width, "height": out.height });
        Ok(ToolOutput::file(OutputFile::raster(&stem, suffix, out)).with_data(data))
    }

    async fn run_office(
        &self,
        input: &ToolInput,
        target: &str,
        export_filter: Option<&str>,
        import_filter: Option<&str>,
    ) -> ToolResult<ToolOutput> {
        let input_ext = input
            .extension()
            .ok_or_else(|| ToolError::UnsupportedFormat(format!("cannot convert {} files", input.mime)))?;
        let target = target.trim().trim_start_matches('.').to_ascii_lowercase();
        let bytes = self
            .office
            .convert(Conversion {
                input: &input.bytes,
                input_ext: &input_ext,
                target_ext: &target,
                export_filter,
                import_filter,
            })
            .await?;
        let mime = if target == "docx" { DOCX_MIME } else { office::mime_for_extension(&target) };
        Ok(ToolOutput::file(OutputFile::new(
            format!("{}.{}", input.stem(), target),
            mime,
            bytes,
        )))
    }

    async fn ai_text(&self, prompt: &str, input: &ToolInput) -> ToolResult<String> {
        let client = self.ai.as_ref().ok_or(AiError::NotConfigured)?;
        let text = client.generate(prompt, &input.mime, &input.bytes).await?;
        Ok(strip_code_fence(&text).to_string())
    }

    async fn run_voter(&self, input: Option<ToolInput>, options: &Value) -> ToolResult<ToolOutput> {
        let opts: VoterOptions = parse_options(options)?;

        let supplied = opts.text.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let text = match (supplied, input) {
            (Some(text), _) => text.to_string(),
            (None, Some(input)) if input.mime == "text/plain" => String::from_utf8_lossy(&input.bytes).into_owned(),
            (None, Some(input)) => match opts.engine {
                OcrEngine::Tesseract => self.ocr.recognize(&input.bytes, opts.language.as_deref(), Some(6)).await?,
                OcrEngine::Ai => self.ai_text(VOTER_AI_PROMPT, &input).await?,
            },
            (None, None) => return Err(ToolError::invalid("Upload a roll image or supply its text")),
        };

        let records = voter::extract(&text);
        tracing::debug!(records = records.len(), engine = ?opts.engine, "Voter records extracted");
        Ok(ToolOutput {
            text: Some(text),
            data: Some(json!({ "count": records.len(), "records": records })),
            ..Default::default()
        })
    }
}

/// Tools other than merge, images-to-pdf and voter-extract take exactly one file
fn take_first(inputs: &mut Vec<ToolInput>) -> ToolResult<ToolInput> {
    if inputs.is_empty() {
        return Err(ToolError::invalid("A file is required"));
    }
    Ok(inputs.swap_remove(0))
}

fn text_output(text: String) -> ToolOutput {
    ToolOutput {
        text: Some(text),
        ..Default::default()
    }
}

/// Best guess at a MIME type from magic bytes
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"%PDF") {
        return PDF_MIME;
    }
    if bytes.starts_with(b"PK\x03\x04") {
        return ZIP_MIME;
    }
    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type(),
        Err(_) => "application/octet-stream",
    }
}

/// Keep the last path component and drop characters that upset file systems
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    base.chars()
        .filter(|c| !c.is_control() && !matches!(c, '"' | '<' | '>' | ':' | '|' | '?' | '*'))
        .collect::<String>()
        .trim()
        .trim_start_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::pdf::testutil::{page_texts, sample_pdf};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn toolbox() -> Toolbox {
        Toolbox::new(&ToolsConfig::default(), &AiConfig::default()).unwrap()
    }

    fn pdf_input(name: &str, pages: usize) -> ToolInput {
        ToolInput::new(Some(name.to_string()), PDF_MIME, sample_pdf(pages), 0)
    }

    fn png_input(w: u32, h: u32) -> ToolInput {
        let img = RgbImage::from_pixel(w, h, Rgb([200, 40, 40]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        ToolInput::new(Some("photo.png".to_string()), "image/png", bytes, 0)
    }

    fn decode(uri: &str) -> Vec<u8> {
        DataUri::parse(uri).unwrap().data
    }

    #[test]
    fn test_input_naming_and_sniffing() {
        let input = ToolInput::new(None, "application/octet-stream", sample_pdf(1), 2);
        assert_eq!(input.mime, PDF_MIME);
        assert_eq!(input.name, "file-3.pdf");
        assert_eq!(input.stem(), "file-3");

        let input = ToolInput::new(Some("../../etc/Report.pdf".into()), "application/pdf", vec![1], 0);
        assert_eq!(input.name, "Report.pdf");
        assert_eq!(sanitize_file_name("a<b>.pdf"), "ab.pdf");
    }

    #[test]
    fn test_parse_options() {
        let opts: SplitOptions = parse_options(&Value::Null).unwrap();
        assert!(opts.zip);
        let opts: RotateOptions = parse_options(&json!({ "pages": "1" })).unwrap();
        assert_eq!(opts.angle, 90);
        let err = parse_options::<RotateOptions>(&json!({ "angle": "ninety" })).unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_merge_pdf() {
        let response = toolbox()
            .run("merge-pdf", vec![pdf_input("a.pdf", 2), pdf_input("b.pdf", 1)], &Value::Null)
            .await
            .unwrap();
        assert_eq!(response.tool, "merge-pdf");
        assert_eq!(response.files.len(), 1);
        assert_eq!(response.files[0].name, "merged.pdf");
        let merged = decode(response.result.as_deref().unwrap());
        assert_eq!(response.files[0].size, merged.len());
        assert_eq!(page_texts(&merged), vec!["Page 1", "Page 2", "Page 1"]);
        assert!(response.stats.input_bytes > 0);
    }

    #[tokio::test]
    async fn test_file_count_checks() {
        let tb = toolbox();
        let err = tb.run("merge-pdf", vec![pdf_input("a.pdf", 1)], &Value::Null).await.unwrap_err();
        assert!(err.to_string().contains("at least 2 files"));

        let err = tb
            .run("rotate-pdf", vec![pdf_input("a.pdf", 1), pdf_input("b.pdf", 1)], &Value::Null)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("at most 1 file"));

        let err = tb.run("rotate-pdf", vec![png_input(4, 4)], &Value::Null).await.unwrap_err();
        assert!(matches!(err, ToolError::UnsupportedFormat(_)));

        let err = tb.run("no-such-tool", vec![], &Value::Null).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_split_pdf_zip_and_files() {
        let tb = toolbox();
        let response = tb
            .run("split-pdf", vec![pdf_input("report.pdf", 3)], &json!({ "ranges": "1-2,3" }))
            .await
            .unwrap();
        assert_eq!(response.files[0].name, "report-split.zip");
        assert!(decode(&response.files[0].data_uri).starts_with(b"PK"));
        assert_eq!(response.data.as_ref().unwrap()["parts"], 2);

        let response = tb
            .run("split-pdf", vec![pdf_input("report.pdf", 2)], &json!({ "zip": false }))
            .await
            .unwrap();
        let names: Vec<_> = response.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["report-page-1.pdf", "report-page-2.pdf"]);
    }

    #[tokio::test]
    async fn test_page_selection_required() {
        let err = toolbox()
            .run("extract-pages", vec![pdf_input("a.pdf", 3)], &Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_pdf_to_text_and_info() {
        let tb = toolbox();
        let response = tb
            .run("pdf-to-text", vec![pdf_input("a.pdf", 2)], &Value::Null)
            .await
            .unwrap();
        assert!(response.result.is_none());
        let text = response.text.unwrap();
        assert!(text.contains("Page 1") && text.contains("Page 2"));

        let response = tb.run("pdf-info", vec![pdf_input("a.pdf", 2)], &Value::Null).await.unwrap();
        assert_eq!(response.data.unwrap()["page_count"], 2);
    }

    #[tokio::test]
    async fn test_image_tools() {
        let tb = toolbox();
        let response = tb
            .run("resize-image", vec![png_input(40, 20)], &json!({ "width": 10 }))
            .await
            .unwrap();
        assert_eq!(response.files[0].name, "photo-resized.png");
        let data = response.data.unwrap();
        assert_eq!((data["width"].as_u64(), data["height"].as_u64()), (Some(10), Some(5)));

        let response = tb
            .run("convert-image", vec![png_input(8, 8)], &json!({ "format": "jpeg" }))
            .await
            .unwrap();
        assert!(response.files[0].data_uri.starts_with("data:image/jpeg"));

        let response = tb
            .run("rotate-image", vec![png_input(8, 4)], &json!({ "angle": 90 }))
            .await
            .unwrap();
        assert_eq!(response.data.unwrap()["width"], 4);
    }

    #[tokio::test]
    async fn test_images_to_pdf() {
        let response = toolbox()
            .run("images-to-pdf", vec![png_input(30, 20), png_input(10, 10)], &Value::Null)
            .await
            .unwrap();
        let bytes = decode(&response.files[0].data_uri);
        assert_eq!(pdf::page_count(&bytes).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_ai_ocr_without_key() {
        let tb = toolbox();
        assert!(!tb.ai_enabled());
        let err = tb.run("ai-ocr", vec![png_input(4, 4)], &Value::Null).await.unwrap_err();
        assert!(matches!(err, ToolError::External(_)));
    }

    #[tokio::test]
    async fn test_voter_extract_from_text() {
        let text = "ABC1234567\nName : Ravi Kumar\nAge : 45 Gender : Male";
        let response = toolbox()
            .run("voter-extract", vec![], &json!({ "text": text }))
            .await
            .unwrap();
        let data = response.data.unwrap();
        assert_eq!(data["count"], 1);
        assert_eq!(data["records"][0]["epic"], "ABC1234567");
        assert_eq!(data["records"][0]["name"], "Ravi Kumar");

        let err = toolbox().run("voter-extract", vec![], &Value::Null).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));

        let plain = ToolInput::new(Some("roll.txt".into()), "text/plain", text.as_bytes().to_vec(), 0);
        let response = toolbox().run("voter-extract", vec![plain], &Value::Null).await.unwrap();
        assert_eq!(response.data.unwrap()["count"], 1);
    }
}
