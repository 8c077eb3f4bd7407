use super::{truncate_chars, TextExtractor};
use crate::assembler::DEFAULT_OCR_MAX_CHARS;
use crate::attachment::mime;
use crate::{Error, Result};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Poppler command-line tools used for PDF handling.
#[derive(Debug, Clone)]
pub struct PopplerTools {
    pub pdfinfo: PathBuf,
    pub pdftotext: PathBuf,
    pub pdftoppm: Option<PathBuf>,
}

/// OCR backed by the `tesseract` CLI, with Poppler for PDFs.
///
/// Images are re-encoded to PNG before recognition so every format the
/// `image` crate reads is accepted. PDF pages use their embedded text when
/// present and are rasterized and OCR'ed otherwise. PDF pages are processed
/// in order until `max_chars` characters have been collected.
pub struct TesseractExtractor {
    tesseract: PathBuf,
    poppler: Option<PopplerTools>,
    max_chars: usize,
}

impl TesseractExtractor {
    pub fn new(tesseract: PathBuf, poppler: Option<PopplerTools>) -> Self {
        Self {
            tesseract,
            poppler,
            max_chars: DEFAULT_OCR_MAX_CHARS,
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Looks for the tools on `PATH`. Returns `None` when `tesseract` is
    /// missing; PDFs are only supported when Poppler is installed too.
    pub fn locate() -> Option<Self> {
        let path = std::env::var_os("PATH")?;
        Self::locate_in(&path)
    }

    pub fn locate_in(path_var: &OsStr) -> Option<Self> {
        let find = |name: &str| {
            std::env::split_paths(path_var)
                .map(|dir| dir.join(name))
                .find(|candidate| candidate.is_file())
        };

        let tesseract = find("tesseract")?;
        let poppler = match (find("pdfinfo"), find("pdftotext")) {
            (Some(pdfinfo), Some(pdftotext)) => Some(PopplerTools {
                pdfinfo,
                pdftotext,
                pdftoppm: find("pdftoppm"),
            }),
            _ => None,
        };

        tracing::info!(
            "OCR available via {} (PDF support: {})",
            tesseract.display(),
            poppler.is_some()
        );

        Some(Self::new(tesseract, poppler))
    }

    async fn run(program: &Path, args: &[&OsStr]) -> Result<String> {
        // A cancelled request must not leave the child running
        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Ocr(format!(
                "{} exited with {}: {}",
                program.display(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn recognize(&self, image_path: &Path) -> Result<String> {
        Self::run(
            &self.tesseract,
            &[image_path.as_os_str(), OsStr::new("stdout")],
        )
        .await
    }

    async fn extract_image(&self, bytes: &[u8]) -> Result<String> {
        let dir = tempfile::tempdir()?;
        let png_path = dir.path().join("attachment.png");

        let owned = bytes.to_vec();
        let target = png_path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let decoded = image::load_from_memory(&owned)?;
            decoded.save(&target)?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Ocr(format!("Image normalization task failed: {}", e)))??;

        self.recognize(&png_path).await
    }

    async fn page_count(poppler: &PopplerTools, pdf_path: &Path) -> Result<u32> {
        let info = Self::run(&poppler.pdfinfo, &[pdf_path.as_os_str()]).await?;
        parse_page_count(&info)
            .ok_or_else(|| Error::Ocr("pdfinfo reported no page count".to_string()))
    }

    async fn extract_pdf(&self, poppler: &PopplerTools, bytes: &[u8]) -> Result<String> {
        let dir = tempfile::tempdir()?;
        let pdf_path = dir.path().join("attachment.pdf");
        tokio::fs::write(&pdf_path, bytes).await?;

        let pages = Self::page_count(poppler, &pdf_path).await?;
        let mut page_texts = Vec::new();
        let mut collected = 0usize;

        for page in 1..=pages {
            if collected >= self.max_chars {
                tracing::debug!(
                    "Stopping PDF extraction at page {} of {}: {} characters collected",
                    page,
                    pages,
                    collected
                );
                break;
            }

            let page_arg = page.to_string();
            let embedded = Self::run(
                &poppler.pdftotext,
                &[
                    OsStr::new("-f"),
                    OsStr::new(&page_arg),
                    OsStr::new("-l"),
                    OsStr::new(&page_arg),
                    OsStr::new("-layout"),
                    pdf_path.as_os_str(),
                    OsStr::new("-"),
                ],
            )
            .await?;

            let text = if !embedded.trim().is_empty() {
                embedded
            } else if let Some(pdftoppm) = &poppler.pdftoppm {
                let prefix = dir.path().join(format!("page-{}", page));
                Self::run(
                    pdftoppm,
                    &[
                        OsStr::new("-f"),
                        OsStr::new(&page_arg),
                        OsStr::new("-l"),
                        OsStr::new(&page_arg),
                        OsStr::new("-r"),
                        OsStr::new("300"),
                        OsStr::new("-png"),
                        OsStr::new("-singlefile"),
                        pdf_path.as_os_str(),
                        prefix.as_os_str(),
                    ],
                )
                .await?;
                self.recognize(&prefix.with_extension("png")).await?
            } else {
                tracing::debug!("Page {} has no embedded text and pdftoppm is missing", page);
                String::new()
            };

            let trimmed = text.trim();
            if !trimmed.is_empty() {
                collected += trimmed.chars().count();
                page_texts.push(trimmed.to_string());
            }
        }

        Ok(truncate_chars(&page_texts.join("\n\n"), self.max_chars))
    }
}

#[async_trait]
impl TextExtractor for TesseractExtractor {
    async fn extract(&self, bytes: &[u8], media_type: &str) -> Result<Option<String>> {
        if mime::is_image(media_type) {
            return self.extract_image(bytes).await.map(Some);
        }

        if mime::is_pdf(media_type) {
            let Some(poppler) = &self.poppler else {
                tracing::debug!("Skipping PDF extraction: Poppler tools not installed");
                return Ok(None);
            };
            return self.extract_pdf(poppler, bytes).await.map(Some);
        }

        Ok(None)
    }
}

fn parse_page_count(pdfinfo_output: &str) -> Option<u32> {
    pdfinfo_output.lines().find_map(|line| {
        line.strip_prefix("Pages:")
            .and_then(|count| count.trim().parse().ok())
    })
}
