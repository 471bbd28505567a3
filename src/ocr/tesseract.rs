//! Tesseract command-line OCR.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use image::ImageFormat;

use super::OcrEngine;
use crate::error::{Error, Result};
use crate::model::Bitmap;

/// Location and language of the tesseract executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TesseractConfig {
    /// Path or bare name of the executable
    pub command: PathBuf,
    /// Language code passed with `-l`
    pub language: String,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl TesseractConfig {
    /// The usual install location for the current platform, language `eng`.
    pub fn platform_default() -> Self {
        let command = if cfg!(windows) {
            r"C:\Program Files\Tesseract-OCR\tesseract.exe"
        } else if cfg!(target_os = "macos") {
            "/usr/local/bin/tesseract"
        } else {
            "/usr/bin/tesseract"
        };
        Self {
            command: PathBuf::from(command),
            language: "eng".to_string(),
        }
    }

    /// Set the executable.
    pub fn with_command(mut self, command: impl Into<PathBuf>) -> Self {
        self.command = command.into();
        self
    }

    /// Set the recognition language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

/// [`OcrEngine`] that runs `tesseract <image> stdout -l <lang>` per image.
#[derive(Debug, Clone, Default)]
pub struct TesseractEngine {
    config: TesseractConfig,
}

impl TesseractEngine {
    /// Create an engine from a configuration.
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    pub fn config(&self) -> &TesseractConfig {
        &self.config
    }

    /// Run `tesseract --version` and return the first line of its output.
    pub fn check_available(&self) -> Result<String> {
        let output = Command::new(&self.config.command)
            .arg("--version")
            .output()
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(Error::OcrUnavailable(format!(
                "{} --version exited with {}",
                self.config.command.display(),
                output.status
            )));
        }

        // Older releases print the version banner on stderr.
        let banner = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(String::from_utf8_lossy(&banner)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    fn spawn_error(&self, e: std::io::Error) -> Error {
        let reason = match e.kind() {
            ErrorKind::NotFound => format!("{} not found", self.config.command.display()),
            ErrorKind::PermissionDenied => {
                format!("{} is not executable", self.config.command.display())
            }
            _ => format!("failed to run {}: {}", self.config.command.display(), e),
        };
        Error::OcrUnavailable(reason)
    }

    fn run(&self, input: &Path) -> Result<String> {
        let output = Command::new(&self.config.command)
            .arg(input)
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.language)
            .output()
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::OcrUnavailable(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &Bitmap) -> Result<String> {
        let dynamic = image.to_dynamic_image()?;

        let mut input = tempfile::Builder::new()
            .prefix("formscan-")
            .suffix(".png")
            .tempfile()?;
        dynamic
            .write_to(input.as_file_mut(), ImageFormat::Png)
            .map_err(|e| Error::ImageFormat(format!("PNG encoding failed: {}", e)))?;

        log::debug!(
            "Running {} on {}x{} image",
            self.config.command.display(),
            image.width(),
            image.height()
        );
        self.run(input.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing_engine() -> TesseractEngine {
        TesseractEngine::new(
            TesseractConfig::platform_default().with_command("/nonexistent/formscan-tesseract"),
        )
    }

    #[test]
    fn test_platform_default() {
        let config = TesseractConfig::platform_default();
        assert_eq!(config.language, "eng");
        assert!(config.command.to_string_lossy().contains("tesseract"));
    }

    #[test]
    fn test_config_builder() {
        let config = TesseractConfig::default()
            .with_command("tesseract")
            .with_language("kor");
        assert_eq!(config.command, PathBuf::from("tesseract"));
        assert_eq!(config.language, "kor");
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let engine = missing_engine();
        let err = engine.recognize(&Bitmap::filled(8, 8, 3, 255)).unwrap_err();
        assert!(matches!(err, Error::OcrUnavailable(_)));
        assert!(err.to_string().contains("not found"));
        assert!(matches!(
            engine.check_available(),
            Err(Error::OcrUnavailable(_))
        ));
    }

    #[test]
    fn test_unsupported_bitmap_is_rejected_before_spawning() {
        let err = missing_engine()
            .recognize(&Bitmap::filled(2, 2, 5, 0))
            .unwrap_err();
        assert!(matches!(err, Error::ImageFormat(_)));
    }
}
