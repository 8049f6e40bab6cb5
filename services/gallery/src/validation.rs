//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

/// Largest number of files a single project may hold
pub const MAX_FILES_PER_PROJECT: i64 = 5;

const MAX_TITLE_LEN: usize = 200;
const MAX_PROJECT_ID_LEN: usize = 64;

/// Validate a media title
pub fn validate_title(title: &str) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("Title is required".to_string());
    }

    if title.chars().count() > MAX_TITLE_LEN {
        return Err(format!(
            "Title must be at most {} characters long",
            MAX_TITLE_LEN
        ));
    }

    Ok(())
}

/// Validate a project identifier
pub fn validate_project_id(project_id: &str) -> Result<(), String> {
    if project_id.len() > MAX_PROJECT_ID_LEN {
        return Err(format!(
            "Project ID must be at most {} characters long",
            MAX_PROJECT_ID_LEN
        ));
    }

    static PROJECT_ID_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = PROJECT_ID_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 _.-]*$").expect("Failed to compile project id regex")
    });

    if !regex.is_match(project_id) {
        return Err(
            "Project ID can only contain letters, numbers, spaces, dots, dashes and underscores"
                .to_string(),
        );
    }

    Ok(())
}

/// Normalise an optional form value: trimmed, with blanks treated as absent
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Strip any directory components a client may have sent with a filename
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        "file.bin".to_string()
    } else {
        name.to_string()
    }
}

fn content_type_from_extension(filename: &str) -> Option<&'static str> {
    let (_, extension) = filename.rsplit_once('.')?;
    let content_type = match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "csv" => "text/csv",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => return None,
    };
    Some(content_type)
}

fn is_allowed_content_type(content_type: &str) -> bool {
    static IMAGE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = IMAGE_REGEX.get_or_init(|| {
        Regex::new(r"^image/[a-z0-9.+-]+$").expect("Failed to compile image type regex")
    });

    regex.is_match(content_type)
        || matches!(
            content_type,
            "application/pdf"
                | "text/csv"
                | "application/vnd.ms-excel"
                | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        )
}

/// Decide the stored content type of an uploaded file.
///
/// Accepts images, PDF, CSV, XLS and XLSX. Falls back to the file extension
/// when the declared type is missing or generic.
pub fn resolve_content_type(filename: &str, declared: Option<&str>) -> Result<String, String> {
    let declared = declared
        .map(|d| {
            d.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
        .filter(|d| !d.is_empty() && d != "application/octet-stream");

    let content_type = match declared {
        Some(declared) => declared,
        None => content_type_from_extension(filename)
            .map(str::to_string)
            .ok_or_else(|| format!("Cannot determine the type of {}", filename))?,
    };

    if !is_allowed_content_type(&content_type) {
        return Err(format!(
            "Unsupported file type {} for {}. Allowed: images, PDF, CSV, XLS, XLSX",
            content_type, filename
        ));
    }

    Ok(content_type)
}

/// Check that a project can take `incoming` more files
pub fn check_project_capacity(existing: i64, incoming: i64) -> Result<(), String> {
    if existing + incoming > MAX_FILES_PER_PROJECT {
        return Err(format!(
            "A project can hold at most {} files; it has {} and {} more were added",
            MAX_FILES_PER_PROJECT, existing, incoming
        ));
    }

    Ok(())
}
