//! Spooling of downloaded documents to disk for the shell to open. The bytes
//! land in a `.part` file first and are renamed into place once fully
//! written and hashed; every failure path removes the partial file.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SpoolSummary {
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
}

/// Write `bytes` under a unique directory in the system temp dir and return
/// the final path together with size and content hash.
pub fn spool_document(filename: &str, bytes: &[u8]) -> anyhow::Result<SpoolSummary> {
    let dir = std::env::temp_dir().join(format!("beltsd-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create spool directory {}", dir.to_string_lossy()))?;
    let final_path = dir.join(sanitize_filename(filename));
    let part_path = dir.join(format!(
        "{}.part",
        final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    ));

    let sha256 = match write_part(&part_path, bytes) {
        Ok(sha256) => sha256,
        Err(e) => {
            let _ = std::fs::remove_file(&part_path);
            return Err(e);
        }
    };
    if let Err(e) = std::fs::rename(&part_path, &final_path) {
        let _ = std::fs::remove_file(&part_path);
        return Err(e).with_context(|| {
            format!(
                "failed to move spooled document to {}",
                final_path.to_string_lossy()
            )
        });
    }
    Ok(SpoolSummary {
        path: final_path,
        bytes: bytes.len() as u64,
        sha256,
    })
}

fn write_part(part_path: &Path, bytes: &[u8]) -> anyhow::Result<String> {
    let mut file = File::create(part_path).with_context(|| {
        format!(
            "failed to create spool file {}",
            part_path.to_string_lossy()
        )
    })?;
    file.write_all(bytes).context("failed to write document")?;
    file.flush().context("failed to flush document")?;
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Keep the final component only and replace separators; the filename comes
/// from server-side data and must not escape the spool directory.
fn sanitize_filename(filename: &str) -> String {
    let name: String = filename
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    let trimmed = name.trim_matches(|c| c == '.' || c == ' ').to_string();
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spooled_document_lands_with_hash() {
        let summary = spool_document("exam.pdf", b"%PDF-1.4 test").expect("spool");
        assert!(summary.path.ends_with("exam.pdf"));
        assert_eq!(summary.bytes, 13);
        let on_disk = std::fs::read(&summary.path).expect("read back");
        assert_eq!(on_disk, b"%PDF-1.4 test");
        // no partial file left behind
        let part = summary.path.with_file_name("exam.pdf.part");
        assert!(!part.exists());
        let _ = std::fs::remove_dir_all(summary.path.parent().expect("parent"));
    }

    #[test]
    fn filenames_cannot_escape_the_spool_dir() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename(""), "document");
        assert_eq!(sanitize_filename("exam.pdf"), "exam.pdf");
    }
}
