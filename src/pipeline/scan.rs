//! Directory scanning and input validation.
//!
//! Both stages discover their work by walking a directory tree. Results are
//! sorted so two runs over the same tree process files in the same order,
//! which keeps logs comparable and tests deterministic.

use crate::error::{DocumentError, FigscribeError};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extensions (lower-case) the captioner treats as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff"];

/// Recursively collect every `.pdf` file under `dir`, sorted.
pub fn find_pdfs(dir: &Path) -> Result<Vec<PathBuf>, FigscribeError> {
    find_files(dir, &|p| has_extension(p, &["pdf"]))
}

/// Recursively collect every image file under `dir`, sorted.
pub fn find_images(dir: &Path) -> Result<Vec<PathBuf>, FigscribeError> {
    find_files(dir, &is_image_file)
}

/// Check if a path has one of the common image extensions.
pub fn is_image_file(path: &Path) -> bool {
    has_extension(path, IMAGE_EXTENSIONS)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

fn find_files(dir: &Path, keep: &dyn Fn(&Path) -> bool) -> Result<Vec<PathBuf>, FigscribeError> {
    let mut found = Vec::new();
    walk(dir, keep, &mut found)?;
    found.sort();
    debug!("Scanned {}: {} matching files", dir.display(), found.len());
    Ok(found)
}

/// Depth-first walk that does not descend into symlinked directories, so a
/// link cycle cannot report the same file twice. Symlinks to files are kept.
fn walk(
    dir: &Path,
    keep: &dyn Fn(&Path) -> bool,
    found: &mut Vec<PathBuf>,
) -> Result<(), FigscribeError> {
    let entries = std::fs::read_dir(dir).map_err(|source| FigscribeError::DirectoryAccess {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        if file_type.is_dir() {
            walk(&path, keep, found)?;
        } else if file_type.is_symlink() {
            if path.is_dir() {
                debug!("Not following directory symlink {}", path.display());
            } else if path.is_file() && keep(&path) {
                found.push(path);
            }
        } else if keep(&path) {
            found.push(path);
        }
    }
    Ok(())
}

/// How far into the file the `%PDF` header may start. PDFium tolerates
/// leading junk within this window.
pub const PDF_HEADER_WINDOW: u64 = 1024;

/// Verify that `%PDF` appears within the first [`PDF_HEADER_WINDOW`] bytes.
///
/// Catching a mislabelled file here gives a clear per-document error
/// instead of an opaque failure from the conversion backend.
pub fn check_pdf_magic(path: &Path) -> Result<(), DocumentError> {
    let file = std::fs::File::open(path).map_err(|source| DocumentError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let mut head = Vec::with_capacity(PDF_HEADER_WINDOW as usize);
    file.take(PDF_HEADER_WINDOW)
        .read_to_end(&mut head)
        .map_err(|source| DocumentError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

    if head.windows(4).any(|w| w == b"%PDF") {
        return Ok(());
    }
    if head.len() < 4 {
        return Err(DocumentError::CorruptPdf {
            path: path.to_path_buf(),
            detail: "file is shorter than a PDF header".into(),
        });
    }
    Err(DocumentError::NotAPdf {
        path: path.to_path_buf(),
        magic: [head[0], head[1], head[2], head[3]],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn image_extensions_are_case_insensitive() {
        assert!(is_image_file(Path::new("a/b/fig.PNG")));
        assert!(is_image_file(Path::new("scan.tiff")));
        assert!(is_image_file(Path::new("photo.JpEg")));
        assert!(!is_image_file(Path::new("report.pdf")));
        assert!(!is_image_file(Path::new("fig.png.tmp")));
        assert!(!is_image_file(Path::new("README")));
    }

    #[test]
    fn find_pdfs_recurses_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested/deeper")).unwrap();
        fs::write(dir.path().join("b.pdf"), b"%PDF-1.7").unwrap();
        fs::write(dir.path().join("nested/a.PDF"), b"%PDF-1.7").unwrap();
        fs::write(dir.path().join("nested/deeper/c.pdf"), b"%PDF-1.7").unwrap();
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

        let pdfs = find_pdfs(dir.path()).unwrap();
        let names: Vec<_> = pdfs
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("b.pdf"),
                PathBuf::from("nested/a.PDF"),
                PathBuf::from("nested/deeper/c.pdf"),
            ]
        );
    }

    #[test]
    fn find_images_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x-figure-1.png"), b"png").unwrap();
        fs::write(dir.path().join("x-table-1.jpg"), b"jpg").unwrap();
        fs::write(dir.path().join("x.json"), b"{}").unwrap();

        let images = find_images(dir.path()).unwrap();
        assert_eq!(images.len(), 2);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let err = find_pdfs(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, FigscribeError::DirectoryAccess { .. }));
    }

    #[test]
    fn pdf_magic_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.pdf");
        let bad = dir.path().join("bad.pdf");
        let tiny = dir.path().join("tiny.pdf");
        fs::write(&good, b"%PDF-1.4\n...").unwrap();
        fs::write(&bad, b"<html>not a pdf</html>").unwrap();
        fs::write(&tiny, b"%P").unwrap();

        assert!(check_pdf_magic(&good).is_ok());
        assert!(matches!(
            check_pdf_magic(&bad),
            Err(DocumentError::NotAPdf { .. })
        ));
        assert!(matches!(
            check_pdf_magic(&tiny),
            Err(DocumentError::CorruptPdf { .. })
        ));
    }

    #[test]
    fn header_after_leading_bytes_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let prefixed = dir.path().join("prefixed.pdf");
        let mut bytes = vec![b' '; 300];
        bytes.extend_from_slice(b"%PDF-1.7\n...");
        fs::write(&prefixed, &bytes).unwrap();
        assert!(check_pdf_magic(&prefixed).is_ok());

        let too_late = dir.path().join("late.pdf");
        let mut bytes = vec![b'x'; PDF_HEADER_WINDOW as usize];
        bytes.extend_from_slice(b"%PDF-1.7");
        fs::write(&too_late, &bytes).unwrap();
        assert!(matches!(
            check_pdf_magic(&too_late),
            Err(DocumentError::NotAPdf { magic, .. }) if &magic == b"xxxx"
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loop_lists_each_file_once() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("good.pdf"), b"%PDF-1.7").unwrap();
        fs::write(dir.path().join("sub/fig.png"), b"png").unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("sub/loop")).unwrap();

        assert_eq!(find_pdfs(dir.path()).unwrap(), vec![dir.path().join("good.pdf")]);
        assert_eq!(find_images(dir.path()).unwrap(), vec![dir.path().join("sub/fig.png")]);
    }

    #[cfg(unix)]
    #[test]
    fn file_symlinks_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let real = tempfile::tempdir().unwrap();
        fs::write(real.path().join("paper.pdf"), b"%PDF-1.7").unwrap();
        std::os::unix::fs::symlink(real.path().join("paper.pdf"), dir.path().join("alias.pdf"))
            .unwrap();
        std::os::unix::fs::symlink(real.path().join("gone.pdf"), dir.path().join("dangling.pdf"))
            .unwrap();

        assert_eq!(find_pdfs(dir.path()).unwrap(), vec![dir.path().join("alias.pdf")]);
    }
}
