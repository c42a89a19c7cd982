use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Deployment and SEO files copied verbatim from the static root.
pub const ROOT_FILES: &[&str] = &["robots.txt", "sitemap.xml", "CNAME"];

/// Copy static assets into `output_dir`.
///
/// `css/*.css` and `js/*.js` land flat in the output root, `images/` replaces
/// any existing `images/` wholesale. Returns the output paths written.
pub fn copy_static(static_dir: &Path, output_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut copied = Vec::new();

    if !static_dir.exists() {
        tracing::warn!("Static directory not found: {}", static_dir.display());
        return Ok(copied);
    }

    copied.extend(copy_flat(&static_dir.join("css"), "css", output_dir)?);
    copied.extend(copy_flat(&static_dir.join("js"), "js", output_dir)?);

    let img_src = static_dir.join("images");
    let img_dest = output_dir.join("images");
    if img_src.is_dir() {
        if img_dest.exists() {
            std::fs::remove_dir_all(&img_dest)?;
        }
        copied.extend(copy_tree(&img_src, &img_dest)?);
        tracing::info!("Copied images/ directory");
    } else {
        tracing::debug!("No images directory in {}", static_dir.display());
    }

    for name in ROOT_FILES {
        let src = static_dir.join(name);
        if src.is_file() {
            let dest = output_dir.join(name);
            std::fs::copy(&src, &dest)?;
            tracing::info!("Copied {}", name);
            copied.push(dest);
        }
    }

    Ok(copied)
}

fn copy_flat(src_dir: &Path, extension: &str, output_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut copied = Vec::new();
    if !src_dir.is_dir() {
        tracing::warn!("Asset directory not found: {}", src_dir.display());
        return Ok(copied);
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(src_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == extension))
        .collect();
    files.sort();

    for file in files {
        let Some(name) = file.file_name() else {
            continue;
        };
        let dest = output_dir.join(name);
        std::fs::copy(&file, &dest)?;
        tracing::info!("Copied {}", name.to_string_lossy());
        copied.push(dest);
    }

    Ok(copied)
}

/// Recursively copy `src` to `dest`, creating directories as needed.
pub fn copy_tree(src: &Path, dest: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut copied = Vec::new();
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(std::io::Error::other)?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target)?;
            copied.push(target);
        }
    }
    Ok(copied)
}
