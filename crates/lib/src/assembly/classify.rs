//! File-name classifiers used by merge policies.

const LICENSE_KEYWORDS: &[&str] = &["license", "licence", "notice", "copying", "copyright"];
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "html", "rst"];
const JUNK_FILES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini", ".gitkeep", ".keep"];

/// Last `/`-separated component of a destination path.
pub fn file_name(path: &str) -> &str {
  path.rsplit('/').next().unwrap_or(path)
}

/// No extension, or a plain-text document extension.
fn has_document_extension(name: &str) -> bool {
  match name.rfind('.') {
    None | Some(0) => true,
    Some(dot) => {
      let ext = name[dot + 1..].to_ascii_lowercase();
      TEXT_EXTENSIONS.contains(&ext.as_str())
    }
  }
}

pub fn is_readme(path: &str) -> bool {
  let name = file_name(path);
  name.to_ascii_lowercase().contains("readme") && has_document_extension(name)
}

pub fn is_license(path: &str) -> bool {
  let name = file_name(path);
  let lower = name.to_ascii_lowercase();
  LICENSE_KEYWORDS.iter().any(|keyword| lower.contains(keyword)) && has_document_extension(name)
}

/// OS and VCS droppings, matched exactly by file name.
pub fn is_junk(path: &str) -> bool {
  JUNK_FILES.contains(&file_name(path))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn readme_names() {
    for path in ["README", "README.md", "docs/Readme.txt", "README.markdown", "lib/readme.rst"] {
      assert!(is_readme(path), "{path}");
    }
    for path in ["README.java", "readme.json", "read.me"] {
      assert!(!is_readme(path), "{path}");
    }
  }

  #[test]
  fn license_names() {
    for path in [
      "LICENSE",
      "META-INF/LICENSE.txt",
      "licence.md",
      "NOTICE",
      "COPYING",
      "COPYRIGHT.html",
      "LICENSE-APACHE",
    ] {
      assert!(is_license(path), "{path}");
    }
    for path in ["LicenseChecker.class", "licenses.json", "src/notice.rs"] {
      assert!(!is_license(path), "{path}");
    }
  }

  #[test]
  fn junk_is_exact() {
    assert!(is_junk("a/b/.DS_Store"));
    assert!(is_junk("Thumbs.db"));
    assert!(is_junk("res/.gitkeep"));
    assert!(!is_junk("x.DS_Store"));
    assert!(!is_junk("thumbs.db"));
  }
}
