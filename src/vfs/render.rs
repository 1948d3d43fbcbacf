//! HTML rendering of directory views.

use std::fmt;

use super::lister::DirectoryView;

/// Offset in `uri` where the internal path starts.
///
/// The dispatcher may have decoded the URI, so this only trusts a literal
/// suffix match and otherwise treats the whole URI as the archive part.
pub fn find_path_info(uri: &str, path_info: &str) -> usize {
    if !path_info.is_empty() && uri.ends_with(path_info) {
        uri.len() - path_info.len()
    } else {
        uri.len()
    }
}

/// A full listing page.
///
/// Links are `uri[..path_info_offset]` followed by `/` and the entry's
/// full internal path, so following one keeps the archive part of the URI
/// and only swaps the internal path.
pub struct ListingPage<'a> {
    pub view: &'a DirectoryView,
    pub uri: &'a str,
    pub path_info_offset: usize,
}

impl ListingPage<'_> {
    fn base(&self) -> &str {
        self.uri.get(..self.path_info_offset).unwrap_or(self.uri)
    }
}

impl fmt::Display for ListingPage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = Escaped(self.uri);
        let base = Escaped(self.base());

        f.write_str(
            "<!DOCTYPE HTML PUBLIC \"-//W3C//DTD HTML 4.0 Transitional//EN\"\n\
             \"http://www.w3.org/TR/REC-html40/loose.dtd\">\n<html>\n<head>\n",
        )?;
        writeln!(f, "<title>Index of {title}</title>")?;
        f.write_str(
            "</head>\n<body bgcolor=\"#ffffff\" text=\"#000000\">\n\n\
             <table><tr><td bgcolor=\"#ffffff\" class=\"title\">\n\
             <font size=\"+3\" face=\"Helvetica,Arial,sans-serif\">\n",
        )?;
        writeln!(f, "<b>Index of {title}</b></font>")?;
        f.write_str("</td></tr></table><pre>")?;

        writeln!(
            f,
            "<img src=\"/icons/back.gif\" alt=\"[BCK]\" /><a href=\"{base}/{}\">Parent Directory</a>",
            Escaped(&self.view.parent)
        )?;

        for entry in &self.view.entries {
            let (icon, alt, suffix) = if entry.is_dir {
                ("folder", "[DIR]", "/")
            } else {
                ("unknown", "[   ]", "")
            };
            let leaf = entry.name.rsplit('/').next().unwrap_or(&entry.name);
            writeln!(
                f,
                "<img src=\"/icons/{icon}.gif\" alt=\"{alt}\" /><a href=\"{base}/{}{suffix}\">{}{suffix}</a>",
                Escaped(&entry.name),
                Escaped(leaf)
            )?;
        }

        write!(
            f,
            "<hr /></pre>{} {}\n</body></html>\n",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        )
    }
}

/// HTML-escapes text and attribute values.
struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rest = self.0;
        while let Some(i) = rest.find(['&', '<', '>', '"', '\'']) {
            f.write_str(&rest[..i])?;
            f.write_str(match rest.as_bytes()[i] {
                b'&' => "&amp;",
                b'<' => "&lt;",
                b'>' => "&gt;",
                b'"' => "&quot;",
                _ => "&#39;",
            })?;
            rest = &rest[i + 1..];
        }
        f.write_str(rest)
    }
}
