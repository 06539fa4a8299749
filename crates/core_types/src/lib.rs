/// The markup writer a response renders through.
///
/// Fragment cache keys vary on this, since the same control renders
/// different markup per writer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WriterKind {
    #[default]
    Html,
    Html32,
    Xhtml,
    Wml,
}

impl WriterKind {
    /// Stable name used as the writer discriminator in cache keys.
    pub fn name(self) -> &'static str {
        match self {
            WriterKind::Html => "HtmlTextWriter",
            WriterKind::Html32 => "Html32TextWriter",
            WriterKind::Xhtml => "XhtmlTextWriter",
            WriterKind::Wml => "WmlTextWriter",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_names_are_distinct() {
        let kinds = [
            WriterKind::Html,
            WriterKind::Html32,
            WriterKind::Xhtml,
            WriterKind::Wml,
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!(a.name(), b.name());
            }
        }
    }
}
