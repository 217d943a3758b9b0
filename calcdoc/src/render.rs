use pulldown_cmark::{Options, Parser as CmarkParser, html};

/// Converts a prose block to display markup.
///
/// The structural parser never looks at markup, so any renderer (or a
/// closure returning the text unchanged) can be plugged in.
pub trait RenderProse {
    fn render(&self, text: &str) -> String;
}

/// CommonMark renderer with tables and strikethrough enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonMark;

impl RenderProse for CommonMark {
    fn render(&self, text: &str) -> String {
        let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
        let parser = CmarkParser::new_ext(text, options);
        let mut out = String::with_capacity(text.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }
}

impl<F> RenderProse for F
where
    F: Fn(&str) -> String,
{
    fn render(&self, text: &str) -> String {
        self(text)
    }
}

/// Render with the default CommonMark renderer.
pub fn render_prose(text: &str) -> String {
    CommonMark.render(text)
}
