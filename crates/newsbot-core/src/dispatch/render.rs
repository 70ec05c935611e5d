use crate::feed::{Article, Feed};

/// Escape the characters Telegram's legacy Markdown treats as entity delimiters
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Percent-encode the parentheses that would close a Markdown inline link early
fn escape_link(link: &str) -> String {
    link.replace('(', "%28").replace(')', "%29")
}

/// Message text for one article, in Markdown mode
pub fn render_article(feed: &Feed, article: &Article) -> String {
    let mut text = format!("*{}*\n\n", escape_markdown(&feed.name));

    let title = article.title.trim();
    if !title.is_empty() {
        text.push_str(&format!("*{}*\n\n", escape_markdown(title)));
    }

    if !article.body.is_empty() {
        text.push_str(&escape_markdown(&article.body));
        text.push('\n');
    }

    if !article.link.is_empty() {
        text.push_str(&format!("[Read more...]({})", escape_link(&article.link)));
    }

    text.trim_end().to_string()
}
