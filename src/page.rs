//! HTML page rendering
//!
//! Server-rendered chat page: title, reset button, transcript, input box.
//! Message text is rendered as markdown with raw HTML escaped.

use pulldown_cmark::{html, Event, Options, Parser};

use crate::chat::PageView;
use crate::memory::MessageRole;

pub const PAGE_TITLE: &str = "Gemini Chatbot";
pub const HEADING: &str = "Chatbot with Memory";
pub const SUBTITLE: &str = "Chat with Google's Gemini AI - Your conversation is remembered!";
pub const INPUT_PLACEHOLDER: &str = "Type your message here...";
pub const FOOTER: &str = "Powered by Google Gemini AI";

const STYLE: &str = r#"
body { font-family: sans-serif; max-width: 46rem; margin: 0 auto; padding: 1rem; }
h1 { margin-bottom: 0.2rem; }
.controls { text-align: center; margin: 1rem 0; }
.transcript { max-height: 65vh; overflow-y: auto; }
.message { border-radius: 0.5rem; padding: 0.2rem 0.9rem; margin: 0.5rem 0; }
.message.user { background: #eef3ff; }
.message.assistant { background: #f4f4f4; }
.message.error { background: #fdecec; color: #8a1c1c; }
.role { font-size: 0.75em; color: gray; text-transform: uppercase; margin-top: 0.4rem; }
.notice { background: #e8f6ec; padding: 0.6rem; border-radius: 0.4rem; }
.warning { background: #fff6dc; padding: 0.6rem; border-radius: 0.4rem; }
.halt { background: #fdecec; padding: 0.6rem; border-radius: 0.4rem; }
form.input { display: flex; gap: 0.5rem; }
form.input input { flex: 1; padding: 0.5rem; }
footer { text-align: center; color: gray; font-size: 0.8em; }
"#;

/// Escape text for use in HTML content or attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render markdown to HTML, treating embedded HTML as plain text
pub fn render_markdown(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);

    let parser = Parser::new_ext(text, options).map(|event| match event {
        Event::Html(raw) => Event::Text(raw),
        other => other,
    });

    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

pub fn render_page(view: &PageView) -> String {
    let mut body = String::new();

    body.push_str(&format!("<h1>{}</h1>\n", HEADING));
    body.push_str(&format!("<p>{}</p>\n", escape_html(SUBTITLE)));
    body.push_str(
        "<div class=\"controls\"><form method=\"post\" action=\"/reset\">\
         <button type=\"submit\">&#x1F504; Reset Chat</button></form></div>\n<hr>\n",
    );

    if let Some(notice) = &view.notice {
        body.push_str(&format!("<div class=\"notice\">{}</div>\n", escape_html(notice)));
    }

    match &view.halt {
        Some(message) if view.missing_credential => {
            body.push_str(&format!(
                "<div class=\"warning\">&#x26A0;&#xFE0F; {}</div>\n",
                escape_html(message)
            ));
        }
        Some(message) => {
            body.push_str(&format!("<div class=\"halt\">{}</div>\n", escape_html(message)));
        }
        None => {
            body.push_str("<div class=\"transcript\" id=\"transcript\">\n");
            for msg in &view.messages {
                let is_error =
                    msg.role == MessageRole::Assistant && msg.content.starts_with("Error:");
                let class = if is_error { "assistant error" } else { msg.role.as_str() };
                body.push_str(&format!(
                    "<div class=\"message {}\"><div class=\"role\">{}</div>{}</div>\n",
                    class,
                    msg.role.as_str(),
                    render_markdown(&msg.content)
                ));
            }
            body.push_str("</div>\n");
            body.push_str(&format!(
                "<form class=\"input\" method=\"post\" action=\"/chat\">\
                 <input type=\"text\" name=\"message\" placeholder=\"{}\" \
                 autofocus autocomplete=\"off\">\
                 <button type=\"submit\">Send</button></form>\n",
                escape_html(INPUT_PLACEHOLDER)
            ));
        }
    }

    body.push_str(&format!("<hr>\n<footer>{}</footer>\n", FOOTER));

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}\
         <script>var t=document.getElementById('transcript');\
         if(t){{t.scrollTop=t.scrollHeight;}}</script>\n\
         </body>\n</html>\n",
        PAGE_TITLE, STYLE, body
    )
}
