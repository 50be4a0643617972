use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use quizdown_renderer::{
    CmarkEngine, ContentRoot, Fragment, MarkdownEngine, PlainHighlighter, Renderer, RendererConfig,
    TypesetOutcome,
};
use regex::Regex;

fn renderer() -> Renderer {
    Renderer::new(RendererConfig::default())
}

fn strip_tags(html: &str) -> String {
    Regex::new(r"<[^>]*>").unwrap().replace_all(html, "").into_owned()
}

/// Counts calls through to the real engine.
struct Counting {
    inner: CmarkEngine,
    calls: AtomicUsize,
}

impl MarkdownEngine for Counting {
    fn to_html(&self, safe_text: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.to_html(safe_text)
    }
}

#[test]
fn plain_text() {
    assert_eq!(renderer().render("Hello world").trim_end(), "<p>Hello world</p>");
}

#[test]
fn inline_math_is_preserved() {
    let html = renderer().render("Energy: $E=mc^2$ is famous.");
    assert!(html.contains(r#"<span class="math-inline-wrapper">$E=mc^2$</span>"#));
    insta::assert_snapshot!(
        html.trim_end(),
        @r#"<p>Energy: <span class="math-inline-wrapper">$E=mc^2$</span> is famous.</p>"#
    );
}

#[test]
fn math_that_looks_like_markdown_survives() {
    let text = "Sum $a_1 + a_2 * b_3$ and\n$$\n\\left| x \\right|_{*}\n$$";
    let html = renderer().render(text);
    assert!(html.contains("$a_1 + a_2 * b_3$"));
    assert!(html.contains("$$\n\\left| x \\right|_{*}\n$$"));
    assert!(!html.contains("<em>"));
}

#[test]
fn nested_chemistry_is_one_span() {
    let html = renderer().render(r"Water: \ce{A_{2}B} and \ce{H2O}");
    assert!(html.contains(r"\ce{A_{2}B}"));
    assert!(html.contains(r"\ce{H2O}"));
    assert!(!html.contains("<em>"));
}

#[test]
fn java_code_block() {
    let html = renderer().render("Look:\n\n```java\nint x = 1;\n```\n");
    assert!(html.contains(r#"<span class="code-lang">java</span>"#));
    assert!(html.contains(r#"class="copy-code""#));

    let open = r#"<code class="language-java">"#;
    let start = html.find(open).unwrap() + open.len();
    let end = html[start..].find("</code></pre>").unwrap() + start;
    assert_eq!(strip_tags(&html[start..end]).trim_end(), "int x = 1;");
}

#[test]
fn unknown_language_is_plaintext() {
    let html = renderer().render("```klingon\n<qapla'>\n```");
    assert!(html.contains(r#"<span class="code-lang">klingon</span>"#));
    assert!(html.contains(
        r#"<code class="language-plaintext">&lt;qapla&#039;&gt;"#
    ));
}

#[test]
fn dollars_in_code_are_not_math() {
    let html = renderer().render("Run `echo $HOME` or\n\n```sh\necho $PATH $USER\n```");
    assert!(!html.contains("math-inline-wrapper"));
    assert!(html.contains("<code>echo $HOME</code>"));
}

#[test]
fn stray_backticks_leave_math_protected() {
    let html = renderer().render("Which key is ` on a keyboard?\n\nCompute $a*b*c$ now, see ` too.");
    assert!(html.contains(r#"<span class="math-inline-wrapper">$a*b*c$</span>"#));
    assert!(!html.contains("<em>"));
}

#[test]
fn backticks_inside_display_math_are_math() {
    let html = renderer().render("$$ a `b` * c * d $$");
    assert_eq!(html.trim_end(), "<p>$$ a `b` * c * d $$</p>");
}

#[test]
fn math_in_image_text_is_an_escaped_attribute() {
    let html = renderer().render("![area $x^2 < 4$](plot.png)");
    assert_eq!(
        html.trim_end(),
        r#"<p><img src="plot.png" alt="area $x^2 &lt; 4$" /></p>"#
    );
}

#[test]
fn math_in_link_title_is_an_escaped_attribute() {
    let html = renderer().render(r#"[see](a.html "about $x$") and $y$"#);
    assert_eq!(
        html.trim_end(),
        r#"<p><a href="a.html" title="about $x$">see</a> and <span class="math-inline-wrapper">$y$</span></p>"#
    );
}

#[test]
fn entities_pass_through_unaltered() {
    let html = renderer().render("a&nbsp;b &copy; 2024");
    assert_eq!(html.trim_end(), "<p>a&nbsp;b &copy; 2024</p>");
}

#[test]
fn lone_asterisks_stay_literal() {
    let renderer = renderer();
    assert_eq!(renderer.render("*").trim_end(), "<p>*</p>");
    assert_eq!(renderer.render("***").trim_end(), "<p>***</p>");
    assert_eq!(
        renderer.render("A\n*\nB").trim_end(),
        "<p>A<br />\n*<br />\nB</p>"
    );
}

#[test]
fn tables_are_wrapped() {
    let html = renderer().render("| x | $x^2$ |\n|---|---|\n| 2 | 4 |");
    assert!(html.starts_with(r#"<div class="table-wrapper"><table>"#));
    assert!(html.contains(r#"<span class="math-inline-wrapper">$x^2$</span>"#));
    assert!(html.trim_end().ends_with("</table></div>"));
}

#[test]
fn legacy_html_passes_through() {
    let html = renderer().render(r#"Use <span class="keyword">final</span><br>here."#);
    assert_eq!(
        html.trim_end(),
        r#"<p>Use <span class="keyword">final</span><br>here.</p>"#
    );
}

#[test]
fn repeated_renders_reuse_the_cache() {
    let engine = Arc::new(Counting {
        inner: CmarkEngine::new(Arc::new(PlainHighlighter)),
        calls: AtomicUsize::new(0),
    });
    let renderer = Renderer::builder().markdown(engine.clone()).build();

    let texts = ["a $x$", "**b**", "a $x$", "c", "**b**", "a $x$"];
    let first: Vec<String> = texts.iter().map(|t| renderer.render(t)).collect();
    assert_eq!(first[0], first[2]);
    assert_eq!(first[0], first[5]);
    assert_eq!(first[1], first[4]);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 3);

    let stats = renderer.cache_stats();
    assert_eq!(stats.hits, 3);
    assert_eq!(stats.misses, 3);
}

#[test]
fn renders_without_engine_return_input() {
    let renderer = Renderer::builder().without_markdown().build();
    assert_eq!(renderer.render("*raw* $x$"), "*raw* $x$");
    assert_eq!(renderer.render(""), "");
}

#[cfg(feature = "mathml")]
#[tokio::test]
async fn render_and_typeset_produces_mathml() {
    let renderer = renderer();
    let mut root = Fragment::new();
    let outcome = renderer
        .render_and_typeset(&mut root, r"Ratio $\frac{a}{b}$ here")
        .await;
    assert_eq!(outcome, TypesetOutcome::Completed);
    assert!(root.inner_html().contains(r"$\frac{a}{b}$"));
    let typeset = root.typeset_output().unwrap();
    assert!(typeset.contains("<mfrac"));
    assert!(typeset.contains("math-inline-wrapper"));
}

#[tokio::test]
async fn typesetting_can_be_disabled() {
    let renderer = Renderer::builder().without_typesetter().build();
    let mut root = Fragment::new();
    let outcome = renderer.render_and_typeset(&mut root, "$x$").await;
    assert_eq!(outcome, TypesetOutcome::Unavailable);
    assert_eq!(root.rendered(), root.inner_html());
}
