use miette::Result;
use quizdown_common::bank::{load_questions, load_subjects};
use quizdown_common::telemetry::{self, TelemetryConfig};
use quizdown_common::{QuizError, Question};
use quizdown_renderer::{Fragment, Renderer, RendererConfig, TypesetOutcome, escape_code};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version, about = "Quizdown - render quiz question banks to HTML", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every question in a chapter file to one HTML page
    Render {
        /// Chapter JSON file
        bank: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Renderer config (TOML)
        #[arg(short, long, env = "QUIZDOWN_CONFIG")]
        config: Option<PathBuf>,

        /// Typeset math to MathML instead of leaving TeX delimiters in place
        #[arg(long)]
        typeset: bool,
    },
    /// List subjects and their chapters
    Subjects {
        /// Subject list JSON file
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_miette();
    telemetry::init(TelemetryConfig::from_env("quizdown"));

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            bank,
            out,
            config,
            typeset,
        } => {
            render_bank(&bank, out.as_deref(), config.as_deref(), typeset).await?;
        }
        Commands::Subjects { config } => {
            list_subjects(&config)?;
        }
    }

    Ok(())
}

async fn render_bank(
    bank: &Path,
    out: Option<&Path>,
    config: Option<&Path>,
    typeset: bool,
) -> Result<()> {
    let config = match config {
        Some(path) => RendererConfig::load(path)?,
        None => RendererConfig::default(),
    };
    let renderer = Renderer::new(config);
    let questions = load_questions(bank)?;

    let title = bank
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "questions".to_string());
    let page = render_page(&renderer, &title, &questions, typeset).await;

    match out {
        Some(path) => {
            std::fs::write(path, &page).map_err(QuizError::from)?;
            println!("✓ Rendered {} questions to {}", questions.len(), path.display());
        }
        None => print!("{page}"),
    }

    let stats = renderer.cache_stats();
    tracing::info!(
        questions = questions.len(),
        hits = stats.hits,
        misses = stats.misses,
        "render finished"
    );
    Ok(())
}

async fn render_page(
    renderer: &Renderer,
    title: &str,
    questions: &[Question],
    typeset: bool,
) -> String {
    let mut page = String::new();
    page.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    page.push_str(&format!("<title>{}</title>\n", escape_code(title)));
    page.push_str("</head>\n<body>\n");

    for (i, question) in questions.iter().enumerate() {
        page.push_str(&format!(
            "<section class=\"question\" id=\"q{}\">\n<div class=\"question-text\">{}</div>\n",
            i + 1,
            render_fragment(renderer, &question.text, typeset).await
        ));
        if !question.choices.is_empty() {
            page.push_str("<ul class=\"choices\">\n");
            for choice in &question.choices {
                page.push_str(&format!(
                    "<li class=\"choice\" data-value=\"{}\">{}</li>\n",
                    escape_code(&choice.value),
                    render_fragment(renderer, &choice.text, typeset).await
                ));
            }
            page.push_str("</ul>\n");
        }
        page.push_str(&format!(
            "<p class=\"answer\">Answer: {}</p>\n",
            escape_code(&question.correct_answer.display())
        ));
        if let Some(explanation) = &question.explanation {
            page.push_str(&format!(
                "<div class=\"explanation\">{}</div>\n",
                render_fragment(renderer, explanation, typeset).await
            ));
        }
        page.push_str("</section>\n");
    }

    page.push_str("</body>\n</html>\n");
    page
}

async fn render_fragment(renderer: &Renderer, text: &str, typeset: bool) -> String {
    if !typeset {
        return renderer.render(text);
    }
    let mut root = Fragment::new();
    match renderer.render_and_typeset(&mut root, text).await {
        TypesetOutcome::Completed => {}
        outcome => tracing::debug!(?outcome, "math left untypeset"),
    }
    root.rendered().to_owned()
}

fn list_subjects(path: &Path) -> Result<()> {
    let subjects = load_subjects(path)?;
    if subjects.is_empty() {
        return Err(QuizError::Config(format!("no subjects in {}", path.display())).into());
    }

    for subject in &subjects {
        println!("{} - {}", subject.id, subject.name);
        if !subject.description.is_empty() {
            println!("  {}", subject.description);
        }
        for chapter in &subject.chapters {
            let file = Path::new(&subject.path).join(&chapter.file);
            println!(
                "  {:<12} {} ({} questions) {}",
                chapter.id,
                chapter.name,
                chapter.q,
                file.display()
            );
        }
    }
    Ok(())
}

fn init_miette() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))
    .expect("couldn't set the miette hook");
    miette::set_panic_hook();
}
